//! # Key → form bridge
//!
//! [`watch_form`] turns a key source into a stream of live form handles. The
//! key source is either a fixed [`FormKey`] or a [`Signal`] of optional keys
//! (typically a selection in application state).
//!
//! Per watch, the bridge walks this state machine:
//!
//! ```text
//! Unsubscribed -> Resolving(key) -> Resolved{key} -> Resolving(key') -> ... -> Unsubscribed
//! ```
//!
//! - On subscribe, and on every key emission, the key is resolved against the
//!   registry and the sink receives the handle, or `None` when nothing is
//!   registered under it.
//! - While a key stays current, every change inside its form (value,
//!   validity, touched, dirty) re-emits the same handle.
//! - A key emission invalidates the previous resolution: its form
//!   subscription is dropped and a generation token makes any late
//!   notification from it a no-op. At most one handle is live per watch.
//! - Registry changes are followed too. When the entry under the current key
//!   is removed or replaced, the watch re-resolves the same key, so it never
//!   forwards changes from an evicted tree.
//! - Dropping (or [`unsubscribe`](FormWatch::unsubscribe)-ing) the watch
//!   detaches immediately. The bridge never mutates the registry.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::effects::Subscription;
use crate::node::StateNode;
use crate::registry::{FormKey, FormRegistry};
use crate::scope::Scope;
use crate::signal::Signal;

#[derive(Clone)]
pub enum KeySource {
    Fixed(FormKey),
    Stream(Signal<Option<FormKey>>),
}

impl From<FormKey> for KeySource {
    fn from(key: FormKey) -> Self {
        KeySource::Fixed(key)
    }
}

impl From<&FormKey> for KeySource {
    fn from(key: &FormKey) -> Self {
        KeySource::Fixed(key.clone())
    }
}

impl From<&str> for KeySource {
    fn from(key: &str) -> Self {
        KeySource::Fixed(key.into())
    }
}

impl From<Signal<Option<FormKey>>> for KeySource {
    fn from(keys: Signal<Option<FormKey>>) -> Self {
        KeySource::Stream(keys)
    }
}

impl From<&Signal<Option<FormKey>>> for KeySource {
    fn from(keys: &Signal<Option<FormKey>>) -> Self {
        KeySource::Stream(keys.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeState {
    Unsubscribed,
    Resolving(Option<FormKey>),
    Resolved { key: Option<FormKey>, found: bool },
}

/// A live key → form subscription. Detaches on drop.
#[must_use = "dropping a FormWatch detaches it immediately"]
pub struct FormWatch {
    inner: Rc<WatchInner>,
    key_sub: Option<Subscription>,
    registry_sub: Option<Subscription>,
}

struct WatchInner {
    registry: FormRegistry,
    sink: Box<dyn Fn(Option<StateNode>)>,
    state: RefCell<BridgeState>,
    current: RefCell<Option<StateNode>>,
    /// Bumped on every key switch and on detach; notifications carrying an
    /// older token are discarded.
    generation: Cell<u64>,
    form_sub: RefCell<Option<Subscription>>,
}

/// Resolve `source` against `registry` and keep `sink` fed with the current
/// handle. The first emission happens before this returns.
pub fn watch_form(
    registry: &FormRegistry,
    source: impl Into<KeySource>,
    sink: impl Fn(Option<StateNode>) + 'static,
) -> FormWatch {
    let inner = Rc::new(WatchInner {
        registry: registry.clone(),
        sink: Box::new(sink),
        state: RefCell::new(BridgeState::Unsubscribed),
        current: RefCell::new(None),
        generation: Cell::new(0),
        form_sub: RefCell::new(None),
    });

    let registry_sub = {
        let changes = registry.changes();
        let weak = Rc::downgrade(&inner);
        let id = changes.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.refresh();
            }
        });
        Subscription::new(move || {
            changes.unsubscribe(id);
        })
    };

    let key_sub = match source.into() {
        KeySource::Fixed(key) => {
            inner.switch_to(Some(key));
            None
        }
        KeySource::Stream(keys) => {
            // Subscribe before the first resolution so a key change made by
            // the sink during that emission is not missed.
            let weak = Rc::downgrade(&inner);
            let id = keys.subscribe(move |key| {
                if let Some(inner) = weak.upgrade() {
                    inner.switch_to(key.clone());
                }
            });
            let sub = Subscription::new({
                let keys = keys.clone();
                move || {
                    keys.unsubscribe(id);
                }
            });
            inner.switch_to(keys.get());
            Some(sub)
        }
    };

    FormWatch {
        inner,
        key_sub,
        registry_sub: Some(registry_sub),
    }
}

impl WatchInner {
    fn switch_to(self: &Rc<Self>, key: Option<FormKey>) {
        let token = self.generation.get().wrapping_add(1);
        self.generation.set(token);
        let previous = self.form_sub.borrow_mut().take();
        drop(previous);

        log::trace!("watch resolving {key:?}");
        *self.state.borrow_mut() = BridgeState::Resolving(key.clone());
        let handle = key.as_ref().and_then(|k| self.registry.get_form(k));
        *self.current.borrow_mut() = handle.clone();
        *self.state.borrow_mut() = BridgeState::Resolved {
            key,
            found: handle.is_some(),
        };

        if let Some(node) = &handle {
            let weak = Rc::downgrade(self);
            let sub = node.subscribe(move |node| {
                if let Some(inner) = weak.upgrade()
                    && inner.generation.get() == token
                {
                    (inner.sink)(Some(node.clone()));
                }
            });
            *self.form_sub.borrow_mut() = Some(sub);
        }
        (self.sink)(handle);
    }

    /// Re-resolve the current key if its registry entry is no longer the
    /// handle we hold.
    fn refresh(self: &Rc<Self>) {
        let key = match &*self.state.borrow() {
            BridgeState::Resolved { key, .. } => key.clone(),
            _ => return,
        };
        let live = key.as_ref().and_then(|k| self.registry.get_form(k));
        let stale = match (&live, &*self.current.borrow()) {
            (Some(live), Some(held)) => !live.ptr_eq(held),
            (None, None) => false,
            _ => true,
        };
        if stale {
            log::trace!("registry entry for {key:?} changed");
            self.switch_to(key);
        }
    }

    fn detach(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
        let previous = self.form_sub.borrow_mut().take();
        drop(previous);
        self.current.borrow_mut().take();
        *self.state.borrow_mut() = BridgeState::Unsubscribed;
        log::trace!("watch detached");
    }
}

impl FormWatch {
    pub fn state(&self) -> BridgeState {
        self.inner.state.borrow().clone()
    }

    /// The handle most recently resolved, if any.
    pub fn current(&self) -> Option<StateNode> {
        self.inner.current.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        *self.inner.state.borrow() != BridgeState::Unsubscribed
    }

    /// Stop all emissions now. Equivalent to dropping the watch.
    pub fn unsubscribe(self) {}

    /// Keep the watch alive until `scope` is disposed.
    pub fn attach_to(self, scope: &Scope) {
        scope.add_disposer(move || drop(self));
    }
}

impl Drop for FormWatch {
    fn drop(&mut self) {
        // sources first, so no switch can sneak in after detach
        if let Some(sub) = self.key_sub.take() {
            sub.cancel();
        }
        if let Some(sub) = self.registry_sub.take() {
            sub.cancel();
        }
        self.inner.detach();
    }
}

impl fmt::Debug for FormWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormWatch")
            .field("state", &self.state())
            .finish()
    }
}
