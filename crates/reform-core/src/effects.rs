use std::cell::RefCell;
use std::rc::Rc;

use crate::scope::{Scope, current_scope};

#[derive(Clone)]
pub struct Dispose(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl Dispose {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Rc::new(RefCell::new(Some(Box::new(f)))))
    }

    /// Runs at most once (safe to call multiple times).
    pub fn run(&self) {
        let f = self.0.borrow_mut().take();
        if let Some(f) = f {
            f()
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.0.borrow().is_none()
    }
}

/// RAII guard around a [`Dispose`]: detaches when dropped.
///
/// Returned by every subscribe-style call in this crate. Hold on to it for as
/// long as notifications should keep arriving.
#[must_use = "dropping a Subscription detaches it immediately"]
pub struct Subscription {
    dispose: Option<Dispose>,
}

impl Subscription {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self::from_dispose(Dispose::new(f))
    }

    pub fn from_dispose(dispose: Dispose) -> Self {
        Self {
            dispose: Some(dispose),
        }
    }

    pub fn is_active(&self) -> bool {
        self.dispose.as_ref().is_some_and(|d| !d.is_disposed())
    }

    /// Detach now. Equivalent to dropping the guard.
    pub fn cancel(mut self) {
        if let Some(d) = self.dispose.take() {
            d.run();
        }
    }

    /// Hand the subscription to `scope`; it detaches when the scope is disposed.
    pub fn attach_to(mut self, scope: &Scope) {
        if let Some(d) = self.dispose.take() {
            scope.add_disposer(move || d.run());
        }
    }

    /// Hand the subscription to the current scope.
    ///
    /// Outside any scope the subscription stays alive for the rest of the
    /// process.
    pub fn scoped(mut self) {
        match current_scope() {
            Some(scope) => self.attach_to(&scope),
            None => {
                log::warn!("Subscription::scoped called outside a scope; it will never detach");
                self.dispose = None;
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(d) = self.dispose.take() {
            d.run();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
