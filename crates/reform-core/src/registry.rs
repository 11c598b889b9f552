//! # Form registry
//!
//! [`FormRegistry`] maps opaque [`FormKey`]s to live form roots. Entries are
//! created by [`register_form`](FormRegistry::register_form) or
//! [`create_and_register_form`](FormRegistry::create_and_register_form) and
//! only ever go away through [`remove_form`](FormRegistry::remove_form) (or
//! `clear`). There is no capacity or time based eviction.
//!
//! ```rust
//! use reform_core::*;
//!
//! let registry = FormRegistry::new();
//! let schema = Schema::group([("title", "Draft".into())]);
//!
//! let key = registry.create_and_register_form(&schema, CreateOptions::new().with_key("k1"));
//! registry.get_form(&key).unwrap().patch_value(FormValue::map([("title", "Edited".into())]));
//!
//! // Same key again: the stored tree (and the edit) are kept.
//! let again = registry.create_and_register_form(&schema, CreateOptions::new().with_key("k1"));
//! assert_eq!(again, key);
//! assert_eq!(registry.get_form("k1").unwrap().find("title").unwrap().value(), FormValue::from("Edited"));
//!
//! registry.remove_form("k1");
//! assert!(registry.get_form("k1").is_none());
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bridge::{FormWatch, KeySource, watch_form};
use crate::builder::{build, build_with_data};
use crate::node::StateNode;
use crate::schema::Schema;
use crate::signal::Signal;
use crate::value::FormValue;

/// Process-wide so generated keys never repeat, even across registries.
static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FormKey(String);

impl FormKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormKey({:?})", self.0)
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FormKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FormKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for FormKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for FormKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Generated keys read `<key_prefix>-<n>`.
    pub key_prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            key_prefix: "form".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CreateOptions {
    /// Address to claim. When already taken, creation is a pure lookup.
    pub key: Option<FormKey>,
    /// Partial value overlaid on the schema's initial values before storing.
    pub initial_data: Option<FormValue>,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<FormKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_initial_data(mut self, data: impl Into<FormValue>) -> Self {
        self.initial_data = Some(data.into());
        self
    }
}

/// Shared keyed store of form roots. Cloning yields another handle onto the
/// same store.
#[derive(Clone)]
pub struct FormRegistry {
    inner: Rc<RefCell<RegistryInner>>,
    changes: Signal<u64>,
}

struct RegistryInner {
    config: RegistryConfig,
    forms: HashMap<FormKey, StateNode>,
}

impl Default for FormRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                config,
                forms: HashMap::new(),
            })),
            changes: Signal::new(0),
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.inner.borrow().config.clone()
    }

    /// Store an already built tree under a fresh key. Never deduplicates.
    pub fn register_form(&self, root: impl Into<StateNode>) -> FormKey {
        let root = root.into();
        let key = self.generate_key();
        self.inner.borrow_mut().forms.insert(key.clone(), root);
        log::debug!("registered form {key}");
        self.bump();
        key
    }

    /// Get-or-create by key.
    ///
    /// With `opts.key` naming an existing entry this returns that key and
    /// leaves the stored tree untouched, whatever `schema` says. Otherwise the
    /// schema is built (with `opts.initial_data` overlaid) and stored under
    /// `opts.key` or a fresh key. The first caller to claim a key wins: if the
    /// key gets claimed while this call is building (a validator re-entering
    /// the registry), the freshly built tree is discarded.
    pub fn create_and_register_form(&self, schema: &Schema, opts: CreateOptions) -> FormKey {
        let CreateOptions { key, initial_data } = opts;
        if let Some(key) = &key
            && self.contains(key)
        {
            log::trace!("form {key} already registered; reusing");
            return key.clone();
        }

        // Built without the store borrowed: validators are caller code.
        let root = match &initial_data {
            Some(data) => build_with_data(schema, data),
            None => build(schema),
        };

        let key = key.unwrap_or_else(|| self.generate_key());
        let inserted = match self.inner.borrow_mut().forms.entry(key.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(root);
                true
            }
        };
        if inserted {
            log::debug!("created form {key} ({} schema)", schema.variant());
            self.bump();
        } else {
            log::debug!("form {key} was claimed while building; keeping the first");
        }
        key
    }

    pub fn get_form(&self, key: impl AsRef<str>) -> Option<StateNode> {
        let key = key.as_ref();
        let found = self.inner.borrow().forms.get(key).cloned();
        if found.is_none() {
            log::trace!("no form registered under {key}");
        }
        found
    }

    /// Evict the entry under `key`, handing back its root. Removing an absent
    /// key is a no-op.
    pub fn remove_form(&self, key: impl AsRef<str>) -> Option<StateNode> {
        let key = key.as_ref();
        let removed = self.inner.borrow_mut().forms.remove(key);
        if removed.is_some() {
            log::debug!("removed form {key}");
            self.bump();
        }
        removed
    }

    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.inner.borrow().forms.contains_key(key.as_ref())
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().forms.is_empty()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<FormKey> {
        let mut keys: Vec<FormKey> = self.inner.borrow().forms.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut self.inner.borrow_mut().forms);
        if !removed.is_empty() {
            log::debug!("cleared {} forms", removed.len());
            self.bump();
        }
    }

    /// Counter bumped on every insert and removal.
    pub fn changes(&self) -> Signal<u64> {
        self.changes.clone()
    }

    /// Observe the form addressed by `source`; see [`watch_form`].
    pub fn watch(
        &self,
        source: impl Into<KeySource>,
        sink: impl Fn(Option<StateNode>) + 'static,
    ) -> FormWatch {
        watch_form(self, source, sink)
    }

    /// Snapshot of every entry, sorted by key.
    #[cfg(feature = "inspector")]
    pub fn entries(&self) -> Vec<(FormKey, StateNode)> {
        let mut entries: Vec<(FormKey, StateNode)> = self
            .inner
            .borrow()
            .forms
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn generate_key(&self) -> FormKey {
        let inner = self.inner.borrow();
        loop {
            let n = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
            let key = FormKey(format!("{}-{n}", inner.config.key_prefix));
            // caller-chosen keys may already use the generated shape
            if !inner.forms.contains_key(&key) {
                return key;
            }
        }
    }

    fn bump(&self) {
        self.changes.update(|v| *v = v.wrapping_add(1));
    }
}

impl fmt::Debug for FormRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormRegistry")
            .field("forms", &self.keys())
            .finish()
    }
}
