use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::SchemaError;
use crate::value::FormValue;

/// Failing rule name → marker (usually `true`, or a map with details).
pub type ValidationErrors = IndexMap<String, FormValue>;

/// Caller-supplied check run against a leaf value on every mutation.
///
/// Returning `None` (or an empty map) means the value passes.
#[derive(Clone)]
pub struct Validator(Rc<dyn Fn(&FormValue) -> Option<ValidationErrors>>);

impl Validator {
    pub fn new(f: impl Fn(&FormValue) -> Option<ValidationErrors> + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Reports `{name: true}` whenever `accept` rejects the value.
    ///
    /// ```rust
    /// use reform_core::{FormValue, Validator};
    ///
    /// let required = Validator::rule("required", |v| !v.is_empty_value());
    /// assert!(required.validate(&FormValue::from("x")).is_none());
    /// let errs = required.validate(&FormValue::from("")).unwrap();
    /// assert_eq!(errs["required"], FormValue::Bool(true));
    /// ```
    pub fn rule(name: impl Into<String>, accept: impl Fn(&FormValue) -> bool + 'static) -> Self {
        let name = name.into();
        Self::new(move |value| {
            if accept(value) {
                None
            } else {
                Some(ValidationErrors::from([(name.clone(), FormValue::Bool(true))]))
            }
        })
    }

    pub fn validate(&self, value: &FormValue) -> Option<ValidationErrors> {
        (self.0)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// Run every validator and merge their reports; later rules overwrite earlier
/// ones with the same name.
pub fn run_validators(validators: &[Validator], value: &FormValue) -> Option<ValidationErrors> {
    let mut merged = ValidationErrors::new();
    for v in validators {
        if let Some(errs) = v.validate(value) {
            merged.extend(errs);
        }
    }
    (!merged.is_empty()).then_some(merged)
}

/// Named validators, used to resolve validator references in tagged schema
/// descriptions (see [`Schema::from_json`](crate::Schema::from_json)).
#[derive(Clone, Debug, Default)]
pub struct ValidatorSet {
    by_name: IndexMap<String, Validator>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, validator: Validator) -> Self {
        self.insert(name, validator);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, validator: Validator) {
        self.by_name.insert(name.into(), validator);
    }

    pub fn get(&self, name: &str) -> Option<&Validator> {
        self.by_name.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<Validator, SchemaError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownValidator {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}
