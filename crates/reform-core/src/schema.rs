//! Declarative form descriptions.
//!
//! ```rust
//! use reform_core::{Schema, Validator};
//!
//! let required = Validator::rule("required", |v| !v.is_empty_value());
//! let schema = Schema::group([
//!     ("firstName", Schema::field_with("A", [required])),
//!     ("lastName", "B".into()),
//!     ("tags", Schema::array(["x".into(), "y".into()])),
//! ]);
//! assert_eq!(schema.variant(), "Group");
//! ```

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::SchemaError;
use crate::validation::{Validator, ValidatorSet};
use crate::value::FormValue;

#[derive(Clone, Debug)]
pub enum Schema {
    Field {
        initial: FormValue,
        validators: Vec<Validator>,
    },
    Group {
        fields: IndexMap<String, Schema>,
    },
    Array {
        items: Vec<Schema>,
    },
}

impl Schema {
    pub fn field(initial: impl Into<FormValue>) -> Self {
        Schema::Field {
            initial: initial.into(),
            validators: Vec::new(),
        }
    }

    pub fn field_with(
        initial: impl Into<FormValue>,
        validators: impl IntoIterator<Item = Validator>,
    ) -> Self {
        Schema::Field {
            initial: initial.into(),
            validators: validators.into_iter().collect(),
        }
    }

    /// Duplicate names: the last schema wins, at the first name's position.
    pub fn group<K: Into<String>>(fields: impl IntoIterator<Item = (K, Schema)>) -> Self {
        Schema::Group {
            fields: fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
        }
    }

    pub fn array(items: impl IntoIterator<Item = Schema>) -> Self {
        Schema::Array {
            items: items.into_iter().collect(),
        }
    }

    pub fn variant(&self) -> &'static str {
        match self {
            Schema::Field { .. } => "Field",
            Schema::Group { .. } => "Group",
            Schema::Array { .. } => "Array",
        }
    }

    /// The value a tree built from this schema starts with.
    pub fn initial_value(&self) -> FormValue {
        match self {
            Schema::Field { initial, .. } => initial.clone(),
            Schema::Group { fields } => FormValue::Map(
                fields
                    .iter()
                    .map(|(k, s)| (k.clone(), s.initial_value()))
                    .collect(),
            ),
            Schema::Array { items } => FormValue::List(items.iter().map(Schema::initial_value).collect()),
        }
    }

    /// Parse a tagged description:
    ///
    /// - `{"type": "Field", "initialValue": v, "options": {"validators": ["name", ..]}}`
    /// - `{"type": "Group", "fields": {"name": <schema or raw value>, ..}}`
    /// - `{"type": "Array", "items": [<schema or raw value>, ..]}`
    ///
    /// JSON scalars and arrays stand for a Field with that initial value.
    /// Validator names are resolved against `validators`.
    pub fn from_json(json: &Value, validators: &ValidatorSet) -> Result<Self, SchemaError> {
        let obj = match json {
            Value::Object(obj) => obj,
            raw => return Ok(Schema::field(raw)),
        };
        let tag = obj.get("type").ok_or(SchemaError::MissingVariantTag)?;
        let tag = tag.as_str().ok_or(SchemaError::InvalidField {
            variant: "schema",
            field: "type",
            expected: "a string",
        })?;

        match tag {
            "Field" => {
                let initial = obj.get("initialValue").ok_or(SchemaError::MissingField {
                    variant: "Field",
                    field: "initialValue",
                })?;
                let names = match obj.get("options").and_then(|o| o.get("validators")) {
                    None | Some(Value::Null) => &[][..],
                    Some(Value::Array(names)) => names.as_slice(),
                    Some(_) => {
                        return Err(SchemaError::InvalidField {
                            variant: "Field",
                            field: "options.validators",
                            expected: "an array of validator names",
                        });
                    }
                };
                let resolved = names
                    .iter()
                    .map(|name| {
                        let name = name.as_str().ok_or(SchemaError::InvalidField {
                            variant: "Field",
                            field: "options.validators",
                            expected: "an array of validator names",
                        })?;
                        validators.resolve(name)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Schema::field_with(initial, resolved))
            }
            "Group" => {
                let fields = obj
                    .get("fields")
                    .ok_or(SchemaError::MissingField {
                        variant: "Group",
                        field: "fields",
                    })?
                    .as_object()
                    .ok_or(SchemaError::InvalidField {
                        variant: "Group",
                        field: "fields",
                        expected: "an object",
                    })?;
                let fields = fields
                    .iter()
                    .map(|(name, child)| {
                        Schema::from_json(child, validators)
                            .map(|s| (name.clone(), s))
                            .map_err(|e| e.within(name))
                    })
                    .collect::<Result<IndexMap<_, _>, _>>()?;
                Ok(Schema::Group { fields })
            }
            "Array" => {
                let items = obj
                    .get("items")
                    .ok_or(SchemaError::MissingField {
                        variant: "Array",
                        field: "items",
                    })?
                    .as_array()
                    .ok_or(SchemaError::InvalidField {
                        variant: "Array",
                        field: "items",
                        expected: "an array",
                    })?;
                let items = items
                    .iter()
                    .enumerate()
                    .map(|(i, child)| {
                        Schema::from_json(child, validators).map_err(|e| e.within(&i.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Schema::Array { items })
            }
            other => Err(SchemaError::UnknownVariant {
                tag: other.to_string(),
            }),
        }
    }
}

impl From<FormValue> for Schema {
    fn from(v: FormValue) -> Self {
        Schema::field(v)
    }
}

macro_rules! field_shorthand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Schema {
                fn from(v: $t) -> Self {
                    Schema::field(v)
                }
            }
        )*
    };
}

field_shorthand!(bool, i32, i64, u32, f64, &str, String);
