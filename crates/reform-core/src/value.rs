//! Dynamic values carried by form nodes.
//!
//! Leaves hold a [`FormValue`]; groups and arrays report their aggregate as
//! `Map` and `List`. Typed reads go through `TryFrom<FormValue>`:
//!
//! ```rust
//! use reform_core::FormValue;
//!
//! let v = FormValue::from("Ada");
//! let name: String = v.try_into().unwrap();
//! assert_eq!(name, "Ada");
//! ```

use std::fmt;

use indexmap::IndexMap;

use crate::error::ValueError;

#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FormValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FormValue>),
    Map(IndexMap<String, FormValue>),
}

impl FormValue {
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, FormValue)>) -> Self {
        FormValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list(items: impl IntoIterator<Item = FormValue>) -> Self {
        FormValue::List(items.into_iter().collect())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FormValue::Null => "null",
            FormValue::Bool(_) => "bool",
            FormValue::Int(_) => "int",
            FormValue::Float(_) => "float",
            FormValue::Text(_) => "text",
            FormValue::List(_) => "list",
            FormValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FormValue::Null)
    }

    /// Null, empty text, or an empty list/map.
    pub fn is_empty_value(&self) -> bool {
        match self {
            FormValue::Null => true,
            FormValue::Text(s) => s.is_empty(),
            FormValue::List(l) => l.is_empty(),
            FormValue::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FormValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Ints widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FormValue::Float(f) => Some(*f),
            FormValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FormValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FormValue]> {
        match self {
            FormValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, FormValue>> {
        match self {
            FormValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Entry lookup on a `Map`; `None` for every other kind.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.as_map().and_then(|m| m.get(name))
    }
}

impl fmt::Display for FormValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::from(self))
    }
}

impl From<bool> for FormValue {
    fn from(v: bool) -> Self {
        FormValue::Bool(v)
    }
}

impl From<i32> for FormValue {
    fn from(v: i32) -> Self {
        FormValue::Int(v.into())
    }
}

impl From<i64> for FormValue {
    fn from(v: i64) -> Self {
        FormValue::Int(v)
    }
}

impl From<u32> for FormValue {
    fn from(v: u32) -> Self {
        FormValue::Int(v.into())
    }
}

impl From<f64> for FormValue {
    fn from(v: f64) -> Self {
        FormValue::Float(v)
    }
}

impl From<&str> for FormValue {
    fn from(v: &str) -> Self {
        FormValue::Text(v.to_string())
    }
}

impl From<String> for FormValue {
    fn from(v: String) -> Self {
        FormValue::Text(v)
    }
}

impl<T: Into<FormValue>> From<Option<T>> for FormValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FormValue::Null, Into::into)
    }
}

impl<T: Into<FormValue>> From<Vec<T>> for FormValue {
    fn from(v: Vec<T>) -> Self {
        FormValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, FormValue>> for FormValue {
    fn from(v: IndexMap<String, FormValue>) -> Self {
        FormValue::Map(v)
    }
}

fn mismatch(expected: &'static str, found: &FormValue) -> ValueError {
    ValueError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

impl TryFrom<FormValue> for bool {
    type Error = ValueError;

    fn try_from(v: FormValue) -> Result<Self, Self::Error> {
        v.as_bool().ok_or_else(|| mismatch("bool", &v))
    }
}

impl TryFrom<FormValue> for i64 {
    type Error = ValueError;

    fn try_from(v: FormValue) -> Result<Self, Self::Error> {
        v.as_i64().ok_or_else(|| mismatch("int", &v))
    }
}

impl TryFrom<FormValue> for f64 {
    type Error = ValueError;

    fn try_from(v: FormValue) -> Result<Self, Self::Error> {
        v.as_f64().ok_or_else(|| mismatch("float", &v))
    }
}

impl TryFrom<FormValue> for String {
    type Error = ValueError;

    fn try_from(v: FormValue) -> Result<Self, Self::Error> {
        match v {
            FormValue::Text(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl TryFrom<FormValue> for Vec<FormValue> {
    type Error = ValueError;

    fn try_from(v: FormValue) -> Result<Self, Self::Error> {
        match v {
            FormValue::List(l) => Ok(l),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl From<serde_json::Value> for FormValue {
    fn from(v: serde_json::Value) -> Self {
        FormValue::from(&v)
    }
}

impl From<&serde_json::Value> for FormValue {
    fn from(v: &serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => FormValue::Null,
            Value::Bool(b) => FormValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FormValue::Int(i),
                None => FormValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FormValue::Text(s.clone()),
            Value::Array(items) => FormValue::List(items.iter().map(FormValue::from).collect()),
            Value::Object(obj) => FormValue::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), FormValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&FormValue> for serde_json::Value {
    fn from(v: &FormValue) -> Self {
        use serde_json::Value;
        match v {
            FormValue::Null => Value::Null,
            FormValue::Bool(b) => Value::Bool(*b),
            FormValue::Int(i) => Value::from(*i),
            // non-finite floats have no JSON form
            FormValue::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
            FormValue::Text(s) => Value::String(s.clone()),
            FormValue::List(items) => Value::Array(items.iter().map(Value::from).collect()),
            FormValue::Map(m) => Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_extraction_reports_kind_mismatch() {
        let err = i64::try_from(FormValue::from("12")).unwrap_err();
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                expected: "int",
                found: "text"
            }
        );
        assert_eq!(f64::try_from(FormValue::Int(3)), Ok(3.0));
    }

    #[test]
    fn emptiness() {
        assert!(FormValue::Null.is_empty_value());
        assert!(FormValue::from("").is_empty_value());
        assert!(FormValue::List(vec![]).is_empty_value());
        assert!(!FormValue::Bool(false).is_empty_value());
        assert!(!FormValue::Int(0).is_empty_value());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_keeps_variants_and_field_order() {
        let v = FormValue::map([
            ("name", "Ada".into()),
            ("age", 36.into()),
            ("score", 1.5.into()),
            ("tags", FormValue::list(["x".into()])),
            ("nick", FormValue::Null),
        ]);
        let text = serde_json::to_string(&v).unwrap();
        assert_eq!(text, r#"{"name":"Ada","age":36,"score":1.5,"tags":["x"],"nick":null}"#);
        assert_eq!(serde_json::from_str::<FormValue>(&text).unwrap(), v);

        let key = crate::FormKey::from("editor/lamp");
        assert_eq!(serde_json::to_string(&key).unwrap(), r#""editor/lamp""#);
        assert_eq!(serde_json::from_str::<crate::FormKey>(r#""editor/lamp""#).unwrap(), key);
    }

    #[test]
    fn display_matches_json_rendering() {
        let json = serde_json::json!({"lastName": "B", "firstName": "A", "age": 3});
        let v = FormValue::from(&json);
        assert_eq!(v.get("age"), Some(&FormValue::Int(3)));
        assert_eq!(v.to_string(), serde_json::Value::from(&v).to_string());
    }
}
