//! Schema → state tree construction.
//!
//! Building is a recursive descent over the schema variant. It is pure apart
//! from running each leaf's validators once, and deterministic: the same
//! schema always yields a tree of the same shape, values, and validity.

use serde_json::Value;

use crate::error::SchemaError;
use crate::node::{FormArray, FormControl, FormGroup, StateNode};
use crate::schema::Schema;
use crate::validation::ValidatorSet;
use crate::value::FormValue;

pub fn build(schema: &Schema) -> StateNode {
    build_node(schema, None, "")
}

/// Build with `data` overlaid on the schema's initial values.
///
/// `data` is partial: a `Map` overrides the named group children, a `List`
/// overrides array items by position, anything else overrides a field. The
/// overrides become the tree's initial values, so the result is pristine and
/// `reset` returns to them. Parts of `data` that do not fit the schema are
/// logged and ignored.
pub fn build_with_data(schema: &Schema, data: &FormValue) -> StateNode {
    build_node(schema, Some(data), "")
}

/// Parse a tagged JSON description and build it.
pub fn build_json(json: &Value, validators: &ValidatorSet) -> Result<StateNode, SchemaError> {
    Ok(build(&Schema::from_json(json, validators)?))
}

fn build_node(schema: &Schema, data: Option<&FormValue>, path: &str) -> StateNode {
    match schema {
        Schema::Field {
            initial,
            validators,
        } => {
            let initial = data.unwrap_or(initial).clone();
            FormControl::new(initial, validators.iter().cloned()).into()
        }
        Schema::Group { fields } => {
            let data = data.and_then(|d| match d {
                FormValue::Map(m) => {
                    for name in m.keys().filter(|k| !fields.contains_key(*k)) {
                        log::warn!("initial data `{}` has no matching field; ignored", join(path, name));
                    }
                    Some(m)
                }
                other => {
                    mismatch(path, "map", other);
                    None
                }
            });
            let children = fields.iter().map(|(name, child)| {
                let child_data = data.and_then(|m| m.get(name));
                (name.clone(), build_node(child, child_data, &join(path, name)))
            });
            FormGroup::new(children).into()
        }
        Schema::Array { items } => {
            let data = data.and_then(|d| match d {
                FormValue::List(l) => {
                    if l.len() > items.len() {
                        log::warn!(
                            "initial data at `{path}` has {} items for {} slots; surplus ignored",
                            l.len(),
                            items.len()
                        );
                    }
                    Some(l)
                }
                other => {
                    mismatch(path, "list", other);
                    None
                }
            });
            let children = items.iter().enumerate().map(|(i, child)| {
                let child_data = data.and_then(|l| l.get(i));
                build_node(child, child_data, &join(path, &i.to_string()))
            });
            FormArray::new(children).into()
        }
    }
}

fn mismatch(path: &str, expected: &str, found: &FormValue) {
    log::warn!(
        "initial data at `{}` is {}, expected {expected}; ignored",
        if path.is_empty() { "<root>" } else { path },
        found.kind()
    );
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}
