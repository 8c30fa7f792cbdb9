//! Typed access and merge semantics for attribute dictionaries.
//!
//! Config items carry their attributes as `serde_json` maps; the helpers
//! here centralize the empty-tolerant reads and the append-merge rule used
//! by `Append` expressions.

#![allow(missing_docs)]

use serde_json::{Map, Value};

/// Attribute dictionary of a config item or object.
pub type Attributes = Map<String, Value>;

/// String attribute, `None` when absent, null, or empty.
#[must_use]
pub fn get_str<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a str> {
    match attrs.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Numeric attribute, `None` when absent or not a number.
#[must_use]
pub fn get_f64(attrs: &Attributes, key: &str) -> Option<f64> {
    attrs.get(key).and_then(Value::as_f64)
}

/// Boolean attribute, `None` when absent or not a boolean.
#[must_use]
pub fn get_bool(attrs: &Attributes, key: &str) -> Option<bool> {
    attrs.get(key).and_then(Value::as_bool)
}

/// Object-valued attribute, `None` when absent or not a dictionary.
#[must_use]
pub fn get_object<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a Attributes> {
    attrs.get(key).and_then(Value::as_object)
}

/// List of strings; scalars and non-string entries are skipped.
#[must_use]
pub fn get_string_list(attrs: &Attributes, key: &str) -> Vec<String> {
    match attrs.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Append-merge `incoming` into `existing`: arrays concatenate, objects
/// union with `incoming` winning per key, anything else replaces outright.
pub fn merge_append(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Array(left), Value::Array(right)) => left.extend(right),
        (Value::Object(left), Value::Object(right)) => {
            for (key, value) in right {
                left.insert(key, value);
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}
