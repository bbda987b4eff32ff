#![forbid(unsafe_code)]

//! Initial field sets built from dynamic (e.g. server-fetched) JSON.

use crate::error::{Result, StateError};

/// Dynamically typed field value for stores with heterogeneous fields.
pub use serde_json::Value;

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Split a JSON object into `(field, value)` pairs.
///
/// Only the top level is split: nested objects stay whole field values.
pub fn fields_from_json(value: Value) -> Result<Vec<(String, Value)>> {
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(StateError::InvalidSeed {
            kind: kind_of(&other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_splits_into_top_level_fields() {
        let mut fields = fields_from_json(json!({
            "name": "John",
            "age": 20,
            "address": { "city": "Lisbon" }
        }))
        .unwrap();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], ("address".to_string(), json!({ "city": "Lisbon" })));
        assert_eq!(fields[1], ("age".to_string(), json!(20)));
        assert_eq!(fields[2], ("name".to_string(), json!("John")));
    }

    #[test]
    fn empty_object_is_empty_seed() {
        assert!(fields_from_json(json!({})).unwrap().is_empty());
    }

    #[test]
    fn non_object_is_rejected() {
        assert_eq!(
            fields_from_json(json!([1, 2])).unwrap_err(),
            StateError::InvalidSeed { kind: "array" }
        );
        assert_eq!(
            fields_from_json(Value::Null).unwrap_err(),
            StateError::InvalidSeed { kind: "null" }
        );
    }
}
