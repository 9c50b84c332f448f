//! Path-aware deep merge for JSON values.
//!
//! Object-valued fields merge recursively field by field; everything else
//! (scalars and arrays) is overwritten outright by the incoming side.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Deep-merge `incoming` into `existing`.
///
/// Both top-level values must be objects; anything else is a type mismatch.
/// Nested non-object collisions do not error, they replace.
pub fn merge_values(existing: &mut Value, incoming: Value) -> Result<()> {
    match (existing, incoming) {
        (Value::Object(dst), Value::Object(src)) => {
            merge_objects(dst, src);
            Ok(())
        }
        (existing, incoming) => Err(Error::MergeTypeMismatch {
            existing: type_name(existing),
            incoming: type_name(&incoming),
        }),
    }
}

/// Recursive field-by-field merge of `src` into `dst`.
pub(crate) fn merge_objects(dst: &mut Map<String, Value>, src: Map<String, Value>) {
    for (key, incoming) in src {
        match incoming {
            Value::Object(incoming_map) => {
                if let Some(Value::Object(nested)) = dst.get_mut(&key) {
                    merge_objects(nested, incoming_map);
                } else {
                    dst.insert(key, Value::Object(incoming_map));
                }
            }
            other => {
                dst.insert(key, other);
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
