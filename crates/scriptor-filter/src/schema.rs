//! Lossy reduction of oversized enumerations in tool parameter schemas.
//!
//! Pure and idempotent: truncated enums end up at exactly the threshold
//! length, so a second pass finds nothing to do.

use serde_json::{Map, Value};

use scriptor_core::ToolDescriptor;

/// Marker set on a node whose enum was truncated.
pub const TRUNCATED_KEY: &str = "enum_truncated";
/// Marker carrying the pre-truncation enum length.
pub const ORIGINAL_COUNT_KEY: &str = "original_enum_count";

/// Reduces oversized enums in a descriptor's parameter schema.
///
/// Works on a copy of the schema; when nothing changes the descriptor comes
/// back with its original schema value untouched.
pub fn reduce_descriptor(mut descriptor: ToolDescriptor, threshold: usize) -> ToolDescriptor {
    let mut schema = descriptor.input_schema.clone();
    if reduce_schema(&mut schema, threshold) {
        descriptor.input_schema = schema;
    }
    descriptor
}

/// Recursively truncates enum arrays longer than `threshold`, tagging each
/// truncated node. Returns whether anything changed.
///
/// Recurses into `properties`, `items`, and `anyOf`/`oneOf`/`allOf`.
pub fn reduce_schema(schema: &mut Value, threshold: usize) -> bool {
    let Value::Object(node) = schema else {
        return false;
    };
    let mut changed = truncate_enum(node, threshold);

    if let Some(Value::Object(properties)) = node.get_mut("properties") {
        for child in properties.values_mut() {
            changed |= reduce_schema(child, threshold);
        }
    }

    if let Some(items) = node.get_mut("items") {
        match items {
            Value::Array(children) => {
                for child in children {
                    changed |= reduce_schema(child, threshold);
                }
            }
            single => changed |= reduce_schema(single, threshold),
        }
    }

    for combinator in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(variants)) = node.get_mut(combinator) {
            for child in variants {
                changed |= reduce_schema(child, threshold);
            }
        }
    }

    changed
}

fn truncate_enum(node: &mut Map<String, Value>, threshold: usize) -> bool {
    let truncated = match node.get("enum") {
        Some(Value::Array(options)) if options.len() > threshold => {
            let kept: Vec<Value> = options.iter().take(threshold).cloned().collect();
            Some((options.len(), kept))
        }
        _ => None,
    };

    let Some((original_count, kept)) = truncated else {
        return false;
    };

    node.insert("enum".to_owned(), Value::Array(kept));
    node.insert(TRUNCATED_KEY.to_owned(), Value::Bool(true));
    node.insert(
        ORIGINAL_COUNT_KEY.to_owned(),
        Value::from(original_count as u64),
    );
    true
}
