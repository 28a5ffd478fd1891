//! Input schema builders
//!
//! Schemas are advisory metadata surfaced by `tools/list`.

use serde_json::{json, Map, Value};

/// Object schema from `(name, property)` pairs and the required names
pub fn object<'a>(properties: impl IntoIterator<Item = (&'a str, Value)>, required: &[&str]) -> Value {
    let properties: Map<String, Value> = properties
        .into_iter()
        .map(|(name, prop)| (name.to_string(), prop))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

pub fn string_property(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

pub fn integer_property(description: &str) -> Value {
    json!({"type": "integer", "description": description})
}

pub fn boolean_property(description: &str) -> Value {
    json!({"type": "boolean", "description": description})
}

pub fn array_property(item_type: &str, description: &str) -> Value {
    json!({"type": "array", "description": description, "items": {"type": item_type}})
}

/// String-to-string map, e.g. environment overrides
pub fn map_property(description: &str) -> Value {
    json!({
        "type": "object",
        "description": description,
        "additionalProperties": {"type": "string"},
    })
}

/// Schema of a tool that takes no arguments
pub fn empty_object() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}
