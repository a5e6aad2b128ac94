//! Dynamic composition of the manifest schema.
//!
//! The base schema describes the service-level shape. For every distinct
//! component type present in a manifest, the type's registered config schema
//! is attached to `components[*]` as a branch of a union discriminated by the
//! `type` field:
//!
//! ```json
//! { "if":   { "required": ["type"], "properties": { "type": { "const": "lambda-api" } } },
//!   "then": { "properties": { "config": { ...lambda-api config schema... } } } }
//! ```
//!
//! `if`/`then` keeps each violation attributed to its own path, so a branch
//! mismatch never collapses into a single opaque `oneOf` failure.

use crate::error::SchemaLoadError;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use stratum_core::ComponentRegistry;

const COMPONENT_ITEMS: &str = "/properties/components/items";

/// Parse a component's config schema, dropping document-level keywords that
/// are invalid in an embedded subschema.
pub fn embeddable_config_schema(
    type_name: &str,
    schema_text: &str,
) -> Result<Value, SchemaLoadError> {
    let mut schema: Value =
        serde_json::from_str(schema_text).map_err(|source| SchemaLoadError::Json {
            name: type_name.to_string(),
            source,
        })?;
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("$id");
    }
    Ok(schema)
}

/// Build the composed schema for a manifest using `types`.
pub fn compose(
    base: &Value,
    registry: &ComponentRegistry,
    types: &BTreeSet<String>,
) -> Result<Value, SchemaLoadError> {
    let mut schema = base.clone();
    let items = schema
        .pointer_mut(COMPONENT_ITEMS)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| SchemaLoadError::Compile {
            name: "manifest".to_string(),
            message: format!("base schema has no object at {}", COMPONENT_ITEMS),
        })?;

    let registered: Vec<Value> = registry
        .type_names()
        .into_iter()
        .map(|name| Value::String(name.to_string()))
        .collect();

    let properties = items
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(properties) = properties.as_object_mut() {
        let type_schema = properties
            .entry("type")
            .or_insert_with(|| json!({"type": "string"}));
        if let Some(type_schema) = type_schema.as_object_mut() {
            type_schema.insert("enum".to_string(), Value::Array(registered));
        }
    }

    let mut branches = Vec::new();
    for type_name in types {
        let Some(definition) = registry.get(type_name) else {
            continue;
        };
        let config_schema = embeddable_config_schema(type_name, definition.config_schema())?;
        branches.push(json!({
            "if": {
                "required": ["type"],
                "properties": { "type": { "const": type_name } }
            },
            "then": {
                "properties": { "config": config_schema }
            }
        }));
    }

    if !branches.is_empty() {
        items.insert("allOf".to_string(), Value::Array(branches));
    }

    Ok(schema)
}
