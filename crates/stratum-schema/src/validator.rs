//! Manifest and component-config validation against JSON Schema.
//!
//! Validation always runs in all-errors mode: every violation in the tree is
//! reported, each mapped to a located [`SchemaError`] with a suggestion.

use crate::cache::SchemaCache;
use crate::error::SchemaError;
use crate::suggest::{SuggestionInput, suggest};
use jsonschema::Validator;
use serde_json::Value;
use stratum_core::path::Segment;
use stratum_core::{
    ComponentDefinition, ComponentRegistry, DocPath, ManifestDocument, Severity, Template,
};

/// Validates manifests against the composed schema for their component types.
pub struct SchemaValidator<'a> {
    cache: &'a SchemaCache,
    registry: &'a ComponentRegistry,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(cache: &'a SchemaCache, registry: &'a ComponentRegistry) -> Self {
        Self { cache, registry }
    }

    /// Validate a parsed manifest. Returns every violation found.
    pub fn validate(&self, document: &ManifestDocument) -> Result<(), Vec<SchemaError>> {
        let types = document.component_types();
        let composed = self
            .cache
            .composed(self.registry, &types)
            .map_err(|e| vec![SchemaError::from_load_error(&e)])?;

        let errors = collect_errors(
            &composed.validator,
            &composed.schema,
            document.tree(),
            &DocPath::root(),
            |pointer| is_pending_config_expression(document.tree(), pointer),
        );

        tracing::debug!(
            component_types = types.len(),
            errors = errors.len(),
            "Validated manifest against composed schema"
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate a component configuration against its type schema. Paths are
    /// reported relative to `base_path` (typically `root.components[i].config`).
    pub fn validate_config(
        &self,
        definition: &dyn ComponentDefinition,
        config: &Value,
        base_path: &DocPath,
    ) -> Result<(), Vec<SchemaError>> {
        validate_config(self.cache, definition, config, base_path)
    }
}

/// Free-standing form of [`SchemaValidator::validate_config`] for callers that
/// only hold a cache.
pub fn validate_config(
    cache: &SchemaCache,
    definition: &dyn ComponentDefinition,
    config: &Value,
    base_path: &DocPath,
) -> Result<(), Vec<SchemaError>> {
    let validator = cache
        .component_validator(definition)
        .map_err(|e| vec![SchemaError::from_load_error(&e)])?;
    let schema = crate::compose::embeddable_config_schema(
        definition.type_name(),
        definition.config_schema(),
    )
    .map_err(|e| vec![SchemaError::from_load_error(&e)])?;

    let errors = collect_errors(&validator, &schema, config, base_path, |_| false);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn collect_errors(
    validator: &Validator,
    schema: &Value,
    instance: &Value,
    base_path: &DocPath,
    skip: impl Fn(&str) -> bool,
) -> Vec<SchemaError> {
    validator
        .iter_errors(instance)
        .filter_map(|error| {
            let instance_pointer = error.instance_path().to_string();
            if skip(&instance_pointer) {
                return None;
            }
            let schema_pointer = error.schema_path().to_string();
            let message = error.to_string();
            Some(map_error(schema, base_path, &instance_pointer, &schema_pointer, message))
        })
        .collect()
}

/// True when the value at `pointer` sits inside a component's `config` and is
/// a string consisting of exactly one `${ref:..}` or `${env:..}` expression.
///
/// Such values take their type from whatever they resolve to, so the
/// manifest-level pass leaves them alone; the per-component config check
/// after hydration validates the resolved value.
fn is_pending_config_expression(tree: &Value, pointer: &str) -> bool {
    let mut tokens = pointer.split('/').skip(1);
    let in_config = matches!(
        (tokens.next(), tokens.next(), tokens.next()),
        (Some("components"), Some(index), Some("config")) if index.parse::<usize>().is_ok()
    );
    if !in_config {
        return false;
    }
    match tree.pointer(pointer) {
        Some(Value::String(text)) => Template::parse(text)
            .map(|template| template.single_expression().is_some())
            .unwrap_or(false),
        _ => false,
    }
}

/// Turn one raw validator error into a located [`SchemaError`].
fn map_error(
    schema: &Value,
    base_path: &DocPath,
    instance_pointer: &str,
    schema_pointer: &str,
    message: String,
) -> SchemaError {
    let path = base_path.join(&DocPath::from_json_pointer(instance_pointer));
    let (keyword, subschema_pointer) = split_keyword(schema_pointer);
    let subschema = schema.pointer(subschema_pointer);
    let field = path.segments().iter().rev().find_map(|s| match s {
        Segment::Key(k) => Some(k.as_str()),
        Segment::Index(_) => None,
    });

    let suggestion = suggest(SuggestionInput {
        keyword,
        subschema,
        message: &message,
        field,
    });

    SchemaError {
        path,
        keyword: keyword.to_string(),
        message,
        suggestion,
        severity: Severity::Error,
    }
}

/// Split a schema path into the failing keyword and the pointer of the
/// schema object that holds it. Trailing numeric segments (array positions
/// inside a keyword such as `type: [..]`) are skipped.
fn split_keyword(schema_pointer: &str) -> (&str, &str) {
    let mut rest = schema_pointer;
    while let Some(idx) = rest.rfind('/') {
        let segment = &rest[idx + 1..];
        if segment.is_empty() || segment.chars().all(|c| c.is_ascii_digit()) {
            rest = &rest[..idx];
            continue;
        }
        return (segment, &rest[..idx]);
    }
    ("schema", "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn splits_keyword_from_schema_path() {
        assert_eq!(
            split_keyword("/properties/owner/minLength"),
            ("minLength", "/properties/owner")
        );
        assert_eq!(split_keyword("/required"), ("required", ""));
        assert_eq!(split_keyword("/properties/x/type/1"), ("type", "/properties/x"));
        assert_eq!(split_keyword(""), ("schema", ""));
    }

    #[test]
    fn maps_enum_error_with_allowed_values() {
        let schema = json!({"properties": {"access": {"enum": ["read", "write"]}}});
        let error = map_error(
            &schema,
            &DocPath::component(0).key("binds").index(0),
            "/access",
            "/properties/access/enum",
            "\"delete\" is not one of [\"read\",\"write\"]".to_string(),
        );
        assert_eq!(error.path.to_string(), "root.components[0].binds[0].access");
        assert_eq!(error.keyword, "enum");
        assert_eq!(error.suggestion, "Use one of: read, write");
    }

    #[test]
    fn whole_string_expressions_in_config_are_pending() {
        let tree = json!({
            "service": "${env:name}",
            "components": [{
                "name": "api",
                "config": {
                    "timeout": "${ref:queue.visibilityTimeoutSeconds}",
                    "url": "https://${env:host}/v1",
                    "memorySize": "large"
                }
            }]
        });
        assert!(is_pending_config_expression(&tree, "/components/0/config/timeout"));
        assert!(!is_pending_config_expression(&tree, "/components/0/config/url"));
        assert!(!is_pending_config_expression(&tree, "/components/0/config/memorySize"));
        assert!(!is_pending_config_expression(&tree, "/service"));
        assert!(!is_pending_config_expression(&tree, "/components/0/config/missing"));
    }

    #[test]
    fn maps_root_required_error() {
        let error = map_error(
            &json!({"required": ["owner"]}),
            &DocPath::root(),
            "",
            "/required",
            "\"owner\" is a required property".to_string(),
        );
        assert_eq!(error.path.to_string(), "root");
        assert_eq!(error.keyword, "required");
        assert!(error.suggestion.contains("owner"));
    }
}
