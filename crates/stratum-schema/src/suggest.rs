//! Actionable suggestions for schema violations.
//!
//! Common keywords get category-specific advice that names the concrete
//! constraint (allowed values, limits, pattern) taken from the schema. Any
//! other keyword falls back to a pointer at the documentation.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static REQUIRED_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"(?P<field>[^"]+)" is a required property"#).expect("pattern is valid")
});

const NAME_PATTERN: &str = "^[a-z][a-z0-9-]*$";
const CAPABILITY_PATTERN: &str = "^[a-z][a-z0-9-]*:[a-zA-Z][a-zA-Z0-9-]*$";
const ENV_VAR_PATTERN: &str = "^[A-Z_][A-Z0-9_]*$";

/// Inputs for building a suggestion.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionInput<'a> {
    /// Failed keyword (`required`, `enum`, ...).
    pub keyword: &'a str,
    /// The schema object that holds the keyword, when it could be located.
    pub subschema: Option<&'a Value>,
    /// The validator's message.
    pub message: &'a str,
    /// Last key of the instance path (`access`, `binds`, ...), if any.
    pub field: Option<&'a str>,
}

/// The missing field named by a `required` message.
pub fn required_field(message: &str) -> Option<&str> {
    REQUIRED_PROPERTY
        .captures(message)
        .and_then(|c| c.name("field"))
        .map(|m| m.as_str())
}

/// Suggestion for a missing required field, keyed by known field names.
pub fn required_field_suggestion(field: &str) -> String {
    match field {
        "service" => "Add `service: <name>` at the top of the manifest".to_string(),
        "owner" => "Add `owner: <team>` naming the team that owns the service".to_string(),
        "components" => "Add a `components:` list (it may be empty)".to_string(),
        "name" => "Give the component a unique `name`, e.g. `name: api`".to_string(),
        "type" => {
            "Set `type` to a registered component type (run `stratum components` to list them)"
                .to_string()
        }
        "capability" => "Name the capability to bind, e.g. `capability: db:postgres`".to_string(),
        "access" => {
            "Set `access` to one of: read, write, readwrite, admin, assume".to_string()
        }
        other => format!("Add the required field '{}'", other),
    }
}

/// Build the suggestion for one violation.
pub fn suggest(input: SuggestionInput<'_>) -> String {
    let keyword_value = input.subschema.and_then(|s| s.get(input.keyword));

    match input.keyword {
        "required" => required_field(input.message)
            .map(required_field_suggestion)
            .unwrap_or_else(|| "Add the missing required field".to_string()),
        "enum" => match keyword_value.and_then(Value::as_array) {
            Some(options) => format!("Use one of: {}", join_values(options)),
            None => "Use one of the allowed values".to_string(),
        },
        "const" => match keyword_value {
            Some(value) => format!("Use the value {}", render_value(value)),
            None => "Use the required constant value".to_string(),
        },
        "pattern" => match keyword_value.and_then(Value::as_str) {
            Some(NAME_PATTERN) => {
                "Use lowercase letters, digits and hyphens, starting with a letter".to_string()
            }
            Some(CAPABILITY_PATTERN) => {
                "Use the form `category:type`, e.g. `db:postgres` or `iam:assumeRole`".to_string()
            }
            Some(ENV_VAR_PATTERN) => {
                "Environment variable names use uppercase letters, digits and underscores"
                    .to_string()
            }
            Some(pattern) => format!("Make the value match the pattern `{}`", pattern),
            None => "Make the value match the required pattern".to_string(),
        },
        "minLength" => match keyword_value {
            Some(limit) => format!("Provide at least {} character(s)", render_value(limit)),
            None => "Provide a longer value".to_string(),
        },
        "maxLength" => match keyword_value {
            Some(limit) => format!("Shorten the value to at most {} character(s)", render_value(limit)),
            None => "Provide a shorter value".to_string(),
        },
        "minimum" => match keyword_value {
            Some(limit) => format!("Use a value of at least {}", render_value(limit)),
            None => "Use a larger value".to_string(),
        },
        "maximum" => match keyword_value {
            Some(limit) => format!("Use a value of at most {}", render_value(limit)),
            None => "Use a smaller value".to_string(),
        },
        "exclusiveMinimum" => match keyword_value {
            Some(limit) => format!("Use a value greater than {}", render_value(limit)),
            None => "Use a larger value".to_string(),
        },
        "exclusiveMaximum" => match keyword_value {
            Some(limit) => format!("Use a value less than {}", render_value(limit)),
            None => "Use a smaller value".to_string(),
        },
        "minItems" => match keyword_value {
            Some(limit) => format!("Provide at least {} item(s)", render_value(limit)),
            None => "Provide more items".to_string(),
        },
        "maxItems" => match keyword_value {
            Some(limit) => format!("Provide at most {} item(s)", render_value(limit)),
            None => "Provide fewer items".to_string(),
        },
        "type" => match keyword_value {
            Some(Value::String(kind)) => format!("Provide a value of type {}", kind),
            Some(Value::Array(kinds)) => format!("Provide a value of type {}", join_values(kinds)),
            _ => "Provide a value of the expected type".to_string(),
        },
        "oneOf" if is_bind_entry(input) => {
            "Specify exactly one of `to` (a component name) or `select` (a selector)".to_string()
        }
        "oneOf" => "Make the value match exactly one of the allowed shapes".to_string(),
        "additionalProperties" | "unevaluatedProperties" => {
            "Remove the unrecognized property or check its spelling".to_string()
        }
        other => format!("Check the documentation for the '{}' constraint", other),
    }
}

fn is_bind_entry(input: SuggestionInput<'_>) -> bool {
    input
        .subschema
        .and_then(|s| s.get("properties"))
        .map(|p| p.get("to").is_some() && p.get("select").is_some())
        .unwrap_or(false)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(render_value)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input<'a>(keyword: &'a str, subschema: Option<&'a Value>, message: &'a str) -> SuggestionInput<'a> {
        SuggestionInput {
            keyword,
            subschema,
            message,
            field: None,
        }
    }

    #[test]
    fn required_uses_known_field_names() {
        let s = suggest(input("required", None, "\"owner\" is a required property"));
        assert!(s.contains("owner: <team>"));

        let s = suggest(input("required", None, "\"retention\" is a required property"));
        assert_eq!(s, "Add the required field 'retention'");
    }

    #[test]
    fn enum_lists_allowed_values() {
        let schema = json!({"enum": ["read", "write"]});
        let s = suggest(input("enum", Some(&schema), "\"delete\" is not one of"));
        assert_eq!(s, "Use one of: read, write");
    }

    #[test]
    fn limits_are_named() {
        let schema = json!({"minimum": 128, "maxLength": 10});
        assert_eq!(
            suggest(input("minimum", Some(&schema), "")),
            "Use a value of at least 128"
        );
        assert_eq!(
            suggest(input("maxLength", Some(&schema), "")),
            "Shorten the value to at most 10 character(s)"
        );
    }

    #[test]
    fn known_patterns_are_explained() {
        let schema = json!({"pattern": CAPABILITY_PATTERN});
        assert!(suggest(input("pattern", Some(&schema), "")).contains("category:type"));

        let schema = json!({"pattern": "^x+$"});
        assert_eq!(
            suggest(input("pattern", Some(&schema), "")),
            "Make the value match the pattern `^x+$`"
        );
    }

    #[test]
    fn one_of_on_binds_explains_to_and_select() {
        let schema = json!({"properties": {"to": {}, "select": {}}, "oneOf": []});
        assert!(suggest(input("oneOf", Some(&schema), "")).contains("exactly one of `to`"));
    }

    #[test]
    fn unmapped_keywords_fall_back_to_documentation() {
        assert_eq!(
            suggest(input("dependentRequired", None, "")),
            "Check the documentation for the 'dependentRequired' constraint"
        );
    }
}
