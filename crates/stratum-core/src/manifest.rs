//! The service manifest (`service.yml`).
//!
//! Parsing happens in two steps. [`ManifestDocument::parse`] turns raw text
//! into an untyped tree so the schema validator can report every shape
//! violation at once. Once the tree is known to be well formed,
//! [`Manifest::from_document`] produces the typed model the later stages
//! work with.
//!
//! # Example
//!
//! ```yaml
//! service: orders
//! owner: team-orders
//! components:
//!   - name: api
//!     type: lambda-api
//!     config:
//!       handler: index.handler
//!     binds:
//!       - to: db
//!         capability: db:postgres
//!         access: readwrite
//!   - name: db
//!     type: rds-postgres
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while turning text into a manifest.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("manifest is empty")]
    Empty,

    #[error("malformed manifest: {0}")]
    Syntax(#[from] serde_yaml::Error),

    #[error("manifest root must be a mapping, found {0}")]
    NotAnObject(&'static str),

    #[error("manifest does not match the expected shape: {0}")]
    Shape(String),

    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
}

/// The parsed but not yet validated manifest tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    tree: Value,
}

impl ManifestDocument {
    /// Parse manifest text (YAML or JSON). The root must be a mapping.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let tree: Value = serde_yaml::from_str(text)?;
        Self::from_tree(tree)
    }

    /// Read and parse a manifest file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Wrap an already-built tree.
    pub fn from_tree(tree: Value) -> Result<Self, ParseError> {
        match tree {
            Value::Object(_) => Ok(Self { tree }),
            other => Err(ParseError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn into_tree(self) -> Value {
        self.tree
    }

    /// Distinct `components[*].type` strings, tolerant of a malformed tree.
    pub fn component_types(&self) -> BTreeSet<String> {
        self.tree
            .get("components")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|c| c.get("type").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}

/// Human-readable JSON type name.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Typed manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_version: Option<String>,

    /// Service name.
    pub service: String,

    /// Owning team.
    pub owner: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Per-environment values available as `${env:key}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, EnvironmentBlock>,

    /// Components in declaration order.
    #[serde(default)]
    pub components: Vec<ComponentSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governance: Option<Governance>,
}

impl Manifest {
    /// Build the typed model from a (schema-valid) document.
    pub fn from_document(document: &ManifestDocument) -> Result<Self, ParseError> {
        serde_json::from_value(document.tree.clone()).map_err(|e| ParseError::Shape(e.to_string()))
    }

    /// Parse text straight into the typed model, skipping schema validation.
    pub fn from_yaml(text: &str) -> Result<Self, ParseError> {
        Self::from_document(&ManifestDocument::parse(text)?)
    }

    pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn component_names(&self) -> BTreeSet<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn suppressions(&self) -> &[Suppression] {
        self.governance
            .as_ref()
            .and_then(|g| g.cdk_nag.as_ref())
            .map(|n| n.suppress.as_slice())
            .unwrap_or_default()
    }

    /// Governance override block for a component, if any.
    pub fn policy_override(&self, component: &str) -> Option<&Value> {
        self.governance.as_ref()?.overrides.get(component)
    }
}

/// Values scoped to one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentBlock {
    #[serde(default)]
    pub defaults: Map<String, Value>,
}

/// One component entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Unique name within the manifest.
    pub name: String,

    /// Key into the component registry (e.g. `lambda-api`).
    #[serde(rename = "type")]
    pub component_type: String,

    /// Component overrides; shape defined by the type's schema.
    #[serde(default = "empty_object")]
    pub config: Value,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<BindDirective>,

    /// Environment-specific override blocks merged into `config`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Access level requested by a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
    Readwrite,
    Admin,
    Assume,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 5] = [
        AccessLevel::Read,
        AccessLevel::Write,
        AccessLevel::Readwrite,
        AccessLevel::Admin,
        AccessLevel::Assume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Readwrite => "readwrite",
            AccessLevel::Admin => "admin",
            AccessLevel::Assume => "assume",
        }
    }

    pub fn allows_read(&self) -> bool {
        matches!(self, AccessLevel::Read | AccessLevel::Readwrite | AccessLevel::Admin)
    }

    pub fn allows_write(&self) -> bool {
        matches!(self, AccessLevel::Write | AccessLevel::Readwrite | AccessLevel::Admin)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `binds` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindDirective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,

    /// `category:type`.
    pub capability: String,

    pub access: AccessLevel,

    /// Default env var name → replacement name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_env_vars: BTreeMap<String, String>,
}

/// How a directive names its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindTarget<'a> {
    Direct(&'a str),
    Selector(&'a str),
}

impl BindDirective {
    /// The target, or `None` unless exactly one of `to`/`select` is set.
    pub fn target(&self) -> Option<BindTarget<'_>> {
        match (&self.to, &self.select) {
            (Some(to), None) => Some(BindTarget::Direct(to)),
            (None, Some(select)) => Some(BindTarget::Selector(select)),
            _ => None,
        }
    }
}

/// Governance block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Governance {
    #[serde(rename = "cdkNag", default, skip_serializing_if = "Option::is_none")]
    pub cdk_nag: Option<CdkNag>,

    /// Component name → policy override object (highest precedence layer).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdkNag {
    #[serde(default)]
    pub suppress: Vec<Suppression>,
}

/// A compliance-rule suppression. Every field is required; presence is
/// checked by the reference validator so all gaps are reported together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suppression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<String>,
    /// Component names the suppression is scoped to; empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MINIMAL: &str = r#"
service: orders
owner: team
components:
  - name: api
    type: lambda-api
    config:
      handler: index.handler
    binds:
      - to: db
        capability: db:postgres
        access: read
        customEnvVars:
          DB_HOST: ORDERS_DB_HOST
  - name: db
    type: rds-postgres
governance:
  cdkNag:
    suppress:
      - id: AwsSolutions-IAM5
        justification: wildcard needed
        owner: platform
        expiresOn: 2030-01-01
"#;

    #[test]
    fn parses_minimal_manifest() {
        let manifest = Manifest::from_yaml(MINIMAL).unwrap();
        assert_eq!(manifest.service, "orders");
        assert_eq!(manifest.components.len(), 2);

        let api = manifest.component("api").unwrap();
        assert_eq!(api.component_type, "lambda-api");
        assert_eq!(api.config, json!({"handler": "index.handler"}));
        assert_eq!(api.binds[0].access, AccessLevel::Read);
        assert_eq!(api.binds[0].target(), Some(BindTarget::Direct("db")));
        assert_eq!(api.binds[0].custom_env_vars["DB_HOST"], "ORDERS_DB_HOST");

        let db = manifest.component("db").unwrap();
        assert_eq!(db.config, json!({}));

        let suppressions = manifest.suppressions();
        assert_eq!(suppressions.len(), 1);
        assert_eq!(suppressions[0].expires_on.as_deref(), Some("2030-01-01"));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = ManifestDocument::parse("service: [unclosed").unwrap_err();
        assert!(matches!(err, ParseError::Syntax(_)));
    }

    #[test]
    fn rejects_non_mapping_root() {
        let err = ManifestDocument::parse("- a\n- b\n").unwrap_err();
        assert!(matches!(err, ParseError::NotAnObject("a sequence")));

        let err = ManifestDocument::parse("just a string").unwrap_err();
        assert!(matches!(err, ParseError::NotAnObject("a string")));
    }

    #[test]
    fn rejects_empty_text() {
        assert!(matches!(ManifestDocument::parse("  \n"), Err(ParseError::Empty)));
    }

    #[test]
    fn accepts_json_text() {
        let doc = ManifestDocument::parse(r#"{"service": "s", "owner": "o", "components": []}"#)
            .unwrap();
        assert_eq!(doc.tree()["service"], "s");
    }

    #[test]
    fn collects_component_types_from_loose_tree() {
        let doc = ManifestDocument::parse(
            "components:\n  - type: a\n  - type: b\n  - type: a\n  - name: no-type\n",
        )
        .unwrap();
        let types: Vec<_> = doc.component_types().into_iter().collect();
        assert_eq!(types, vec!["a", "b"]);
    }

    #[test]
    fn bind_target_requires_exactly_one_field() {
        let both = BindDirective {
            to: Some("a".into()),
            select: Some("type=x".into()),
            capability: "db:postgres".into(),
            access: AccessLevel::Read,
            custom_env_vars: BTreeMap::new(),
        };
        assert_eq!(both.target(), None);

        let neither = BindDirective {
            to: None,
            select: None,
            ..both.clone()
        };
        assert_eq!(neither.target(), None);
    }

    #[test]
    fn access_levels_imply_read_write() {
        assert!(AccessLevel::Readwrite.allows_read());
        assert!(AccessLevel::Readwrite.allows_write());
        assert!(!AccessLevel::Read.allows_write());
        assert!(!AccessLevel::Assume.allows_read());
    }
}
