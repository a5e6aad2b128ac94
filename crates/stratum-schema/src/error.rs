//! Error types for schema loading and validation.

use serde::Serialize;
use std::path::PathBuf;
use stratum_core::{Diagnostic, DocPath, Severity, ToDiagnostic};
use thiserror::Error;

/// Errors that can occur while loading or compiling schemas.
#[derive(Debug, Error)]
pub enum SchemaLoadError {
    /// A schema file could not be read.
    #[error("failed to read schema file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A schema is not valid JSON.
    #[error("schema '{name}' is not valid JSON: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A schema is valid JSON but not a valid JSON Schema.
    #[error("schema '{name}' failed to compile: {message}")]
    Compile { name: String, message: String },

    /// A component type is not registered.
    #[error("component type '{0}' is not registered")]
    UnknownType(String),
}

/// One schema violation, mapped to a located message with a suggested fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaError {
    pub path: DocPath,
    /// JSON Schema keyword that failed (`required`, `enum`, ...).
    pub keyword: String,
    pub message: String,
    pub suggestion: String,
    pub severity: Severity,
}

impl SchemaError {
    /// A schema-loading failure surfaced as a validation error at the root.
    pub fn from_load_error(error: &SchemaLoadError) -> Self {
        Self {
            path: DocPath::root(),
            keyword: "schema-load".to_string(),
            message: error.to_string(),
            suggestion: "Check that the schema files are present and valid JSON Schema".to_string(),
            severity: Severity::Error,
        }
    }
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for SchemaError {}

impl ToDiagnostic for SchemaError {
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: self.severity,
            category: "schema".to_string(),
            path: self.path.clone(),
            message: self.message.clone(),
            suggestion: Some(self.suggestion.clone()),
        }
    }
}
