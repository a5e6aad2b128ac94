//! Error types for the resolution pipeline.
//!
//! Hydration fails fast with a single [`HydrationError`]. Reference checks,
//! config building and binding collect every problem they find; the engine
//! surfaces them together in a [`ResolutionFailure`] tagged with the stage
//! that failed.

use serde::Serialize;
use std::fmt;
use stratum_binder::BindingError;
use stratum_core::{
    CollaboratorError, Diagnostic, DocPath, ExprError, ParseError, Severity, ToDiagnostic,
};
use stratum_schema::SchemaError;
use thiserror::Error;

use crate::engine::Stage;

// =============================================================================
// HYDRATION
// =============================================================================

/// Error raised while merging environment blocks or resolving expressions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydrationError {
    #[error("{path}: cannot merge environment block: {message}")]
    MergeConflict { path: DocPath, message: String },

    #[error("{path}: {source}")]
    Syntax { path: DocPath, source: ExprError },

    #[error("{path}: reference {reference} names undeclared component '{component}'")]
    UnknownComponent {
        path: DocPath,
        reference: String,
        component: String,
    },

    #[error("{path}: reference {reference} does not resolve to a value")]
    UnresolvedPath { path: DocPath, reference: String },

    #[error("{path}: {expression} is not defined for environment '{environment}'")]
    UnknownEnvKey {
        path: DocPath,
        expression: String,
        environment: String,
    },

    #[error("{path}: {expression} resolves to {kind}, which cannot be embedded in a larger string")]
    NotEmbeddable {
        path: DocPath,
        expression: String,
        kind: &'static str,
    },

    #[error("{path}: reference cycle {}", .chain.join(" -> "))]
    Cycle { path: DocPath, chain: Vec<String> },

    #[error("hydrated manifest does not match the expected shape: {0}")]
    Shape(String),
}

impl HydrationError {
    pub fn path(&self) -> DocPath {
        match self {
            HydrationError::MergeConflict { path, .. }
            | HydrationError::Syntax { path, .. }
            | HydrationError::UnknownComponent { path, .. }
            | HydrationError::UnresolvedPath { path, .. }
            | HydrationError::UnknownEnvKey { path, .. }
            | HydrationError::NotEmbeddable { path, .. }
            | HydrationError::Cycle { path, .. } => path.clone(),
            HydrationError::Shape(_) => DocPath::root(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            HydrationError::MergeConflict { .. } => {
                Some("Environment blocks must be mappings of config overrides".to_string())
            }
            HydrationError::UnknownComponent { component, .. } => Some(format!(
                "Declare a component named '{}' or fix the reference",
                component
            )),
            HydrationError::UnknownEnvKey { environment, .. } => Some(format!(
                "Add the key under `environments.{}.defaults`",
                environment
            )),
            HydrationError::NotEmbeddable { .. } => Some(
                "Use the reference as the whole value, or reference a scalar attribute".to_string(),
            ),
            HydrationError::Cycle { .. } => {
                Some("Break the cycle by replacing one reference with a literal".to_string())
            }
            _ => None,
        }
    }
}

impl ToDiagnostic for HydrationError {
    fn to_diagnostic(&self) -> Diagnostic {
        // Display carries the path; the diagnostic keeps it separate.
        let message = match self {
            HydrationError::MergeConflict { message, .. } => {
                format!("cannot merge environment block: {}", message)
            }
            HydrationError::Syntax { source, .. } => source.to_string(),
            HydrationError::UnknownComponent {
                reference,
                component,
                ..
            } => format!(
                "reference {} names undeclared component '{}'",
                reference, component
            ),
            HydrationError::UnresolvedPath { reference, .. } => {
                format!("reference {} does not resolve to a value", reference)
            }
            HydrationError::UnknownEnvKey {
                expression,
                environment,
                ..
            } => format!("{} is not defined for environment '{}'", expression, environment),
            HydrationError::NotEmbeddable {
                expression, kind, ..
            } => format!(
                "{} resolves to {}, which cannot be embedded in a larger string",
                expression, kind
            ),
            HydrationError::Cycle { chain, .. } => {
                format!("reference cycle {}", chain.join(" -> "))
            }
            HydrationError::Shape(message) => message.clone(),
        };
        let diagnostic = Diagnostic::error("hydration", self.path(), message);
        match self.suggestion() {
            Some(suggestion) => diagnostic.with_suggestion(suggestion),
            None => diagnostic,
        }
    }
}

// =============================================================================
// REFERENCES
// =============================================================================

/// A cross-reference problem. All of them are collected before failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceError {
    pub path: DocPath,
    pub kind: ReferenceErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceErrorKind {
    DuplicateComponent,
    UnknownBindTarget,
    InvalidBindTarget,
    UnknownReference,
    MalformedReference,
    UnknownOverrideTarget,
    IncompleteSuppression,
    InvalidExpiry,
    UnknownSuppressionTarget,
}

impl ReferenceError {
    pub fn new(path: DocPath, kind: ReferenceErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ReferenceError {}

impl ToDiagnostic for ReferenceError {
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            category: "reference".to_string(),
            path: self.path.clone(),
            message: self.message.clone(),
            suggestion: self.suggestion.clone(),
        }
    }
}

// =============================================================================
// CONFIG BUILDING
// =============================================================================

/// A component whose configuration could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigBuildError {
    pub component: String,
    pub path: DocPath,
    pub kind: ConfigBuildErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigBuildErrorKind {
    /// The component type is not registered.
    UnknownType,
    /// A layer is not a mapping.
    NotAnObject,
    /// Normalization found a cross-field violation.
    Normalization,
    /// The final configuration violates the type schema.
    Schema,
}

impl ConfigBuildError {
    pub fn new(
        component: impl Into<String>,
        path: DocPath,
        kind: ConfigBuildErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            path,
            kind,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ConfigBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.component, self.path, self.message)
    }
}

impl std::error::Error for ConfigBuildError {}

impl ToDiagnostic for ConfigBuildError {
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            category: "config".to_string(),
            path: self.path.clone(),
            message: self.message.clone(),
            suggestion: self.suggestion.clone(),
        }
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Any error a stage can fail with.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Hydration(#[from] HydrationError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    ConfigBuild(#[from] ConfigBuildError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("component '{component}': {source}")]
    Collaborator {
        component: String,
        path: DocPath,
        source: CollaboratorError,
    },

    #[error("resolution was cancelled")]
    Cancelled,
}

impl ToDiagnostic for StageError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            StageError::Parse(error) => Diagnostic::error("parse", DocPath::root(), error.to_string())
                .with_suggestion("Check the manifest is valid YAML with a mapping at the root"),
            StageError::Schema(error) => error.to_diagnostic(),
            StageError::Hydration(error) => error.to_diagnostic(),
            StageError::Reference(error) => error.to_diagnostic(),
            StageError::ConfigBuild(error) => error.to_diagnostic(),
            StageError::Binding(error) => error.to_diagnostic(),
            StageError::Collaborator { path, source, .. } => {
                Diagnostic::error("synthesis", path.clone(), source.to_string())
            }
            StageError::Cancelled => {
                Diagnostic::error("cancelled", DocPath::root(), "resolution was cancelled")
            }
        }
    }
}

/// A failed run: the stage that failed and every error it produced.
#[derive(Debug)]
pub struct ResolutionFailure {
    pub stage: Stage,
    pub errors: Vec<StageError>,
    /// Warnings gathered before the failure.
    pub warnings: Vec<Diagnostic>,
}

impl ResolutionFailure {
    pub fn new(stage: Stage, errors: Vec<StageError>) -> Self {
        Self {
            stage,
            errors,
            warnings: Vec::new(),
        }
    }

    pub fn single(stage: Stage, error: impl Into<StageError>) -> Self {
        Self::new(stage, vec![error.into()])
    }

    pub fn cancelled(stage: Stage) -> Self {
        Self::new(stage, vec![StageError::Cancelled])
    }

    pub fn is_cancelled(&self) -> bool {
        self.errors.iter().any(|e| matches!(e, StageError::Cancelled))
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors.iter().map(ToDiagnostic::to_diagnostic).collect()
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stage failed with {} error(s)",
            self.stage,
            self.errors.len()
        )?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolutionFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hydration_errors_name_reference_and_location() {
        let error = HydrationError::UnknownComponent {
            path: DocPath::component(2).key("config").key("environment"),
            reference: "${ref:ghost.x}".into(),
            component: "ghost".into(),
        };
        assert_eq!(
            error.to_string(),
            "root.components[2].config.environment: reference ${ref:ghost.x} names undeclared component 'ghost'"
        );

        let diagnostic = error.to_diagnostic();
        assert_eq!(diagnostic.category, "hydration");
        assert!(!diagnostic.message.starts_with("root."));
        assert!(diagnostic.suggestion.unwrap().contains("ghost"));
    }

    #[test]
    fn cycle_lists_the_chain() {
        let error = HydrationError::Cycle {
            path: DocPath::component(0).key("config").key("a"),
            chain: vec!["${ref:a.x}".into(), "${ref:b.y}".into(), "${ref:a.x}".into()],
        };
        assert!(error.to_string().ends_with("${ref:a.x} -> ${ref:b.y} -> ${ref:a.x}"));
    }
}
