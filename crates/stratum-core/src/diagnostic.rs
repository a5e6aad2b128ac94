//! Uniform, user-facing shape for every error and warning the pipeline emits.

use crate::path::DocPath;
use serde::Serialize;
use std::fmt;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message.
    Info,
    /// Warning - may indicate a potential issue.
    Warning,
    /// Error - the manifest cannot be resolved.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A located, plain-language finding with an optional suggested fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Short machine-friendly category (`schema`, `reference`, `binding`, ...).
    pub category: String,
    pub path: DocPath,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(category: impl Into<String>, path: DocPath, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category: category.into(),
            path,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn warning(category: impl Into<String>, path: DocPath, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category: category.into(),
            path,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.category, self.path, self.message)
    }
}

/// Anything that can be rendered as a [`Diagnostic`].
pub trait ToDiagnostic {
    fn to_diagnostic(&self) -> Diagnostic;
}

impl ToDiagnostic for Diagnostic {
    fn to_diagnostic(&self) -> Diagnostic {
        self.clone()
    }
}

/// Run independent checks and aggregate every error instead of stopping at
/// the first one.
///
/// Returns `Ok(())` when all checks pass, otherwise every collected error in
/// check order.
pub fn collect_all<E>(checks: impl IntoIterator<Item = Result<(), Vec<E>>>) -> Result<(), Vec<E>> {
    let mut errors = Vec::new();
    for check in checks {
        if let Err(found) = check {
            errors.extend(found);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
