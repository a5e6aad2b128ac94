//! Binding error types.
//!
//! Each failed `binds` entry produces one [`BindingError`]. Failures are
//! independent: one broken directive never hides another.

use serde::Serialize;
use std::fmt;
use stratum_core::{AccessLevel, Diagnostic, DocPath, Severity, ToDiagnostic};
use thiserror::Error;

/// Error type for a failed binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingError {
    /// `<source>.binds[<index>]`.
    pub binding_id: String,
    /// Location of the offending field.
    pub path: DocPath,
    pub kind: BindingErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Kinds of binding errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingErrorKind {
    /// Neither or both of `to`/`select` were given.
    InvalidDirective,
    /// `to` names no declared component.
    TargetNotFound,
    /// The selector expression could not be parsed.
    InvalidSelector,
    /// The selector matched no component.
    SelectorNoMatch,
    /// The selector matched more than one component.
    SelectorAmbiguous,
    /// The target does not declare the requested capability.
    CapabilityNotProvided,
    /// No strategy handles the (source type, capability) pair.
    Unsupported,
    /// More than one strategy claims the (source type, capability) pair.
    AmbiguousStrategy,
    /// The strategy does not support the requested access level.
    AccessNotSupported,
    /// The strategy rejected the binding for another reason.
    StrategyFailed,
    /// The target has a failed binding of its own.
    TargetNotReady,
}

impl BindingError {
    /// Create a new binding error.
    pub fn new(
        binding_id: impl Into<String>,
        path: DocPath,
        kind: BindingErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            binding_id: binding_id.into(),
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

    // =========================================================================
    // TARGET RESOLUTION
    // =========================================================================

    pub fn invalid_directive(binding_id: &str, path: DocPath) -> Self {
        Self::new(
            binding_id,
            path,
            BindingErrorKind::InvalidDirective,
            "binding must specify exactly one of 'to' or 'select'",
        )
        .with_suggestion("Use `to: <component>` for a direct target or `select: <selector>`")
    }

    pub fn target_not_found(binding_id: &str, path: DocPath, target: &str) -> Self {
        Self::new(
            binding_id,
            path,
            BindingErrorKind::TargetNotFound,
            format!("binding target '{}' is not a declared component", target),
        )
        .with_suggestion(format!("Declare a component named '{}' or fix the name", target))
    }

    pub fn invalid_selector(binding_id: &str, path: DocPath, reason: impl fmt::Display) -> Self {
        Self::new(
            binding_id,
            path,
            BindingErrorKind::InvalidSelector,
            format!("invalid selector: {}", reason),
        )
        .with_suggestion("Selectors are comma-separated `key=value` terms, e.g. `type=rds-postgres,label.tier=primary`")
    }

    pub fn selector_no_match(binding_id: &str, path: DocPath, selector: &str) -> Self {
        Self::new(
            binding_id,
            path,
            BindingErrorKind::SelectorNoMatch,
            format!("selector '{}' matched no component", selector),
        )
    }

    pub fn selector_ambiguous(
        binding_id: &str,
        path: DocPath,
        selector: &str,
        candidates: &[String],
    ) -> Self {
        Self::new(
            binding_id,
            path,
            BindingErrorKind::SelectorAmbiguous,
            format!(
                "selector '{}' matched {} components: {}",
                selector,
                candidates.len(),
                candidates.join(", ")
            ),
        )
        .with_suggestion("Narrow the selector or bind with `to:` instead")
    }

    // =========================================================================
    // CAPABILITY AND STRATEGY
    // =========================================================================

    pub fn capability_not_provided(
        binding_id: &str,
        path: DocPath,
        target: &str,
        capability: &str,
        provided: &[String],
    ) -> Self {
        let error = Self::new(
            binding_id,
            path,
            BindingErrorKind::CapabilityNotProvided,
            format!("target '{}' does not provide capability {}", target, capability),
        );
        if provided.is_empty() {
            error
        } else {
            error.with_suggestion(format!("'{}' provides: {}", target, provided.join(", ")))
        }
    }

    pub fn unsupported(binding_id: &str, path: DocPath, source_type: &str, capability: &str) -> Self {
        Self::new(
            binding_id,
            path,
            BindingErrorKind::Unsupported,
            format!(
                "no binding strategy supports {} binding to {}",
                source_type, capability
            ),
        )
        .with_suggestion("Run `stratum capabilities` to list supported combinations")
    }

    pub fn ambiguous_strategy(
        binding_id: &str,
        path: DocPath,
        conflict: &BinderRegistryError,
    ) -> Self {
        Self::new(
            binding_id,
            path,
            BindingErrorKind::AmbiguousStrategy,
            conflict.to_string(),
        )
        .with_suggestion("Register at most one binder strategy per source type and capability")
    }

    pub fn access_not_supported(
        binding_id: &str,
        path: DocPath,
        capability: &str,
        access: AccessLevel,
        supported: &[AccessLevel],
    ) -> Self {
        let options = supported
            .iter()
            .map(AccessLevel::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Self::new(
            binding_id,
            path,
            BindingErrorKind::AccessNotSupported,
            format!("access '{}' is not supported for {}", access, capability),
        )
        .with_suggestion(format!("Use one of: {}", options))
    }

    pub fn target_not_ready(binding_id: &str, path: DocPath, target: &str) -> Self {
        Self::new(
            binding_id,
            path,
            BindingErrorKind::TargetNotReady,
            format!("target '{}' is not ready: it has failed bindings of its own", target),
        )
        .with_suggestion(format!("Fix the bindings of '{}' first", target))
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.binding_id, self.path, self.message)
    }
}

impl std::error::Error for BindingError {}

impl ToDiagnostic for BindingError {
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            category: "binding".to_string(),
            path: self.path.clone(),
            message: self.message.clone(),
            suggestion: self.suggestion.clone(),
        }
    }
}

/// Errors raised while building a [`crate::BinderRegistry`]. Always fatal at
/// startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BinderRegistryError {
    #[error(
        "strategies {strategies:?} all handle source type '{source_type}' binding to '{capability}'"
    )]
    Conflict {
        capability: String,
        source_type: String,
        strategies: Vec<String>,
    },

    #[error("strategy '{strategy}' registers invalid capability name '{capability}'")]
    InvalidCapability { strategy: String, capability: String },

    #[error(
        "strategy '{strategy}' lists capability '{listed}' in its compatibility matrix but is registered for '{capability}'"
    )]
    MatrixMismatch {
        strategy: String,
        capability: String,
        listed: String,
    },
}
