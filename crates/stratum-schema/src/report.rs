//! Validation reports.
//!
//! A [`ValidationResult`] carries every diagnostic of a run and renders it
//! either as a grouped, human-readable summary or as JSON for tooling.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use stratum_core::{Diagnostic, DocPath, Severity, ToDiagnostic};

const RULE_WIDTH: usize = 60;

/// Outcome of validating (or resolving) a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Diagnostic>,
}

impl ValidationResult {
    /// A passing result.
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Build a result from any diagnosable errors.
    pub fn from_errors<E: ToDiagnostic>(errors: &[E]) -> Self {
        let errors: Vec<Diagnostic> = errors.iter().map(ToDiagnostic::to_diagnostic).collect();
        Self {
            valid: errors.is_empty(),
            errors,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<Diagnostic>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Errors grouped by location, paths in document order.
    pub fn group_by_path(&self) -> BTreeMap<&DocPath, Vec<&Diagnostic>> {
        group_by_path(&self.errors)
    }

    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Grouped summary for terminals.
    pub fn render_human(&self) -> String {
        let mut out = String::new();

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\n❌ Errors ({}):", self.errors.len());
            let _ = writeln!(out, "{}", "─".repeat(RULE_WIDTH));
            for (path, diagnostics) in self.group_by_path() {
                let _ = writeln!(out, "  {}", path);
                for diagnostic in diagnostics {
                    write_diagnostic(&mut out, diagnostic);
                }
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\n⚠️  Warnings ({}):", self.warnings.len());
            let _ = writeln!(out, "{}", "─".repeat(RULE_WIDTH));
            for (path, diagnostics) in group_by_path(&self.warnings) {
                let _ = writeln!(out, "  {}", path);
                for diagnostic in diagnostics {
                    write_diagnostic(&mut out, diagnostic);
                }
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{}", "═".repeat(RULE_WIDTH));
        if self.errors.is_empty() && self.warnings.is_empty() {
            let _ = writeln!(out, "✅ Manifest is valid");
        } else {
            let _ = writeln!(
                out,
                "Summary: {} error(s), {} warning(s)",
                self.errors.len(),
                self.warnings.len()
            );
            if !self.errors.is_empty() {
                let _ = writeln!(out, "\n❌ Manifest has errors that must be fixed.");
            }
        }
        out
    }
}

/// Group diagnostics by path. Order within a group is preserved.
pub fn group_by_path(diagnostics: &[Diagnostic]) -> BTreeMap<&DocPath, Vec<&Diagnostic>> {
    let mut groups: BTreeMap<&DocPath, Vec<&Diagnostic>> = BTreeMap::new();
    for diagnostic in diagnostics {
        groups.entry(&diagnostic.path).or_default().push(diagnostic);
    }
    groups
}

fn write_diagnostic(out: &mut String, diagnostic: &Diagnostic) {
    let icon = match diagnostic.severity {
        Severity::Error => "✗",
        Severity::Warning => "⚠",
        Severity::Info => "ℹ",
    };
    let _ = writeln!(
        out,
        "    {} [{}] {}",
        icon, diagnostic.category, diagnostic.message
    );
    if let Some(suggestion) = &diagnostic.suggestion {
        let _ = writeln!(out, "      → {}", suggestion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ValidationResult {
        ValidationResult::from_errors(&[
            Diagnostic::error("schema", DocPath::component(1), "b"),
            Diagnostic::error("schema", DocPath::root(), "a")
                .with_suggestion("Add `owner: <team>`"),
            Diagnostic::error("schema", DocPath::component(1), "c"),
        ])
    }

    #[test]
    fn groups_errors_by_path() {
        let result = sample();
        let groups = result.group_by_path();
        let keys: Vec<String> = groups.keys().map(|p| p.to_string()).collect();
        assert_eq!(keys, vec!["root", "root.components[1]"]);

        let messages: Vec<&str> = groups[&DocPath::component(1)]
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(messages, vec!["b", "c"]);
    }

    #[test]
    fn human_report_lists_paths_and_suggestions() {
        let text = sample().render_human();
        assert!(text.contains("Errors (3)"));
        assert!(text.contains("root.components[1]"));
        assert!(text.contains("→ Add `owner: <team>`"));
        assert!(text.contains("Summary: 3 error(s), 0 warning(s)"));
    }

    #[test]
    fn json_report_carries_validity_flag() {
        let json: serde_json::Value =
            serde_json::from_str(&sample().render_json().unwrap()).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["errors"][1]["path"], "root");
        assert_eq!(json["errors"][1]["severity"], "error");

        let ok: serde_json::Value =
            serde_json::from_str(&ValidationResult::ok().render_json().unwrap()).unwrap();
        assert_eq!(ok["valid"], true);
        assert!(ok.get("warnings").is_none());
    }
}
