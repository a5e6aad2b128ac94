//! Cross-reference validation.
//!
//! Runs after hydration on the typed manifest. Every check is independent
//! and every violation is reported. Reference expressions are scanned in the
//! source document, since hydration has already replaced them in the
//! manifest.

use crate::error::{ReferenceError, ReferenceErrorKind};
use chrono::{NaiveDate, Utc};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use stratum_core::expr::walk_strings;
use stratum_core::{Diagnostic, DocPath, Expression, Manifest, ManifestDocument, Template, collect_all};

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"));

type CheckResult = Result<(), Vec<ReferenceError>>;

/// Errors and warnings from one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceReport {
    pub errors: Vec<ReferenceError>,
    pub warnings: Vec<Diagnostic>,
}

impl ReferenceReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Warnings on success, every error otherwise.
    pub fn into_result(self) -> Result<Vec<Diagnostic>, Vec<ReferenceError>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(self.errors)
        }
    }
}

/// Validates names, bind targets, references, overrides and suppressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceValidator {
    today: NaiveDate,
}

impl Default for ReferenceValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceValidator {
    pub fn new() -> Self {
        Self {
            today: Utc::now().date_naive(),
        }
    }

    /// Date used to decide whether a suppression has expired.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn validate(
        &self,
        source: &ManifestDocument,
        manifest: &Manifest,
    ) -> Result<Vec<Diagnostic>, Vec<ReferenceError>> {
        self.check(source, manifest).into_result()
    }

    pub fn check(&self, source: &ManifestDocument, manifest: &Manifest) -> ReferenceReport {
        let names = manifest.component_names();
        let mut warnings = Vec::new();

        let result = collect_all([
            unique_names(manifest),
            bind_targets(manifest, &names, &mut warnings),
            reference_targets(source, &names),
            override_targets(manifest, &names),
            self.suppressions(manifest, &names, &mut warnings),
        ]);

        let errors = result.err().unwrap_or_default();
        tracing::debug!(
            errors = errors.len(),
            warnings = warnings.len(),
            "Validated references"
        );
        ReferenceReport { errors, warnings }
    }

    fn suppressions(
        &self,
        manifest: &Manifest,
        names: &BTreeSet<&str>,
        warnings: &mut Vec<Diagnostic>,
    ) -> CheckResult {
        let mut errors = Vec::new();
        let base = DocPath::root().key("governance").key("cdkNag").key("suppress");

        for (index, suppression) in manifest.suppressions().iter().enumerate() {
            let path = base.index(index);
            let fields = [
                ("id", &suppression.id),
                ("justification", &suppression.justification),
                ("owner", &suppression.owner),
                ("expiresOn", &suppression.expires_on),
            ];
            for (field, value) in fields {
                if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                    errors.push(
                        ReferenceError::new(
                            path.key(field),
                            ReferenceErrorKind::IncompleteSuppression,
                            format!("suppression is missing '{}'", field),
                        )
                        .with_suggestion(
                            "Every suppression needs id, justification, owner and expiresOn",
                        ),
                    );
                }
            }

            if let Some(expires_on) = suppression.expires_on.as_deref().filter(|v| !v.trim().is_empty()) {
                match parse_date(expires_on) {
                    Some(date) if date < self.today => {
                        let id = suppression.id.as_deref().unwrap_or("<unnamed>");
                        warnings.push(
                            Diagnostic::warning(
                                "reference",
                                path.key("expiresOn"),
                                format!("suppression {} expired on {}", id, date),
                            )
                            .with_suggestion("Remove the suppression or renew it with a new expiry"),
                        );
                    }
                    Some(_) => {}
                    None => errors.push(
                        ReferenceError::new(
                            path.key("expiresOn"),
                            ReferenceErrorKind::InvalidExpiry,
                            format!("expiresOn '{}' is not a valid YYYY-MM-DD date", expires_on),
                        )
                        .with_suggestion("Use a calendar date such as 2025-06-30"),
                    ),
                }
            }

            for (position, target) in suppression.applies_to.iter().enumerate() {
                if !names.contains(target.as_str()) {
                    errors.push(ReferenceError::new(
                        path.key("appliesTo").index(position),
                        ReferenceErrorKind::UnknownSuppressionTarget,
                        format!("suppression applies to undeclared component '{}'", target),
                    ));
                }
            }
        }

        into_check(errors)
    }
}

/// Validate with today's date.
pub fn validate_references(
    source: &ManifestDocument,
    manifest: &Manifest,
) -> Result<Vec<Diagnostic>, Vec<ReferenceError>> {
    ReferenceValidator::new().validate(source, manifest)
}

/// Strict `YYYY-MM-DD` that is also a real calendar date.
fn parse_date(value: &str) -> Option<NaiveDate> {
    if !ISO_DATE.is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn into_check(errors: Vec<ReferenceError>) -> CheckResult {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn declared_list(names: &BTreeSet<&str>) -> String {
    names.iter().copied().collect::<Vec<_>>().join(", ")
}

fn unique_names(manifest: &Manifest) -> CheckResult {
    let mut first_seen: BTreeMap<&str, usize> = BTreeMap::new();
    let mut errors = Vec::new();
    for (index, component) in manifest.components.iter().enumerate() {
        if let Some(first) = first_seen.get(component.name.as_str()) {
            errors.push(
                ReferenceError::new(
                    DocPath::component(index).key("name"),
                    ReferenceErrorKind::DuplicateComponent,
                    format!(
                        "component name '{}' is already used by components[{}]",
                        component.name, first
                    ),
                )
                .with_suggestion("Component names must be unique within a manifest"),
            );
        } else {
            first_seen.insert(&component.name, index);
        }
    }
    into_check(errors)
}

fn bind_targets(
    manifest: &Manifest,
    names: &BTreeSet<&str>,
    warnings: &mut Vec<Diagnostic>,
) -> CheckResult {
    let mut errors = Vec::new();
    for (i, component) in manifest.components.iter().enumerate() {
        for (j, bind) in component.binds.iter().enumerate() {
            let path = DocPath::component(i).key("binds").index(j);
            match (&bind.to, &bind.select) {
                (Some(to), None) => {
                    if !names.contains(to.as_str()) {
                        errors.push(
                            ReferenceError::new(
                                path.key("to"),
                                ReferenceErrorKind::UnknownBindTarget,
                                format!("bind target '{}' is not a declared component", to),
                            )
                            .with_suggestion(format!("Declared components: {}", declared_list(names))),
                        );
                    } else if *to == component.name {
                        warnings.push(Diagnostic::warning(
                            "reference",
                            path.key("to"),
                            format!("component '{}' binds to itself", to),
                        ));
                    }
                }
                (None, Some(_)) => {}
                _ => errors.push(
                    ReferenceError::new(
                        path,
                        ReferenceErrorKind::InvalidBindTarget,
                        "binding must specify exactly one of 'to' or 'select'",
                    )
                    .with_suggestion("Use `to: <component>` or `select: <selector>`, not both"),
                ),
            }
        }
    }
    into_check(errors)
}

fn reference_targets(source: &ManifestDocument, names: &BTreeSet<&str>) -> CheckResult {
    let mut errors = Vec::new();
    walk_strings(source.tree(), &DocPath::root(), &mut |path, text| {
        let template = match Template::parse(text) {
            Ok(template) => template,
            Err(error) => {
                errors.push(ReferenceError::new(
                    path.clone(),
                    ReferenceErrorKind::MalformedReference,
                    error.to_string(),
                ));
                return;
            }
        };
        for expression in template.expressions() {
            if let Expression::Ref(reference) = expression
                && !names.contains(reference.component.as_str())
            {
                errors.push(
                    ReferenceError::new(
                        path.clone(),
                        ReferenceErrorKind::UnknownReference,
                        format!(
                            "reference {} names undeclared component '{}'",
                            expression, reference.component
                        ),
                    )
                    .with_suggestion(format!("Declared components: {}", declared_list(names))),
                );
            }
        }
    });
    into_check(errors)
}

fn override_targets(manifest: &Manifest, names: &BTreeSet<&str>) -> CheckResult {
    let Some(governance) = &manifest.governance else {
        return Ok(());
    };
    let errors: Vec<ReferenceError> = governance
        .overrides
        .keys()
        .filter(|name| !names.contains(name.as_str()))
        .map(|name| {
            ReferenceError::new(
                DocPath::root().key("governance").key("overrides").key(name.clone()),
                ReferenceErrorKind::UnknownOverrideTarget,
                format!("policy override targets undeclared component '{}'", name),
            )
        })
        .collect();
    into_check(errors)
}
