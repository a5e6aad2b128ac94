//! `stratum plan`: resolve a manifest into a deployment plan.

use super::{RunArgs, engine, read_manifest};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use stratum_binder::BindingValue;
use stratum_core::{OutputFormat, ProvidedCapabilities, StratumConfig};
use stratum_engine::{ResolutionFailure, ResolvedPlan};
use stratum_schema::ValidationResult;

/// Returns whether resolution succeeded.
pub async fn run(
    config: &StratumConfig,
    manifest: &Path,
    args: &RunArgs,
    provided: Option<&Path>,
) -> Result<bool> {
    let text = read_manifest(manifest).await?;
    let engine = engine(config)?;
    // The engine names the service from the manifest itself.
    let context = args.context(config, "");

    let outcome = match provided {
        Some(path) => {
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read provided capabilities: {:?}", path))?;
            let provided: ProvidedCapabilities = serde_json::from_str(&data)
                .with_context(|| format!("Invalid provided capabilities file: {:?}", path))?;
            engine.plan_with_provided(&text, &context, &provided)
        }
        None => engine.plan(&text, &context),
    };

    match outcome {
        Ok(plan) => {
            let rendered = match args.format(config) {
                OutputFormat::Json => plan.to_json_pretty().context("Failed to serialize plan")?,
                OutputFormat::Human => render_plan(&plan),
            };
            args.emit(&rendered).await?;
            Ok(true)
        }
        Err(failure) => {
            report_failure(config, args, &failure).await?;
            Ok(false)
        }
    }
}

async fn report_failure(
    config: &StratumConfig,
    args: &RunArgs,
    failure: &ResolutionFailure,
) -> Result<()> {
    let report = ValidationResult::from_errors(&failure.diagnostics())
        .with_warnings(failure.warnings.clone());
    match args.format(config) {
        OutputFormat::Json => args.emit_report(config, &report).await,
        OutputFormat::Human => {
            let text = format!(
                "Resolution failed during {}\n\n{}",
                failure.stage,
                report.render_human()
            );
            args.emit(&text).await
        }
    }
}

fn render_plan(plan: &ResolvedPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Plan for {} ({}, {}, {})",
        plan.service, plan.environment, plan.compliance_framework, plan.region
    );

    let _ = writeln!(out, "\nComponents ({}):", plan.components.len());
    for (name, component) in &plan.components {
        let _ = writeln!(out, "  {} [{}]", name, component.built.component_type);
        if !component.capabilities.is_empty() {
            let _ = writeln!(out, "    provides: {}", component.capabilities.join(", "));
        }
        let _ = writeln!(out, "    settings: {}", component.built.provenance.len());
    }

    if !plan.bindings.is_empty() {
        let _ = writeln!(out, "\nBindings ({}):", plan.bindings.len());
        for (id, binding) in &plan.bindings {
            let _ = writeln!(
                out,
                "  {} -> {} ({}, {}) via {}",
                id, binding.target, binding.capability, binding.access, binding.strategy
            );
            for (name, value) in &binding.environment {
                let shown = match value {
                    BindingValue::Literal(value) => value.to_string(),
                    BindingValue::Deferred {
                        component,
                        capability,
                        attribute,
                    } => format!("<{}:{}.{}>", component, capability, attribute),
                };
                let _ = writeln!(out, "    {}={}", name, shown);
            }
        }
    }

    if !plan.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings ({}):", plan.warnings.len());
        for warning in &plan.warnings {
            let _ = writeln!(out, "  {}", warning);
        }
    }

    out
}
