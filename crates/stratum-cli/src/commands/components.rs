//! `stratum components`: registered component types.
//!
//! Without an argument, lists every type with its declared capabilities.
//! With a type name, shows that type's configuration layers for the selected
//! compliance framework.

use super::{RunArgs, engine};
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fmt::Write as _;
use stratum_core::{ComplianceFramework, ComponentDefinition, OutputFormat, StratumConfig};

pub async fn run(
    config: &StratumConfig,
    component_type: Option<&str>,
    args: &RunArgs,
) -> Result<bool> {
    let engine = engine(config)?;
    let registry = engine.components();

    let Some(name) = component_type else {
        let rendered = match args.format(config) {
            OutputFormat::Json => {
                let types: Vec<Value> = registry.iter().map(|d| summary(d.as_ref())).collect();
                serde_json::to_string_pretty(&types).context("Failed to serialize component types")?
            }
            OutputFormat::Human => {
                let mut out = String::new();
                let _ = writeln!(out, "Component types ({}):", registry.len());
                for definition in registry.iter() {
                    let _ = writeln!(out, "  {}", definition.type_name());
                    if !definition.description().is_empty() {
                        let _ = writeln!(out, "    {}", definition.description());
                    }
                    for capability in definition.declared_capabilities() {
                        let _ = writeln!(
                            out,
                            "    provides {} ({})",
                            capability.name,
                            capability.data_shape.join(", ")
                        );
                    }
                }
                out
            }
        };
        args.emit(&rendered).await?;
        return Ok(true);
    };

    let Some(definition) = registry.get(name) else {
        anyhow::bail!(
            "Unknown component type '{}'. Registered types: {}",
            name,
            registry.type_names().join(", ")
        );
    };

    let framework = args.framework(config);
    let layers = layers(definition.as_ref(), framework);
    let rendered = match args.format(config) {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&layers).context("Failed to serialize component layers")?
        }
        OutputFormat::Human => {
            let mut out = String::new();
            let _ = writeln!(out, "{} ({})", name, framework);
            for key in ["hardcodedFallback", "platformDefaults", "environmentDefaults", "policyMandates"] {
                let pretty = serde_json::to_string_pretty(&layers[key])
                    .context("Failed to serialize component layer")?;
                let _ = writeln!(out, "\n{}:\n{}", key, pretty);
            }
            out
        }
    };
    args.emit(&rendered).await?;
    Ok(true)
}

fn summary(definition: &dyn ComponentDefinition) -> Value {
    json!({
        "type": definition.type_name(),
        "description": definition.description(),
        "capabilities": definition.declared_capabilities(),
    })
}

fn layers(definition: &dyn ComponentDefinition, framework: ComplianceFramework) -> Value {
    json!({
        "type": definition.type_name(),
        "framework": framework.as_str(),
        "hardcodedFallback": definition.hardcoded_fallbacks(),
        "platformDefaults": definition.platform_defaults(),
        "environmentDefaults": definition.compliance_overlay(framework),
        "policyMandates": definition.policy_mandates(framework),
    })
}
