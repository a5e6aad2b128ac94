//! `stratum capabilities`: the binder compatibility matrix.

use super::{RunArgs, engine};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use stratum_binder::CompatibilityEntry;
use stratum_core::{OutputFormat, StratumConfig};

pub async fn run(config: &StratumConfig, args: &RunArgs) -> Result<bool> {
    let engine = engine(config)?;
    let matrix = engine.binders().compatibility_matrix();

    let rendered = match args.format(config) {
        OutputFormat::Json => serde_json::to_string_pretty(&matrix)
            .context("Failed to serialize compatibility matrix")?,
        OutputFormat::Human => render(&matrix),
    };
    args.emit(&rendered).await?;
    Ok(true)
}

fn render(matrix: &[CompatibilityEntry]) -> String {
    let capability_width = matrix
        .iter()
        .map(|e| e.capability.len())
        .max()
        .unwrap_or(0)
        .max("CAPABILITY".len());
    let source_width = matrix
        .iter()
        .map(|e| e.source_type.len())
        .max()
        .unwrap_or(0)
        .max("SOURCE".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<cw$}  {:<sw$}  {:<28}  DESCRIPTION",
        "CAPABILITY",
        "SOURCE",
        "ACCESS",
        cw = capability_width,
        sw = source_width
    );
    for entry in matrix {
        let access: Vec<String> = entry.access.iter().map(ToString::to_string).collect();
        let _ = writeln!(
            out,
            "{:<cw$}  {:<sw$}  {:<28}  {}",
            entry.capability,
            entry.source_type,
            access.join(","),
            entry.description,
            cw = capability_width,
            sw = source_width
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::AccessLevel;

    #[test]
    fn renders_one_row_per_entry() {
        let matrix = vec![
            CompatibilityEntry::new("lambda-api", "db:postgres", &[AccessLevel::Read], "Connection"),
            CompatibilityEntry::new(
                "ecs-fargate-service",
                "queue:sqs",
                &[AccessLevel::Read, AccessLevel::Write],
                "Queue URL",
            ),
        ];
        let text = render(&matrix);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("CAPABILITY"));
        assert!(lines[2].contains("read,write"));
    }
}
