//! Runs the `stratum` binary against manifests in a temporary directory.

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const MANIFEST: &str = r#"
service: orders
owner: team-orders
components:
  - name: api
    type: lambda-api
    binds:
      - to: db
        capability: db:postgres
        access: read
  - name: db
    type: rds-postgres
    config:
      databaseName: orders
"#;

fn stratum(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stratum"))
        .current_dir(dir)
        .args(args)
        .env_remove("STRATUM_ENV")
        .env_remove("STRATUM_COMPLIANCE")
        .env_remove("STRATUM_REGION")
        .env_remove("STRATUM_ACCOUNT")
        .env_remove("STRATUM_CONFIG")
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

fn workspace(manifest: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("service.yaml"), manifest).unwrap();
    dir
}

#[test]
fn validate_accepts_a_valid_manifest() {
    let dir = workspace(MANIFEST);
    let output = stratum(dir.path(), &["validate", "service.yaml", "--format", "json"]);
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["valid"], Value::Bool(true));
}

#[test]
fn validate_fails_with_located_errors() {
    let dir = workspace("service: orders\ncomponents: []\n");
    let output = stratum(dir.path(), &["validate", "service.yaml", "--format", "json"]);
    assert!(!output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["valid"], Value::Bool(false));
    assert_eq!(report["errors"][0]["category"], "schema");
}

#[test]
fn plan_writes_the_plan_to_a_file() {
    let dir = workspace(MANIFEST);
    let output = stratum(
        dir.path(),
        &[
            "plan",
            "service.yaml",
            "--env",
            "prod",
            "--compliance",
            "fedramp-high",
            "--format",
            "json",
            "--output",
            "plan.json",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));

    let plan: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("plan.json")).unwrap())
        .unwrap();
    assert_eq!(plan["service"], "orders");
    assert_eq!(plan["environment"], "prod");
    assert_eq!(plan["complianceFramework"], "fedramp-high");
    assert_eq!(plan["components"]["api"]["config"]["vpc"]["enabled"], Value::Bool(true));
    assert!(plan["bindings"]["api.binds[0]"].is_object());
}

#[test]
fn config_file_supplies_defaults() {
    let dir = workspace(MANIFEST);
    fs::write(
        dir.path().join("stratum.yaml"),
        "defaults:\n  environment: staging\n  complianceFramework: fedramp-moderate\noutput:\n  format: json\n",
    )
    .unwrap();

    let output = stratum(dir.path(), &["plan", "service.yaml"]);
    assert!(output.status.success());

    let plan: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["environment"], "staging");
    assert_eq!(plan["complianceFramework"], "fedramp-moderate");
}

#[test]
fn plan_failure_reports_the_stage() {
    let dir = workspace(
        r#"
service: orders
owner: team-orders
components:
  - name: api
    type: lambda-api
    binds:
      - to: ghost
        capability: db:postgres
        access: read
"#,
    );
    let output = stratum(dir.path(), &["plan", "service.yaml"]);
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("reference validation"), "{}", stdout);
    assert!(stdout.contains("ghost"), "{}", stdout);
}

#[test]
fn components_lists_builtin_types() {
    let dir = TempDir::new().unwrap();
    let output = stratum(dir.path(), &["components", "--format", "json"]);
    assert!(output.status.success());

    let types: Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = types
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["type"].as_str())
        .collect();
    assert!(names.contains(&"lambda-api"));
    assert!(names.contains(&"rds-postgres"));
}
