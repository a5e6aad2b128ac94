//! End-to-end resolution scenarios over the built-in component types and
//! binder strategies.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use stratum_binder::{
    BinderRegistry, BinderRegistryError, BinderStrategy, BindingContext, BindingError,
    BindingErrorKind, BindingResult, BindingValue, CompatibilityEntry, builtin_binders,
};
use stratum_core::{
    AccessLevel, CancellationToken, CollaboratorError, ComplianceFramework, Component,
    ComponentContext, ComponentFactory, ComponentSpec, ConfigValue, ProvidedCapabilities,
    ResourceHandle, ResourceRequest, Synthesizer,
};
use stratum_engine::{
    ConfigBuildErrorKind, HydrationError, Layer, ReferenceErrorKind, ResolutionFailure,
    ResolvedPlan, ResolverEngine, Stage, StageError,
};
use stratum_schema::SchemaCache;

fn engine() -> ResolverEngine {
    let components = stratum_catalog::builtin_registry().unwrap();
    let binders = stratum_binder::builtin_registry(components.type_names()).unwrap();
    ResolverEngine::new(
        Arc::new(components),
        Arc::new(binders),
        Arc::new(SchemaCache::default()),
    )
    .with_today(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
}

fn context(environment: &str, framework: ComplianceFramework) -> ComponentContext {
    ComponentContext::new("", environment)
        .with_framework(framework)
        .with_region("us-gov-west-1")
        .with_account("123456789012")
}

fn plan(manifest: &str) -> ResolvedPlan {
    engine()
        .plan(manifest, &context("dev", ComplianceFramework::Commercial))
        .unwrap_or_else(|failure| panic!("{}", failure))
}

fn fail(manifest: &str) -> ResolutionFailure {
    match engine().plan(manifest, &context("dev", ComplianceFramework::Commercial)) {
        Ok(plan) => panic!("expected failure, got plan for {:?}", plan.components.keys()),
        Err(failure) => failure,
    }
}

const ORDERS: &str = r#"
service: orders
owner: team-orders
environments:
  prod:
    defaults:
      logLevel: warn
  dev:
    defaults:
      logLevel: debug
components:
  - name: api
    type: lambda-api
    config:
      memorySize: 1024
      environment:
        LOG_LEVEL: ${env:logLevel}
        DB_NAME: ${ref:db.databaseName}
    binds:
      - to: db
        capability: db:postgres
        access: readwrite
      - select: type=sqs-queue
        capability: queue:sqs
        access: write
        customEnvVars:
          QUEUE_URL: ORDERS_QUEUE_URL
  - name: db
    type: rds-postgres
    config:
      databaseName: orders
    environments:
      prod:
        allocatedStorage: 100
        multiAz: true
  - name: events
    type: sqs-queue
"#;

// =============================================================================
// SUCCESSFUL RESOLUTION
// =============================================================================

#[test]
fn minimal_manifest_resolves_to_one_component() {
    let plan = plan(
        r#"
service: orders
owner: team-orders
components:
  - name: api
    type: lambda-api
"#,
    );

    assert_eq!(plan.components.keys().collect::<Vec<_>>(), vec!["api"]);
    let api = plan.component("api").unwrap();
    assert_eq!(api.capabilities, vec!["api:rest".to_string()]);
    assert_eq!(api.built.config["functionName"], json!("orders-api"));
    assert!(plan.bindings.is_empty());
    assert_eq!(plan.service, "orders");
    assert_eq!(plan.region, "us-gov-west-1");
}

#[test]
fn resolution_is_deterministic() {
    let first = plan(ORDERS).to_json_pretty().unwrap();
    let second = plan(ORDERS).to_json_pretty().unwrap();
    assert_eq!(first, second);
}

#[test]
fn hydrates_environment_blocks_and_expressions() {
    let engine = engine();
    let prod = engine
        .plan(ORDERS, &context("prod", ComplianceFramework::Commercial))
        .unwrap();
    let dev = engine
        .plan(ORDERS, &context("dev", ComplianceFramework::Commercial))
        .unwrap();

    let api = &prod.component("api").unwrap().built.config;
    assert_eq!(api["environment"]["LOG_LEVEL"], json!("warn"));
    assert_eq!(api["environment"]["DB_NAME"], json!("orders"));
    assert_eq!(
        dev.component("api").unwrap().built.config["environment"]["LOG_LEVEL"],
        json!("debug")
    );

    let db_prod = &prod.component("db").unwrap().built;
    assert_eq!(db_prod.config["allocatedStorage"], json!(100));
    assert_eq!(db_prod.provenance["allocatedStorage"], Layer::ComponentOverrides);
    assert_eq!(
        dev.component("db").unwrap().built.config["allocatedStorage"],
        json!(20)
    );
}

#[test]
fn resolves_direct_and_selected_bindings() {
    let plan = plan(ORDERS);

    assert_eq!(
        plan.bindings.keys().collect::<Vec<_>>(),
        vec!["api.binds[0]", "api.binds[1]"]
    );

    let db = &plan.bindings["api.binds[0]"];
    assert_eq!(db.target, "db");
    assert_eq!(db.strategy, "postgres");
    assert_eq!(db.environment["DB_PORT"], BindingValue::literal(5432));
    assert_eq!(db.environment["DB_NAME"], BindingValue::literal("orders"));
    assert!(db.environment["DB_HOST"].is_deferred());
    assert_eq!(db.network[0].port, 5432);

    let queue = &plan.bindings["api.binds[1]"];
    assert_eq!(queue.target, "events");
    assert!(queue.environment.contains_key("ORDERS_QUEUE_URL"));
    assert!(!queue.environment.contains_key("QUEUE_URL"));

    assert_eq!(plan.bindings_from("api").count(), 2);
    assert_eq!(plan.bindings_from("db").count(), 0);
}

// =============================================================================
// LAYER PRECEDENCE
// =============================================================================

#[test]
fn layers_apply_in_precedence_order() {
    let engine = engine();
    let manifest = r#"
service: orders
owner: team-orders
components:
  - name: api
    type: lambda-api
    config:
      memorySize: 1024
      logRetentionDays: 30
      vpc: { enabled: false }
  - name: role
    type: iam-role
    config:
      assumedBy: [ecs-tasks.amazonaws.com]
governance:
  overrides:
    api:
      memorySize: 2048
"#;
    let plan = engine
        .plan(manifest, &context("dev", ComplianceFramework::FedrampHigh))
        .unwrap_or_else(|failure| panic!("{}", failure));

    let api = &plan.component("api").unwrap().built;
    // Governance override beats component config.
    assert_eq!(api.config["memorySize"], json!(2048));
    assert_eq!(api.provenance["memorySize"], Layer::PolicyOverrides);
    // Component config beats the compliance overlay.
    assert_eq!(api.config["logRetentionDays"], json!(30));
    // Framework mandates beat everything.
    assert_eq!(api.config["vpc"]["enabled"], json!(true));
    // Overlay beats platform defaults on keys the component leaves alone.
    assert_eq!(api.config["auth"]["sessionDurationMinutes"], json!(15));
    assert_eq!(api.provenance["auth.sessionDurationMinutes"], Layer::EnvironmentDefaults);
    // Disjoint keys from lower layers survive.
    assert_eq!(api.config["tracing"], json!("Active"));
    assert_eq!(api.config["auth"]["type"], json!("iam"));
    assert_eq!(api.provenance["auth.type"], Layer::HardcodedFallback);

    // Arrays are replaced, never appended.
    let role = &plan.component("role").unwrap().built;
    assert_eq!(role.config["assumedBy"], json!(["ecs-tasks.amazonaws.com"]));
}

#[test]
fn frameworks_differ_only_on_overlay_fields() {
    let engine = engine();
    let manifest = r#"
service: orders
owner: team-orders
components:
  - name: web
    type: ecs-fargate-service
    config:
      image: registry.example.com/web:1.4.2
"#;
    let commercial = engine
        .plan(manifest, &context("dev", ComplianceFramework::Commercial))
        .unwrap();
    let high = engine
        .plan(manifest, &context("dev", ComplianceFramework::FedrampHigh))
        .unwrap();

    let commercial = &commercial.component("web").unwrap().built;
    let high = &high.component("web").unwrap().built;
    let before = ConfigValue::from(commercial.config.clone());
    let after = ConfigValue::from(high.config.clone());

    let mut changed: Vec<String> = after
        .leaf_paths()
        .into_iter()
        .chain(before.leaf_paths())
        .filter(|path| before.get_path(path) != after.get_path(path))
        .collect();
    changed.sort();
    changed.dedup();

    assert_eq!(changed, vec!["desiredCount".to_string(), "logRetentionDays".to_string()]);
    for path in &changed {
        assert_eq!(high.provenance[path], Layer::EnvironmentDefaults, "{}", path);
    }
}

#[test]
fn whole_string_reference_supplies_a_typed_value() {
    let plan = plan(
        r#"
service: orders
owner: team-orders
components:
  - name: queue
    type: sqs-queue
    config:
      visibilityTimeoutSeconds: 120
  - name: worker
    type: lambda-api
    config:
      timeout: ${ref:queue.visibilityTimeoutSeconds}
"#,
    );

    let worker = &plan.component("worker").unwrap().built;
    assert_eq!(worker.config["timeout"], json!(120));
}

#[test]
fn other_environments_do_not_need_resolvable_defaults() {
    let manifest = r#"
service: orders
owner: team-orders
environments:
  dev:
    defaults:
      logLevel: debug
  prod:
    defaults:
      endpoint: "https://${env:host}/orders"
components:
  - name: api
    type: lambda-api
    config:
      environment:
        LOG_LEVEL: ${env:logLevel}
"#;

    let dev = plan(manifest);
    let api = &dev.component("api").unwrap().built;
    assert_eq!(api.config["environment"]["LOG_LEVEL"], json!("debug"));

    let failure = engine()
        .plan(manifest, &context("prod", ComplianceFramework::Commercial))
        .unwrap_err();
    assert_eq!(failure.stage, Stage::Hydrated);
}

#[test]
fn integral_float_cpu_selects_its_memory_size() {
    let plan = plan(
        r#"
service: orders
owner: team-orders
components:
  - name: web
    type: ecs-fargate-service
    config:
      cpu: 4096.0
"#,
    );

    let web = &plan.component("web").unwrap().built;
    assert_eq!(web.config["cpu"], json!(4096));
    assert_eq!(web.config["memory"], json!(8192));
}

// =============================================================================
// FAILURES
// =============================================================================

#[test]
fn every_schema_violation_is_reported() {
    let failure = fail(
        r#"
service: orders
components:
  - name: api
    type: lambda-api
    config:
      memorySize: 64
    binds:
      - to: db
        capability: db:postgres
        access: sudo
  - name: db
    type: rds-postgres
"#,
    );

    assert_eq!(failure.stage, Stage::SchemaValidated);
    let paths: Vec<String> = failure
        .diagnostics()
        .iter()
        .map(|d| d.path.to_string())
        .collect();
    assert_eq!(failure.errors.len(), 3, "{:?}", paths);
    assert!(paths.contains(&"root".to_string()));
    assert!(paths.contains(&"root.components[0].binds[0].access".to_string()));
    assert!(paths.contains(&"root.components[0].config.memorySize".to_string()));
    assert!(failure.diagnostics().iter().all(|d| d.suggestion.is_some()));
}

#[test]
fn unknown_reference_names_the_component() {
    let failure = fail(
        r#"
service: orders
owner: team-orders
components:
  - name: api
    type: lambda-api
    config:
      environment:
        TARGET: ${ref:ghost.x}
"#,
    );

    assert_eq!(failure.stage, Stage::Hydrated);
    assert!(matches!(
        &failure.errors[0],
        StageError::Hydration(HydrationError::UnknownComponent { component, .. }) if component == "ghost"
    ));
    assert!(failure.to_string().contains("ghost"));
}

#[test]
fn dangling_bind_names_target_and_location() {
    let failure = fail(
        r#"
service: orders
owner: team-orders
components:
  - name: api
    type: lambda-api
    binds:
      - to: db
        capability: db:postgres
        access: read
"#,
    );

    assert_eq!(failure.stage, Stage::ReferenceValidated);
    let StageError::Reference(error) = &failure.errors[0] else {
        panic!("expected a reference error, got {:?}", failure.errors[0]);
    };
    assert_eq!(error.kind, ReferenceErrorKind::UnknownBindTarget);
    assert!(error.message.contains("db"));
    assert!(error.path.to_string().contains("components[0].binds[0]"));
}

#[test]
fn invalid_cpu_memory_pair_lists_valid_memory() {
    let failure = fail(
        r#"
service: orders
owner: team-orders
components:
  - name: web
    type: ecs-fargate-service
    config:
      cpu: 256
      memory: 4096
"#,
    );

    assert_eq!(failure.stage, Stage::ConfigResolved);
    let StageError::ConfigBuild(error) = &failure.errors[0] else {
        panic!("expected a config error, got {:?}", failure.errors[0]);
    };
    assert_eq!(error.kind, ConfigBuildErrorKind::Normalization);
    assert_eq!(error.path.to_string(), "root.components[0].config.memory");
    assert!(error.message.contains("512, 1024, 2048"), "{}", error.message);
}

#[test]
fn config_errors_from_every_component_are_collected() {
    let failure = fail(
        r#"
service: orders
owner: team-orders
components:
  - name: web
    type: ecs-fargate-service
    config: { cpu: 256, memory: 4096 }
  - name: db
    type: rds-postgres
    config: { allocatedStorage: 100, maxAllocatedStorage: 50 }
"#,
    );

    assert_eq!(failure.stage, Stage::ConfigResolved);
    let components: Vec<String> = failure
        .errors
        .iter()
        .filter_map(|e| match e {
            StageError::ConfigBuild(error) => Some(error.component.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(components, vec!["web".to_string(), "db".to_string()]);
}

#[test]
fn binding_failures_fail_the_run_without_a_plan() {
    let failure = fail(
        r#"
service: orders
owner: team-orders
components:
  - name: api
    type: lambda-api
    binds:
      - to: db
        capability: bucket:s3
        access: read
      - to: db
        capability: db:postgres
        access: assume
  - name: db
    type: rds-postgres
"#,
    );

    assert_eq!(failure.stage, Stage::BindingsResolved);
    let kinds: Vec<BindingErrorKind> = failure
        .errors
        .iter()
        .filter_map(|e| match e {
            StageError::Binding(error) => Some(error.kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![BindingErrorKind::CapabilityNotProvided, BindingErrorKind::AccessNotSupported]
    );
}

#[test]
fn expired_suppressions_surface_as_warnings() {
    let plan = plan(
        r#"
service: orders
owner: team-orders
components:
  - name: api
    type: lambda-api
governance:
  cdkNag:
    suppress:
      - id: AwsSolutions-L1
        justification: runtime pinned by vendor
        owner: team-orders
        expiresOn: "2025-01-31"
"#,
    );
    assert_eq!(plan.warnings.len(), 1);
    assert!(plan.warnings[0].message.contains("expired on 2025-01-31"));
}

#[test]
fn cancelled_run_produces_no_plan() {
    let token = CancellationToken::new();
    token.cancel();
    let failure = engine()
        .with_cancellation(token)
        .plan(ORDERS, &context("dev", ComplianceFramework::Commercial))
        .unwrap_err();
    assert!(failure.is_cancelled());
    assert_eq!(failure.stage, Stage::Parsed);
}

// =============================================================================
// REGISTRIES AND CACHE
// =============================================================================

struct LambdaAssumeRole;

impl BinderStrategy for LambdaAssumeRole {
    fn name(&self) -> &'static str {
        "lambda-assume-role"
    }

    fn capability(&self) -> &'static str {
        "iam:assumeRole"
    }

    fn compatibility_matrix(&self) -> Vec<CompatibilityEntry> {
        vec![CompatibilityEntry::new(
            "lambda-api",
            "iam:assumeRole",
            &[AccessLevel::Assume],
            "",
        )]
    }

    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, BindingError> {
        Ok(ctx.result(self.name()))
    }
}

#[test]
fn overlapping_strategies_fail_registry_initialization() {
    let err = builtin_binders()
        .into_iter()
        .fold(BinderRegistry::builder(), |builder, strategy| builder.register(strategy))
        .register(Arc::new(LambdaAssumeRole))
        .build()
        .unwrap_err();

    match err {
        BinderRegistryError::Conflict {
            capability,
            source_type,
            strategies,
        } => {
            assert_eq!(capability, "iam:assumeRole");
            assert_eq!(source_type, "lambda-api");
            assert_eq!(strategies.len(), 2);
        }
        other => panic!("expected a conflict, got {:?}", other),
    }
}

#[test]
fn schema_cache_reset_reloads_identical_content() {
    let engine = engine();
    let before = engine.cache().get_base_schema().unwrap();
    assert!(engine.validate(ORDERS).valid);

    engine.cache().reset_cache();
    engine.cache().reset_cache();
    let after = engine.cache().get_base_schema().unwrap();

    assert_eq!(*before, *after);
    assert!(engine.validate(ORDERS).valid);
}

#[test]
fn validate_stops_after_schema() {
    let engine = engine();
    // Dangling bind: schema-valid, so validation alone passes.
    let result = engine.validate(
        r#"
service: orders
owner: team-orders
components:
  - name: api
    type: lambda-api
    binds:
      - to: db
        capability: db:postgres
        access: read
"#,
    );
    assert!(result.valid, "{:?}", result.errors);

    let result = engine.validate("service: [");
    assert!(!result.valid);
    assert_eq!(result.errors[0].category, "parse");
}

// =============================================================================
// SYNTHESIS
// =============================================================================

#[derive(Default)]
struct RecordingSynthesizer {
    requests: Vec<ResourceRequest>,
}

impl Synthesizer for RecordingSynthesizer {
    fn materialize(&mut self, request: ResourceRequest) -> Result<ResourceHandle, CollaboratorError> {
        let handle = ResourceHandle(format!("arn:aws:test:::{}", request.logical_id));
        self.requests.push(request);
        Ok(handle)
    }
}

struct FakeComponent {
    name: String,
    component_type: String,
    config: Value,
    handles: BTreeMap<String, ResourceHandle>,
}

impl Component for FakeComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn synthesize(&mut self, synthesizer: &mut dyn Synthesizer) -> Result<(), CollaboratorError> {
        let handle = synthesizer.materialize(ResourceRequest {
            logical_id: self.name.clone(),
            resource_type: self.component_type.clone(),
            properties: self.config.clone(),
        })?;
        self.handles.insert("main".to_string(), handle);
        Ok(())
    }

    fn capabilities(&self) -> BTreeMap<String, Value> {
        let Some(ResourceHandle(arn)) = self.handles.get("main") else {
            return BTreeMap::new();
        };
        match self.component_type.as_str() {
            "rds-postgres" => [(
                "db:postgres".to_string(),
                json!({
                    "host": format!("{}.cluster.internal", self.name),
                    "secretArn": format!("{}/secret", arn),
                    "instanceArn": arn,
                }),
            )]
            .into(),
            _ => BTreeMap::new(),
        }
    }

    fn construct(&self, handle: &str) -> Option<ResourceHandle> {
        self.handles.get(handle).cloned()
    }
}

struct FakeFactory;

impl ComponentFactory for FakeFactory {
    fn create(
        &self,
        spec: &ComponentSpec,
        config: &Value,
        _context: &ComponentContext,
    ) -> Result<Box<dyn Component>, CollaboratorError> {
        Ok(Box::new(FakeComponent {
            name: spec.name.clone(),
            component_type: spec.component_type.clone(),
            config: config.clone(),
            handles: BTreeMap::new(),
        }))
    }
}

#[test]
fn synthesized_capability_data_becomes_literal() {
    let mut synthesizer = RecordingSynthesizer::default();
    let plan = engine()
        .plan_with_components(
            ORDERS,
            &context("dev", ComplianceFramework::Commercial),
            &FakeFactory,
            &mut synthesizer,
        )
        .unwrap_or_else(|failure| panic!("{}", failure));

    assert_eq!(synthesizer.requests.len(), 3);
    let db = &plan.bindings["api.binds[0]"];
    assert_eq!(db.environment["DB_HOST"], BindingValue::literal("db.cluster.internal"));
    assert_eq!(
        db.environment["DB_SECRET_ARN"],
        BindingValue::literal("arn:aws:test:::db/secret")
    );
    assert!(plan.component("db").unwrap().provided.contains_key("db:postgres"));

    // The queue component provides nothing, so its attributes stay deferred.
    let queue = &plan.bindings["api.binds[1]"];
    assert!(queue.environment["ORDERS_QUEUE_URL"].is_deferred());
}

#[test]
fn earlier_synthesis_output_feeds_references() {
    let manifest = r#"
service: orders
owner: team-orders
components:
  - name: api
    type: lambda-api
    config:
      environment:
        DB_HOST: ${ref:db.db:postgres.host}
  - name: db
    type: rds-postgres
"#;
    let provided: ProvidedCapabilities = [(
        "db".to_string(),
        [("db:postgres".to_string(), json!({"host": "db.prod.internal"}))].into(),
    )]
    .into();

    let plan = engine()
        .plan_with_provided(manifest, &context("prod", ComplianceFramework::Commercial), &provided)
        .unwrap_or_else(|failure| panic!("{}", failure));
    assert_eq!(
        plan.component("api").unwrap().built.config["environment"]["DB_HOST"],
        json!("db.prod.internal")
    );
}
