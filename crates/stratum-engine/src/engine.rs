//! The resolution state machine.
//!
//! ```text
//! Parsed -> SchemaValidated -> Hydrated -> ReferenceValidated -> ConfigResolved -> BindingsResolved
//! ```
//!
//! Every stage can fail into a [`ResolutionFailure`] naming the stage and
//! every error it found. No plan is produced unless all stages succeed.

use crate::builder::{BuiltConfig, ConfigBuilder};
use crate::error::{ConfigBuildError, ConfigBuildErrorKind, ResolutionFailure, StageError};
use crate::hydrator::{ContextHydrator, HydratedManifest};
use crate::plan::{PlannedComponent, ResolvedPlan};
use crate::references::ReferenceValidator;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use stratum_binder::{BinderRegistry, CapabilityResolver, ComponentView};
use stratum_core::{
    CancellationToken, ComponentContext, ComponentFactory, ComponentRegistry, ComponentSpec,
    Diagnostic, DocPath, ManifestDocument, ProvidedCapabilities, Synthesizer,
};
use stratum_schema::{SchemaCache, SchemaValidator, ValidationResult};

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Parsed,
    SchemaValidated,
    Hydrated,
    ReferenceValidated,
    ConfigResolved,
    BindingsResolved,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parsed => "parse",
            Stage::SchemaValidated => "schema validation",
            Stage::Hydrated => "hydration",
            Stage::ReferenceValidated => "reference validation",
            Stage::ConfigResolved => "config resolution",
            Stage::BindingsResolved => "binding resolution",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component factory and synthesizer used by
/// [`ResolverEngine::plan_with_components`].
struct Synthesis<'s> {
    factory: &'s dyn ComponentFactory,
    synthesizer: &'s mut dyn Synthesizer,
}

/// Runs manifests through the full resolution pipeline.
///
/// Registries and the schema cache are shared and read-only during a run.
#[derive(Debug, Clone)]
pub struct ResolverEngine {
    components: Arc<ComponentRegistry>,
    binders: Arc<BinderRegistry>,
    cache: Arc<SchemaCache>,
    cancel: Option<CancellationToken>,
    today: Option<NaiveDate>,
}

impl ResolverEngine {
    pub fn new(
        components: Arc<ComponentRegistry>,
        binders: Arc<BinderRegistry>,
        cache: Arc<SchemaCache>,
    ) -> Self {
        Self {
            components,
            binders,
            cache,
            cancel: None,
            today: None,
        }
    }

    /// Checked between stages, components and bindings.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Date used for suppression expiry. Defaults to the current UTC date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn binders(&self) -> &BinderRegistry {
        &self.binders
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Parse and schema-validate a manifest. Stops after `SchemaValidated`.
    pub fn validate(&self, text: &str) -> ValidationResult {
        let document = match ManifestDocument::parse(text) {
            Ok(document) => document,
            Err(error) => return ValidationResult::from_errors(&[StageError::from(error)]),
        };
        match SchemaValidator::new(&self.cache, &self.components).validate(&document) {
            Ok(()) => ValidationResult::ok(),
            Err(errors) => ValidationResult::from_errors(&errors),
        }
    }

    /// Resolve a manifest into a plan.
    ///
    /// The context's service name is taken from the manifest.
    pub fn plan(
        &self,
        text: &str,
        context: &ComponentContext,
    ) -> Result<ResolvedPlan, ResolutionFailure> {
        self.run(text, context, None, None)
    }

    /// Like [`ResolverEngine::plan`], with capability data from an earlier
    /// synthesis available to references and bindings.
    pub fn plan_with_provided(
        &self,
        text: &str,
        context: &ComponentContext,
        provided: &ProvidedCapabilities,
    ) -> Result<ResolvedPlan, ResolutionFailure> {
        self.run(text, context, Some(provided), None)
    }

    /// Resolve, then create and synthesize every component before binding so
    /// bindings can use the capability data the components provide.
    pub fn plan_with_components(
        &self,
        text: &str,
        context: &ComponentContext,
        factory: &dyn ComponentFactory,
        synthesizer: &mut dyn Synthesizer,
    ) -> Result<ResolvedPlan, ResolutionFailure> {
        let synthesis = Synthesis {
            factory,
            synthesizer,
        };
        self.run(text, context, None, Some(synthesis))
    }

    fn checkpoint(&self, stage: Stage) -> Result<(), ResolutionFailure> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                tracing::info!(stage = %stage, "Resolution cancelled");
                Err(ResolutionFailure::cancelled(stage))
            }
            _ => Ok(()),
        }
    }

    fn run(
        &self,
        text: &str,
        context: &ComponentContext,
        provided: Option<&ProvidedCapabilities>,
        synthesis: Option<Synthesis<'_>>,
    ) -> Result<ResolvedPlan, ResolutionFailure> {
        let mut warnings: Vec<Diagnostic> = Vec::new();

        // Parsed
        self.checkpoint(Stage::Parsed)?;
        let document = ManifestDocument::parse(text)
            .map_err(|error| ResolutionFailure::single(Stage::Parsed, error))?;
        tracing::debug!(stage = %Stage::Parsed, "Stage complete");

        // SchemaValidated
        self.checkpoint(Stage::SchemaValidated)?;
        SchemaValidator::new(&self.cache, &self.components)
            .validate(&document)
            .map_err(|errors| {
                ResolutionFailure::new(
                    Stage::SchemaValidated,
                    errors.into_iter().map(StageError::from).collect(),
                )
            })?;
        tracing::debug!(stage = %Stage::SchemaValidated, "Stage complete");

        // Hydrated
        self.checkpoint(Stage::Hydrated)?;
        let mut hydrator = ContextHydrator::new(&context.environment);
        if let Some(provided) = provided {
            hydrator = hydrator.with_provided(provided);
        }
        let HydratedManifest { manifest, .. } = hydrator
            .hydrate(&document)
            .map_err(|error| ResolutionFailure::single(Stage::Hydrated, error))?;
        tracing::debug!(stage = %Stage::Hydrated, "Stage complete");

        let context = ComponentContext {
            service_name: manifest.service.clone(),
            ..context.clone()
        };
        tracing::info!(
            service = %context.service_name,
            environment = %context.environment,
            framework = %context.compliance_framework,
            components = manifest.components.len(),
            "Resolving manifest"
        );

        // ReferenceValidated
        self.checkpoint(Stage::ReferenceValidated)?;
        let references = match self.today {
            Some(today) => ReferenceValidator::new().with_today(today),
            None => ReferenceValidator::new(),
        };
        let report = references.check(&document, &manifest);
        warnings.extend(report.warnings);
        if !report.errors.is_empty() {
            return Err(fail_with(
                Stage::ReferenceValidated,
                report.errors.into_iter().map(StageError::from).collect(),
                warnings,
            ));
        }
        tracing::debug!(stage = %Stage::ReferenceValidated, "Stage complete");

        // ConfigResolved
        let builder = ConfigBuilder::new(&self.cache);
        let mut built: Vec<BuiltConfig> = Vec::with_capacity(manifest.components.len());
        let mut capabilities: Vec<Vec<String>> = Vec::with_capacity(manifest.components.len());
        let mut config_errors: Vec<ConfigBuildError> = Vec::new();
        for (index, spec) in manifest.components.iter().enumerate() {
            self.checkpoint(Stage::ConfigResolved)
                .map_err(|f| with_warnings(f, &warnings))?;

            let Some(definition) = self.components.get(&spec.component_type) else {
                config_errors.push(
                    ConfigBuildError::new(
                        &spec.name,
                        DocPath::component(index).key("type"),
                        ConfigBuildErrorKind::UnknownType,
                        format!("component type '{}' is not registered", spec.component_type),
                    )
                    .with_suggestion(format!(
                        "Use one of: {}",
                        self.components.type_names().join(", ")
                    )),
                );
                continue;
            };

            match builder.build(
                &context,
                index,
                spec,
                definition.as_ref(),
                manifest.policy_override(&spec.name),
            ) {
                Ok(config) => {
                    built.push(config);
                    capabilities.push(
                        definition
                            .declared_capabilities()
                            .into_iter()
                            .map(|c| c.name)
                            .collect(),
                    );
                }
                Err(errors) => config_errors.extend(errors),
            }
        }
        if !config_errors.is_empty() {
            return Err(fail_with(
                Stage::ConfigResolved,
                config_errors.into_iter().map(StageError::from).collect(),
                warnings,
            ));
        }
        tracing::debug!(stage = %Stage::ConfigResolved, "Stage complete");

        // Synthesis, between ConfigResolved and BindingsResolved.
        let mut collected: ProvidedCapabilities = provided.cloned().unwrap_or_default();
        if let Some(synthesis) = synthesis {
            let synthesized = self.synthesize(
                &manifest.components,
                &built,
                &capabilities,
                &context,
                synthesis,
                &mut warnings,
            );
            let synthesized = synthesized.map_err(|f| with_warnings(f, &warnings))?;
            collected.extend(synthesized);
        }

        // BindingsResolved
        self.checkpoint(Stage::BindingsResolved)
            .map_err(|f| with_warnings(f, &warnings))?;
        let views: Vec<ComponentView<'_>> = manifest
            .components
            .iter()
            .enumerate()
            .map(|(index, spec)| ComponentView {
                index,
                spec,
                config: &built[index].config,
                capabilities: capabilities[index].clone(),
                provided: collected.get(&spec.name),
            })
            .collect();

        let resolver = CapabilityResolver::new(&self.binders, &context);
        let resolution = match &self.cancel {
            Some(token) => resolver.with_cancellation(token).resolve(&views),
            None => resolver.resolve(&views),
        }
        .map_err(|_| with_warnings(ResolutionFailure::cancelled(Stage::BindingsResolved), &warnings))?;

        if !resolution.is_ok() {
            return Err(fail_with(
                Stage::BindingsResolved,
                resolution.errors.into_iter().map(StageError::from).collect(),
                warnings,
            ));
        }
        tracing::debug!(stage = %Stage::BindingsResolved, "Stage complete");

        for warning in &warnings {
            tracing::warn!(path = %warning.path, category = %warning.category, "{}", warning.message);
        }

        let components: BTreeMap<String, PlannedComponent> = manifest
            .components
            .iter()
            .zip(built)
            .zip(capabilities)
            .map(|((spec, built), capabilities)| {
                let provided = collected.remove(&spec.name).unwrap_or_default();
                (
                    spec.name.clone(),
                    PlannedComponent {
                        built,
                        capabilities,
                        provided,
                    },
                )
            })
            .collect();
        let bindings: BTreeMap<_, _> = resolution
            .bindings
            .into_iter()
            .map(|binding| (binding.binding_id.clone(), binding))
            .collect();

        tracing::info!(
            service = %context.service_name,
            components = components.len(),
            bindings = bindings.len(),
            warnings = warnings.len(),
            "Manifest resolved"
        );

        Ok(ResolvedPlan {
            service: manifest.service.clone(),
            owner: manifest.owner.clone(),
            environment: context.environment.clone(),
            compliance_framework: context.compliance_framework,
            region: context.region.clone(),
            account: context.account.clone(),
            components,
            bindings,
            warnings,
        })
    }

    /// Create and synthesize every component, collecting provided data.
    fn synthesize(
        &self,
        specs: &[ComponentSpec],
        built: &[BuiltConfig],
        capabilities: &[Vec<String>],
        context: &ComponentContext,
        synthesis: Synthesis<'_>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<ProvidedCapabilities, ResolutionFailure> {
        let Synthesis {
            factory,
            synthesizer,
        } = synthesis;
        let mut provided = ProvidedCapabilities::new();
        let mut errors = Vec::new();

        for (index, spec) in specs.iter().enumerate() {
            self.checkpoint(Stage::BindingsResolved)?;
            let path = DocPath::component(index);

            let created = factory
                .create(spec, &built[index].config, context)
                .and_then(|mut component| {
                    component.synthesize(&mut *synthesizer)?;
                    Ok(component)
                });
            let component = match created {
                Ok(component) => component,
                Err(source) => {
                    errors.push(StageError::Collaborator {
                        component: spec.name.clone(),
                        path,
                        source,
                    });
                    continue;
                }
            };

            let data = component.capabilities();
            for capability in data.keys() {
                if !capabilities[index].contains(capability) {
                    warnings.push(Diagnostic::warning(
                        "synthesis",
                        path.clone(),
                        format!(
                            "component '{}' provided undeclared capability {}",
                            spec.name, capability
                        ),
                    ));
                }
            }
            tracing::debug!(
                component = %spec.name,
                capabilities = data.len(),
                "Synthesized component"
            );
            provided.insert(spec.name.clone(), data);
        }

        if errors.is_empty() {
            Ok(provided)
        } else {
            Err(ResolutionFailure::new(Stage::BindingsResolved, errors))
        }
    }
}

fn fail_with(stage: Stage, errors: Vec<StageError>, warnings: Vec<Diagnostic>) -> ResolutionFailure {
    tracing::debug!(stage = %stage, errors = errors.len(), "Stage failed");
    ResolutionFailure {
        stage,
        errors,
        warnings,
    }
}

fn with_warnings(mut failure: ResolutionFailure, warnings: &[Diagnostic]) -> ResolutionFailure {
    failure.warnings = warnings.to_vec();
    failure
}
