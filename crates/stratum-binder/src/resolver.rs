//! The binding resolution pass.
//!
//! Runs strictly after every component's final configuration and declared
//! capabilities are known. Each `binds` directive is resolved independently,
//! in manifest order:
//!
//! 1. resolve the target (`to`, or `select` evaluated against the manifest)
//! 2. check the target declares the requested capability
//! 3. find the one strategy that handles (source type, capability); none is
//!    "unsupported", several is "ambiguous"
//! 4. invoke it
//!
//! A failure affects only its own directive. After the pass, bindings that
//! point at a component with failed bindings of its own are failed as "target
//! not ready", propagated along chains until nothing changes.

use crate::error::BindingError;
use crate::registry::BinderRegistry;
use crate::selector::{Candidate, Selector, SelectorError};
use crate::strategy::{BindingContext, BindingResult};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use stratum_core::{
    BindDirective, BindTarget, CancellationToken, Cancelled, ComponentContext, ComponentSpec,
    DocPath,
};

/// A component as the resolver sees it.
#[derive(Debug, Clone)]
pub struct ComponentView<'a> {
    /// Position in the manifest's `components` list.
    pub index: usize,
    pub spec: &'a ComponentSpec,
    /// Final configuration.
    pub config: &'a Value,
    /// Names of the capabilities the component's type declares.
    pub capabilities: Vec<String>,
    /// Capability data provided after synthesis, keyed by capability name.
    pub provided: Option<&'a BTreeMap<String, Value>>,
}

/// Output of a resolution pass. Both lists are in manifest order.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub bindings: Vec<BindingResult>,
    pub errors: Vec<BindingError>,
}

impl Resolution {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Outcome {
    source: String,
    target: Option<String>,
    path: DocPath,
    result: Result<BindingResult, BindingError>,
}

/// Resolves `binds` directives against a [`BinderRegistry`].
pub struct CapabilityResolver<'a> {
    registry: &'a BinderRegistry,
    context: &'a ComponentContext,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> CapabilityResolver<'a> {
    pub fn new(registry: &'a BinderRegistry, context: &'a ComponentContext) -> Self {
        Self {
            registry,
            context,
            cancel: None,
        }
    }

    /// Check `token` before every binding.
    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn resolve(&self, components: &[ComponentView<'_>]) -> Result<Resolution, Cancelled> {
        let by_name: BTreeMap<&str, &ComponentView<'_>> = components
            .iter()
            .map(|view| (view.spec.name.as_str(), view))
            .collect();
        let candidates: Vec<Candidate<'_>> = components
            .iter()
            .map(|view| Candidate {
                name: &view.spec.name,
                component_type: &view.spec.component_type,
                labels: &view.spec.labels,
                capabilities: &view.capabilities,
            })
            .collect();

        let mut outcomes = Vec::new();
        for view in components {
            for (index, directive) in view.spec.binds.iter().enumerate() {
                if let Some(token) = self.cancel {
                    token.check()?;
                }
                let binding_id = format!("{}.binds[{}]", view.spec.name, index);
                let path = DocPath::component(view.index).key("binds").index(index);
                let outcome = self.resolve_one(view, directive, &binding_id, path, &by_name, &candidates);

                match &outcome.result {
                    Ok(result) => tracing::debug!(
                        binding = %binding_id,
                        target = %result.target,
                        strategy = %result.strategy,
                        "Resolved binding"
                    ),
                    Err(error) => tracing::debug!(
                        binding = %binding_id,
                        error = %error.message,
                        "Binding failed"
                    ),
                }
                outcomes.push(outcome);
            }
        }

        propagate_not_ready(&mut outcomes);

        let mut resolution = Resolution::default();
        for outcome in outcomes {
            match outcome.result {
                Ok(result) => resolution.bindings.push(result),
                Err(error) => resolution.errors.push(error),
            }
        }
        Ok(resolution)
    }

    fn resolve_one(
        &self,
        view: &ComponentView<'_>,
        directive: &BindDirective,
        binding_id: &str,
        path: DocPath,
        by_name: &BTreeMap<&str, &ComponentView<'_>>,
        candidates: &[Candidate<'_>],
    ) -> Outcome {
        let source = view.spec.name.clone();
        let fail = |target: Option<String>, path: DocPath, error: BindingError| Outcome {
            source: source.clone(),
            target,
            path,
            result: Err(error),
        };

        let target_name = match directive.target() {
            None => {
                let error = BindingError::invalid_directive(binding_id, path.clone());
                return fail(None, path, error);
            }
            Some(BindTarget::Direct(name)) => name.to_string(),
            Some(BindTarget::Selector(expression)) => {
                let select_path = path.key("select");
                let picked = Selector::parse(expression)
                    .map_err(|e| BindingError::invalid_selector(binding_id, select_path.clone(), e))
                    .and_then(|selector| {
                        selector
                            .select(&view.spec.name, candidates)
                            .map(|c| c.name.to_string())
                            .map_err(|e| match e {
                                SelectorError::Ambiguous(names) => BindingError::selector_ambiguous(
                                    binding_id,
                                    select_path.clone(),
                                    expression,
                                    &names,
                                ),
                                SelectorError::NoMatch => BindingError::selector_no_match(
                                    binding_id,
                                    select_path.clone(),
                                    expression,
                                ),
                                other => BindingError::invalid_selector(
                                    binding_id,
                                    select_path.clone(),
                                    other,
                                ),
                            })
                    });
                match picked {
                    Ok(name) => name,
                    Err(error) => return fail(None, path, error),
                }
            }
        };

        let Some(target) = by_name.get(target_name.as_str()) else {
            let error = BindingError::target_not_found(binding_id, path.key("to"), &target_name);
            return fail(None, path, error);
        };
        let target_name = Some(target.spec.name.clone());

        let capability = directive.capability.as_str();
        if !target.capabilities.iter().any(|c| c == capability) {
            let error = BindingError::capability_not_provided(
                binding_id,
                path.key("capability"),
                &target.spec.name,
                capability,
                &target.capabilities,
            );
            return fail(target_name, path, error);
        }

        let source_type = view.spec.component_type.as_str();
        let strategy = match self.registry.find(source_type, capability) {
            Ok(Some(strategy)) => strategy,
            Ok(None) => {
                let error =
                    BindingError::unsupported(binding_id, path.clone(), source_type, capability);
                return fail(target_name, path, error);
            }
            Err(conflict) => {
                let error = BindingError::ambiguous_strategy(binding_id, path.clone(), &conflict);
                return fail(target_name, path, error);
            }
        };

        let provided = target
            .provided
            .and_then(|data| data.get(capability))
            .and_then(Value::as_object);
        let ctx = BindingContext {
            binding_id,
            path: &path,
            source: &view.spec.name,
            source_type,
            target: &target.spec.name,
            target_type: &target.spec.component_type,
            target_config: target.config,
            directive,
            provided,
            context: self.context,
        };
        let result = strategy.bind(&ctx);

        Outcome {
            source,
            target: target_name,
            path,
            result,
        }
    }
}

/// Fail successful bindings whose target has failed bindings, until stable.
fn propagate_not_ready(outcomes: &mut [Outcome]) {
    let mut failed: BTreeSet<String> = outcomes
        .iter()
        .filter(|o| o.result.is_err())
        .map(|o| o.source.clone())
        .collect();

    loop {
        let mut changed = false;
        for outcome in outcomes.iter_mut() {
            let Ok(result) = &outcome.result else {
                continue;
            };
            let Some(target) = &outcome.target else {
                continue;
            };
            if failed.contains(target) && target != &outcome.source {
                let error =
                    BindingError::target_not_ready(&result.binding_id, outcome.path.clone(), target);
                outcome.result = Err(error);
                failed.insert(outcome.source.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}
