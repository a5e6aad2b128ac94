//! # stratum-binder
//!
//! Turns `binds` directives into concrete binding operations.
//!
//! Strategies implement [`BinderStrategy`] for one capability each and are
//! collected into a [`BinderRegistry`] at startup. Registration rejects
//! strategies that would compete for the same (source type, capability)
//! pair, so lookup at resolution time is unambiguous. The
//! [`CapabilityResolver`] walks every directive of a manifest, resolves its
//! target (directly or through a [`Selector`]) and invokes the strategy.

pub mod error;
pub mod registry;
pub mod resolver;
pub mod selector;
pub mod strategies;
pub mod strategy;

pub use error::{BinderRegistryError, BindingError, BindingErrorKind};
pub use registry::{BinderRegistry, BinderRegistryBuilder, UNLISTED_SOURCE_TYPE};
pub use resolver::{CapabilityResolver, ComponentView, Resolution};
pub use selector::{Candidate, Selector, SelectorError};
pub use strategies::{builtin_binders, builtin_registry};
pub use strategy::{
    AccessGrant, BinderStrategy, BindingContext, BindingResult, BindingValue, CompatibilityEntry,
    NetworkRule,
};
