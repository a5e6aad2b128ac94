//! # stratum-schema
//!
//! JSON Schema validation for Stratum manifests.
//!
//! The manifest schema is composed per run from a fixed base schema and the
//! config schemas of the component types the manifest uses. Compiled
//! validators live in a [`SchemaCache`] that callers own and pass by
//! reference.
//!
//! ```ignore
//! let cache = SchemaCache::default();
//! let validator = SchemaValidator::new(&cache, &registry);
//! if let Err(errors) = validator.validate(&document) {
//!     println!("{}", ValidationResult::from_errors(&errors).render_human());
//! }
//! ```

pub mod cache;
pub mod compose;
pub mod error;
pub mod report;
pub mod suggest;
pub mod validator;

pub use cache::{BASE_SCHEMA_FILE, ComposedSchema, SchemaCache, SchemaSource};
pub use error::{SchemaError, SchemaLoadError};
pub use report::{ValidationResult, group_by_path};
pub use validator::{SchemaValidator, validate_config};
