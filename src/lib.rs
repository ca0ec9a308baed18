//! # OctoFHIR FHIRSchema Defaults
//!
//! Applies the default values declared by a FHIR profile to a resource:
//! required complex elements get empty containers, fixed and pattern values
//! are merged in without overwriting data, and required slices of repeated
//! elements get a placeholder item carrying the slice's defaults.
//!
//! ## Features
//!
//! - **Non-destructive**: the input record is never modified and present
//!   values always win over defaults
//! - **Slicing aware**: items are classified into slices by their
//!   discriminators before slice defaults are applied
//! - **Async schema loading**: directory, in-memory and LRU-cached providers
//!   behind one trait
//!
//! ## Quick Start
//!
//! ```rust
//! use octofhir_fhirschema_defaults::*;
//! use serde_json::json;
//!
//! # fn example() -> Result<()> {
//! let schema = TypeSchema::new("Observation").with_element(
//!     "status",
//!     ElementSpec::new("code").with_fixed(TaggedValue::new("code", json!("final"))),
//! );
//!
//! let record = json!({"resourceType": "Observation"});
//! let output = apply_default_values(&record, &schema)?;
//! assert_eq!(output["status"], "final");
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod crawler;
pub mod defaults;
pub mod error;
pub mod matching;
pub mod navigation;
pub mod provider;
pub mod types;

pub use crate::core::{CacheConfig, DefaultsConfig, DefaultsManager};
pub use crawler::{ElementsContext, EventRecorder, SchemaCrawler, SchemaVisitor};
pub use defaults::{
    ApplyOptions, DefaultValueVisitor, apply_default_values, apply_default_values_with,
    apply_fixed, apply_pattern, assign_values_into_slices, get_value_slice_name,
};
pub use error::Result; // Our Result type takes precedence
pub use error::FhirDefaultsError;
pub use matching::{deep_partial_match, match_discriminant};
pub use navigation::{
    AccessOptions, NestedProperty, ValuePath, get_nested_property, get_nested_value,
};
pub use provider::{
    DirectorySchemaProvider, InMemorySchemaRegistry, SchemaProvider, SchemaResolver,
};
pub use types::*;

#[cfg(feature = "lru-cache")]
pub use provider::CachedSchemaProvider;
