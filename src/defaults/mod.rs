//! Default values applied to a record from its schema.
//!
//! [`apply_default_values`] deep-copies the record, crawls the schema with a
//! [`DefaultValueVisitor`] and returns the copy with minimum containers
//! scaffolded, fixed and pattern values merged in, and required slices
//! populated.

pub mod merge;
pub mod scaffold;
pub mod slices;
pub mod visitor;
pub mod writer;

pub use merge::{apply_fixed, apply_fixed_or_pattern, apply_pattern, merge_pattern};
pub use scaffold::apply_minimum;
pub use slices::{assign_values_into_slices, get_value_slice_name};
pub use visitor::{DefaultValueVisitor, Slot};
pub use writer::write_at_key;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::crawler::SchemaCrawler;
use crate::error::Result;
use crate::provider::SchemaResolver;
use crate::types::TypeSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplyOptions {
    /// Seed one empty item into required, unsliced sequences of complex type
    /// that are still empty after scaffolding. Off by default, leaving `[]`.
    pub fill_required_sequences: bool,
}

impl ApplyOptions {
    pub fn with_fill_required_sequences(mut self, enabled: bool) -> Self {
        self.fill_required_sequences = enabled;
        self
    }
}

/// Apply the defaults declared by `schema` to a copy of `record`.
pub fn apply_default_values(record: &Value, schema: &TypeSchema) -> Result<Value> {
    apply_default_values_with(record, schema, None, ApplyOptions::default())
}

/// [`apply_default_values`] with a resolver for slice profiles referenced by
/// URL.
#[instrument(skip_all, fields(schema = %schema.type_name))]
pub fn apply_default_values_with(
    record: &Value,
    schema: &TypeSchema,
    resolver: Option<&dyn SchemaResolver>,
    options: ApplyOptions,
) -> Result<Value> {
    let mut visitor = DefaultValueVisitor::new(record, resolver, options);
    let crawler = match resolver {
        Some(resolver) => SchemaCrawler::new(schema).with_resolver(resolver),
        None => SchemaCrawler::new(schema),
    };
    crawler.crawl(&mut visitor)?;
    debug!("Defaults applied");
    visitor.into_record()
}
