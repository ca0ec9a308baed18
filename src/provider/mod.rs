//! Schema resolution by profile URL.
//!
//! The traversal itself is synchronous and only needs [`SchemaResolver`].
//! Loading schemas from disk or other slow sources goes through the async
//! [`SchemaProvider`]; the manager preloads what a traversal will need into an
//! [`InMemorySchemaRegistry`] before running it.

pub mod directory;
pub mod memory;

#[cfg(feature = "lru-cache")]
pub mod cache;

pub use directory::DirectorySchemaProvider;
pub use memory::InMemorySchemaRegistry;

#[cfg(feature = "lru-cache")]
pub use cache::CachedSchemaProvider;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::types::TypeSchema;

/// Synchronous lookup used while crawling.
pub trait SchemaResolver: Send + Sync {
    fn resolve(&self, url: &str) -> Option<Arc<TypeSchema>>;
}

#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn get_schema(&self, url: &str) -> Result<Option<Arc<TypeSchema>>>;

    async fn list_schemas(&self) -> Result<Vec<String>>;

    async fn require_schema(&self, url: &str) -> Result<Arc<TypeSchema>> {
        self.get_schema(url)
            .await?
            .ok_or_else(|| crate::FhirDefaultsError::schema_not_found(url))
    }
}

impl<T: SchemaResolver + ?Sized> SchemaResolver for Arc<T> {
    fn resolve(&self, url: &str) -> Option<Arc<TypeSchema>> {
        (**self).resolve(url)
    }
}
