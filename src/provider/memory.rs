use async_trait::async_trait;
use papaya::HashMap as PapayaMap;
use std::sync::Arc;
use tracing::debug;

use super::{SchemaProvider, SchemaResolver};
use crate::error::Result;
use crate::types::TypeSchema;

/// Lock-free schema registry keyed by profile URL.
#[derive(Debug, Default)]
pub struct InMemorySchemaRegistry {
    schemas: PapayaMap<String, Arc<TypeSchema>>,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schemas(schemas: impl IntoIterator<Item = TypeSchema>) -> Self {
        let registry = Self::new();
        for schema in schemas {
            registry.register(schema);
        }
        registry
    }

    /// Register under the schema's URL, or its name when it has none.
    pub fn register(&self, schema: TypeSchema) -> Arc<TypeSchema> {
        let key = schema.url.clone().unwrap_or_else(|| schema.name.clone());
        let schema = Arc::new(schema);
        self.insert(key, Arc::clone(&schema));
        schema
    }

    pub fn insert(&self, url: impl Into<String>, schema: Arc<TypeSchema>) {
        let url = url.into();
        debug!("Registering schema {} as {url}", schema.name);
        self.schemas.pin().insert(url, schema);
    }

    pub fn get(&self, url: &str) -> Option<Arc<TypeSchema>> {
        self.schemas.pin().get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.schemas.pin().contains_key(url)
    }

    pub fn remove(&self, url: &str) -> bool {
        self.schemas.pin().remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn urls(&self) -> Vec<String> {
        let guard = self.schemas.pin();
        let mut urls: Vec<String> = guard.keys().cloned().collect();
        urls.sort();
        urls
    }
}

impl SchemaResolver for InMemorySchemaRegistry {
    fn resolve(&self, url: &str) -> Option<Arc<TypeSchema>> {
        self.get(url)
    }
}

#[async_trait]
impl SchemaProvider for InMemorySchemaRegistry {
    async fn get_schema(&self, url: &str) -> Result<Option<Arc<TypeSchema>>> {
        Ok(self.get(url))
    }

    async fn list_schemas(&self) -> Result<Vec<String>> {
        Ok(self.urls())
    }
}
