use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::DefaultsConfig;
use crate::defaults::apply_default_values_with;
use crate::error::Result;
use crate::provider::{DirectorySchemaProvider, InMemorySchemaRegistry, SchemaProvider};
use crate::types::TypeSchema;

/// Async front end: fetches schemas from a provider, then runs the
/// synchronous engine.
pub struct DefaultsManager {
    provider: Arc<dyn SchemaProvider>,
    config: DefaultsConfig,
}

impl DefaultsManager {
    pub fn new(provider: Arc<dyn SchemaProvider>, config: DefaultsConfig) -> Self {
        Self { provider, config }
    }

    /// Load schemas from `config.schema_dir`, behind an LRU cache when the
    /// `lru-cache` feature is on.
    pub async fn from_config(config: DefaultsConfig) -> Result<Self> {
        let dir = config.schema_dir.clone().ok_or_else(|| {
            crate::FhirDefaultsError::invalid_schema("no schema directory configured")
        })?;
        let directory = DirectorySchemaProvider::load(&dir).await?;

        #[cfg(feature = "lru-cache")]
        let provider: Arc<dyn SchemaProvider> = Arc::new(
            crate::provider::CachedSchemaProvider::new(directory, &config.cache),
        );
        #[cfg(not(feature = "lru-cache"))]
        let provider: Arc<dyn SchemaProvider> = Arc::new(directory);

        Ok(Self::new(provider, config))
    }

    /// Apply the defaults of the schema at `profile_url` to a copy of
    /// `record`.
    pub async fn apply(&self, record: &Value, profile_url: &str) -> Result<Value> {
        let schema = self.provider.require_schema(profile_url).await?;
        self.apply_schema(record, &schema).await
    }

    /// Apply an already loaded schema, fetching the slice profiles it
    /// references from the provider.
    pub async fn apply_schema(&self, record: &Value, schema: &TypeSchema) -> Result<Value> {
        let registry = self.preload_profiles(schema).await?;
        apply_default_values_with(record, schema, Some(&registry), self.config.apply_options())
    }

    /// One independent application per record, in input order.
    pub async fn apply_batch(&self, records: &[Value], profile_url: &str) -> Result<Vec<Value>> {
        let schema = self.provider.require_schema(profile_url).await?;
        let registry = self.preload_profiles(&schema).await?;
        let options = self.config.apply_options();

        info!("Applying {} defaults to {} record(s)", schema.type_name, records.len());
        records
            .iter()
            .map(|record| apply_default_values_with(record, &schema, Some(&registry), options))
            .collect()
    }

    /// Fetch every profile reachable through slice types, level by level.
    async fn preload_profiles(&self, schema: &TypeSchema) -> Result<InMemorySchemaRegistry> {
        let registry = InMemorySchemaRegistry::new();
        let mut seen: HashSet<String> = schema.url.iter().cloned().collect();
        let mut pending: Vec<String> = schema.referenced_profiles();

        while !pending.is_empty() {
            pending.retain(|url| seen.insert(url.clone()));
            if pending.is_empty() {
                break;
            }
            debug!("Preloading {} slice profile(s)", pending.len());

            let fetched = join_all(pending.iter().map(|url| self.provider.get_schema(url))).await;
            let mut next = Vec::new();
            for (url, result) in pending.drain(..).zip(fetched) {
                match result? {
                    Some(nested) => {
                        next.extend(nested.referenced_profiles());
                        registry.insert(url, nested);
                    }
                    None => warn!("Slice profile {url} not found; using slice elements"),
                }
            }
            pending = next;
        }

        Ok(registry)
    }

    pub fn provider(&self) -> &Arc<dyn SchemaProvider> {
        &self.provider
    }

    pub fn config(&self) -> &DefaultsConfig {
        &self.config
    }
}

impl std::fmt::Debug for DefaultsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultsManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
