use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::SchemaProvider;
use crate::core::config::CacheConfig;
use crate::error::Result;
use crate::types::TypeSchema;

/// LRU front for a slower provider.
#[derive(Debug)]
pub struct CachedSchemaProvider<P> {
    inner: P,
    cache: Arc<RwLock<LruCache<String, Arc<TypeSchema>>>>,
    stats: Arc<RwLock<CacheStats>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl<P: SchemaProvider> CachedSchemaProvider<P> {
    pub fn new(inner: P, config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Arc::new(RwLock::new(LruCache::new(capacity))),
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub async fn stats(&self) -> CacheStats {
        *self.stats.read().await
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut stats = self.stats.write().await;
        cache.clear();
        stats.entries = 0;
    }
}

#[async_trait]
impl<P: SchemaProvider> SchemaProvider for CachedSchemaProvider<P> {
    async fn get_schema(&self, url: &str) -> Result<Option<Arc<TypeSchema>>> {
        {
            let mut cache = self.cache.write().await;
            if let Some(schema) = cache.get(url) {
                let schema = Arc::clone(schema);
                self.stats.write().await.hits += 1;
                return Ok(Some(schema));
            }
        }

        self.stats.write().await.misses += 1;
        let Some(schema) = self.inner.get_schema(url).await? else {
            return Ok(None);
        };

        debug!("Caching schema {url}");
        let mut cache = self.cache.write().await;
        cache.put(url.to_string(), Arc::clone(&schema));
        self.stats.write().await.entries = cache.len();
        Ok(Some(schema))
    }

    async fn list_schemas(&self) -> Result<Vec<String>> {
        self.inner.list_schemas().await
    }
}
