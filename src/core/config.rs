use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::defaults::ApplyOptions;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultsConfig {
    pub fill_required_sequences: bool,
    pub cache: CacheConfig,
    /// Directory of `TypeSchema` JSON files to load schemas from.
    pub schema_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Schemas kept by the caching provider. Zero is treated as one.
    pub capacity: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            fill_required_sequences: false,
            cache: CacheConfig::default(),
            schema_dir: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl DefaultsConfig {
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn with_fill_required_sequences(mut self, enabled: bool) -> Self {
        self.fill_required_sequences = enabled;
        self
    }

    pub fn with_cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            fill_required_sequences: self.fill_required_sequences,
        }
    }
}

impl CacheConfig {
    pub fn minimal() -> Self {
        Self { capacity: 16 }
    }
}
