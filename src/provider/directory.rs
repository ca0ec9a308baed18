use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

use super::{InMemorySchemaRegistry, SchemaProvider, SchemaResolver};
use crate::error::Result;
use crate::types::TypeSchema;

/// Loads every `*.json` type schema in a directory (not recursive).
///
/// Schemas are addressable by profile URL and by name.
#[derive(Debug)]
pub struct DirectorySchemaProvider {
    root: PathBuf,
    registry: InMemorySchemaRegistry,
}

impl DirectorySchemaProvider {
    pub async fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let registry = InMemorySchemaRegistry::new();

        let mut files = Vec::new();
        let mut entries = fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        for path in files {
            match Self::read_schema(&path).await {
                Ok(schema) => {
                    let schema = Arc::new(schema);
                    if let Some(url) = &schema.url {
                        registry.insert(strip_version(url), Arc::clone(&schema));
                    }
                    registry.insert(schema.name.clone(), schema);
                }
                Err(e) => warn!("Skipping {}: {e}", path.display()),
            }
        }

        info!(
            "Loaded {} schema entries from {}",
            registry.len(),
            root.display()
        );
        Ok(Self { root, registry })
    }

    async fn read_schema(path: &Path) -> Result<TypeSchema> {
        let content = fs::read_to_string(path).await?;
        let schema: TypeSchema = serde_json::from_str(&content)?;
        if let Some(url) = &schema.url {
            Url::parse(strip_version(url))?;
        }
        schema.validate_structure()?;
        debug!("Read {schema} from {}", path.display());
        Ok(schema)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &InMemorySchemaRegistry {
        &self.registry
    }
}

/// Drop a `|version` suffix from a canonical reference.
fn strip_version(url: &str) -> &str {
    url.split_once('|').map_or(url, |(base, _)| base)
}

impl SchemaResolver for DirectorySchemaProvider {
    fn resolve(&self, url: &str) -> Option<Arc<TypeSchema>> {
        self.registry.get(strip_version(url))
    }
}

#[async_trait]
impl SchemaProvider for DirectorySchemaProvider {
    async fn get_schema(&self, url: &str) -> Result<Option<Arc<TypeSchema>>> {
        Ok(self.resolve(url))
    }

    async fn list_schemas(&self) -> Result<Vec<String>> {
        Ok(self.registry.urls())
    }
}
