//! Load the resource catalog: the embedded catalog.json, or a JSON file given at startup.

use crate::config::{resolve, Catalog, CatalogConfig};
use crate::error::ConfigError;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("catalog.json");

pub fn builtin_config() -> Result<CatalogConfig, ConfigError> {
    serde_json::from_str(BUILTIN_CATALOG).map_err(|e| ConfigError::Load(format!("embedded catalog: {}", e)))
}

pub async fn config_from_path(path: &Path) -> Result<CatalogConfig, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Resolve the catalog from `path` when given, else from the embedded default.
pub async fn load_catalog(path: Option<&Path>) -> Result<Catalog, ConfigError> {
    let config = match path {
        Some(p) => {
            tracing::info!(path = %p.display(), "loading resource catalog");
            config_from_path(p).await?
        }
        None => builtin_config()?,
    };
    resolve(&config)
}
