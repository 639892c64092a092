// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use blobfs::{
    AttributeCache, BackendError, BackendResult, BlobBackend, BlobClient, ConnectionConfig,
    Connector, DirectoryEntry, ObjectStoreBackend,
};
use object_store::local::LocalFileSystem;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "BLOBFS_CONFIG";

/// Opens an [`ObjectStoreBackend`] over the configured local directory
pub struct LocalConnector;

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(&self, config: &ConnectionConfig) -> BackendResult<Arc<dyn BlobBackend>> {
        let root = config
            .root
            .clone()
            .ok_or_else(|| BackendError::unavailable("no 'root' directory configured"))?;
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            BackendError::unavailable(format!("cannot create {}: {e}", root.display()))
        })?;

        let root_display = root.display().to_string();
        diagnostics::log_debug!("local store at {root}", root: root_display);

        let store = LocalFileSystem::new_with_prefix(&root)
            .map_err(BackendError::unavailable)?
            .with_automatic_cleanup(true);
        Ok(Arc::new(ObjectStoreBackend::new(Arc::new(store))))
    }
}

/// Everything a command needs to reach the store
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    /// Explicit configuration file; falls back to `BLOBFS_CONFIG`
    pub config_path: Option<PathBuf>,
    /// Overrides the configured bound container. Empty means unbound.
    pub container: Option<String>,
}

impl ClientContext {
    pub fn new(config_path: Option<PathBuf>, container: Option<String>) -> Self {
        Self {
            config_path,
            container,
        }
    }

    fn config_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config_path {
            return Ok(path.clone());
        }
        env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .map_err(|_| anyhow!("no --config given and {CONFIG_ENV} is not set"))
    }

    pub fn load_config(&self) -> Result<ConnectionConfig> {
        let path = self.config_path()?;
        let mut config = ConnectionConfig::load(&path)
            .map_err(|e| anyhow!("Failed to load {}: {}", path.display(), e))?;
        if let Some(container) = &self.container {
            config.container = Some(container.clone());
        }
        Ok(config)
    }

    pub fn open_client(&self) -> Result<BlobClient> {
        let config = self.load_config()?;
        Ok(BlobClient::new(
            config,
            Arc::new(LocalConnector),
            AttributeCache::shared(),
        ))
    }
}

/// Helper function to format file sizes
pub fn format_file_size(size: u64) -> String {
    if size >= 1024 * 1024 {
        format!("{:.1}MB", size as f64 / (1024.0 * 1024.0))
    } else if size >= 1024 {
        format!("{:.1}KB", size as f64 / 1024.0)
    } else {
        format!("{size}B")
    }
}

/// One listing line: type symbol, size, timestamp, path
pub fn format_entry(entry: &DirectoryEntry) -> String {
    let (symbol, size) = if entry.is_directory() {
        ("📁", "-".to_string())
    } else {
        ("📄", format_file_size(u64::try_from(entry.size).unwrap_or(0)))
    };
    let time = entry
        .modified
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{symbol} {size:>9} {time:>19} {}", entry.path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0B");
        assert_eq!(format_file_size(1023), "1023B");
        assert_eq!(format_file_size(2048), "2.0KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.0MB");
    }

    #[test]
    fn test_explicit_path_wins() {
        let context = ClientContext::new(Some(PathBuf::from("/nonexistent/blobfs.yaml")), None);
        let err = context.load_config().expect_err("file is missing");
        assert!(err.to_string().contains("/nonexistent/blobfs.yaml"));
    }
}
