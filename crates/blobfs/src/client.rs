// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! File-transfer commands over object storage
//!
//! A [`BlobClient`] owns one connection's configuration. The backend session
//! is opened on first use, at most once, even under concurrent first calls.
//! A failed attempt leaves the client unconnected and the next command
//! retries.

use crate::attributes::{AttributeRecord, compute_attributes};
use crate::backend::BlobBackend;
use crate::cache::{AttributeCache, CacheStats, ConnectionCache};
use crate::config::ConnectionConfig;
use crate::dirops::DirectoryMutator;
use crate::error::{BackendError, BackendResult, Error, Result};
use crate::lister::{DirectoryEntry, DirectoryLister};
use crate::path::BlobPath;
use crate::resolver::{PathResolver, ResolvedLocation};
use crate::unique::{check_write_kind, next_free_variant};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::OnceCell;

/// Opens the backend for a configuration
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> BackendResult<Arc<dyn BlobBackend>>;
}

/// A [`Connector`] that hands out one existing backend
pub struct SharedBackend(Arc<dyn BlobBackend>);

impl SharedBackend {
    pub fn new<B: BlobBackend + 'static>(backend: B) -> Self {
        Self(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<dyn BlobBackend>) -> Self {
        Self(backend)
    }
}

#[async_trait]
impl Connector for SharedBackend {
    async fn connect(&self, _config: &ConnectionConfig) -> BackendResult<Arc<dyn BlobBackend>> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Delete the object once it has been copied out
    pub delete_after: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Pick a numbered variant of the name instead of overwriting
    pub unique: bool,
    /// Append to an append object instead of replacing a block object
    pub append: bool,
    /// Report that the caller should remove its local source afterwards
    pub delete_source: bool,
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    /// Path actually written, as the caller addresses it
    pub path: String,
    /// True when a unique upload chose a different name
    pub renamed: bool,
    pub delete_source: bool,
    pub bytes: u64,
}

/// Requested timestamps for [`BlobClient::set_attributes`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTimes {
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

/// Pick the remote file name for an upload
///
/// An explicit destination wins unless it is empty or merely names the host,
/// in which case a non-empty source path is used instead.
pub fn best_filename(destination: &str, source: &str, host_alias: &str) -> String {
    if (destination.is_empty() || destination == host_alias) && !source.is_empty() {
        source.to_string()
    } else {
        destination.to_string()
    }
}

struct Session {
    backend: Arc<dyn BlobBackend>,
    resolver: PathResolver,
    cache: ConnectionCache,
}

impl Session {
    fn resolve(&self, raw: &str) -> Result<ResolvedLocation> {
        self.resolver.resolve(self.backend.as_ref(), raw)
    }

    /// Forget `path` and every directory above it within its container
    fn invalidate_lineage(&self, location: &ResolvedLocation) {
        let mut path = location.full_path().clone();
        while !path.is_empty() {
            self.cache.invalidate(&path);
            path = path.parent();
        }
    }
}

pub struct BlobClient {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    cache: Arc<AttributeCache>,
    session: OnceCell<Session>,
}

impl BlobClient {
    pub fn new(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        cache: Arc<AttributeCache>,
    ) -> Self {
        Self {
            config,
            connector,
            cache,
            session: OnceCell::new(),
        }
    }

    /// Client over an existing backend with a private cache
    pub fn with_backend<B: BlobBackend + 'static>(config: ConnectionConfig, backend: B) -> Self {
        Self::new(
            config,
            Arc::new(SharedBackend::new(backend)),
            AttributeCache::shared(),
        )
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.session.initialized()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn session(&self) -> Result<&Session> {
        self.session
            .get_or_try_init(|| async {
                let connection = self.config.redacted_connection_string();
                let proxy = self.config.proxy().unwrap_or_else(|| "none".to_string());
                diagnostics::log_debug!("connecting as {connection}", connection: connection);
                diagnostics::log_debug!("proxy is {proxy}", proxy: proxy);
                let backend = self
                    .connector
                    .connect(&self.config)
                    .await
                    .map_err(|e| Error::from_backend(&self.config.account_name, e))?;
                let bound = match self.config.bound_container() {
                    Some(name) => Some(
                        backend
                            .open_container(name)
                            .map_err(|e| Error::from_backend(name, e))?,
                    ),
                    None => None,
                };
                Ok::<_, Error>(Session {
                    backend,
                    resolver: PathResolver::new(bound),
                    cache: ConnectionCache::new(self.cache.clone(), self.config.connection_key()),
                })
            })
            .await
    }

    /// List the immediate children of `path`
    pub async fn dir(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        diagnostics::log_debug!("DIR '{path}'", path: path);
        let session = self.session().await?;
        let location = session.resolve(path)?;
        DirectoryLister::new(session.backend.as_ref())
            .with_cache(&session.cache)
            .list(&location)
            .await
    }

    /// Copy the object at `path` into `destination`, returning the byte count
    pub async fn get<W>(&self, path: &str, destination: &mut W, options: DownloadOptions) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        diagnostics::log_debug!("GET remote '{path}'", path: path);
        let session = self.session().await?;
        let location = session.resolve(path)?;
        let Some(container) = location.container() else {
            return Err(Error::not_found(location.full_path()));
        };
        if location.path().is_empty() {
            return Err(Error::not_found(location.full_path()));
        }
        let full_path = location.full_path();

        let mut reader = session
            .backend
            .open_read(container, &location.key())
            .await
            .map_err(|e| Error::from_backend(full_path, e))?;
        let bytes = tokio::io::copy(&mut reader, destination)
            .await
            .map_err(|e| Error::io(full_path, e))?;
        destination
            .flush()
            .await
            .map_err(|e| Error::io(full_path, e))?;

        if options.delete_after {
            session
                .backend
                .delete_object(container, &location.key())
                .await
                .map_err(|e| Error::from_backend(full_path, e))?;
            session.invalidate_lineage(&location);
        }
        Ok(bytes)
    }

    /// Store the content of `source` at `path`
    pub async fn put<R>(&self, path: &str, source: &mut R, options: UploadOptions) -> Result<PutOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        let unique = options.unique;
        let append = options.append;
        diagnostics::log_debug!(
            "PUT to remote '{path}' (unique {unique}, append {append})",
            path: path,
            unique: unique,
            append: append
        );
        let session = self.session().await?;
        let location = session.resolve(path)?;
        let Some(container) = location.container() else {
            return Err(Error::not_found(location.full_path()));
        };
        if location.path().is_empty() {
            return Err(Error::not_found(location.full_path()));
        }
        let wrap = |e: BackendError| Error::from_backend(location.full_path(), e);

        let existing = check_write_kind(
            session.backend.as_ref(),
            container,
            &location.key(),
            options.append,
        )
        .await
        .map_err(wrap)?;

        let target = if options.unique && existing.is_some() {
            let variant = next_free_variant(session.backend.as_ref(), container, location.path())
                .await
                .map_err(wrap)?;
            location.renamed(variant.name())
        } else {
            location.clone()
        };
        let target_path = target.full_path();

        let mut writer = session
            .backend
            .open_write(container, &target.key(), options.append)
            .await
            .map_err(|e| Error::from_backend(target_path, e))?;
        let bytes = tokio::io::copy(source, &mut writer)
            .await
            .map_err(|e| Error::io(target_path, e))?;
        writer
            .shutdown()
            .await
            .map_err(|e| Error::unavailable(target_path, e))?;
        session.invalidate_lineage(&target);

        Ok(PutOutcome {
            path: target.display_base().to_string(),
            renamed: target != location,
            delete_source: options.delete_source,
            bytes,
        })
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        diagnostics::log_debug!("DELETE '{path}'", path: path);
        let session = self.session().await?;
        let location = session.resolve(path)?;
        let Some(container) = location.container() else {
            return Err(Error::not_found(location.full_path()));
        };
        if location.path().is_empty() {
            return Err(Error::not_found(location.full_path()));
        }
        session
            .backend
            .delete_object(container, &location.key())
            .await
            .map_err(|e| Error::from_backend(location.full_path(), e))?;
        session.invalidate_lineage(&location);
        Ok(())
    }

    pub async fn mkdir(&self, path: &str) -> Result<()> {
        diagnostics::log_debug!("MKDIR '{path}'", path: path);
        let session = self.session().await?;
        let location = session.resolve(path)?;
        DirectoryMutator::new(session.backend.as_ref(), session.resolver.is_bound())
            .mkdir(&location)
            .await?;
        session.invalidate_lineage(&location);
        Ok(())
    }

    pub async fn rmdir(&self, path: &str) -> Result<()> {
        diagnostics::log_debug!("RMDIR '{path}'", path: path);
        let session = self.session().await?;
        let location = session.resolve(path)?;
        DirectoryMutator::new(session.backend.as_ref(), session.resolver.is_bound())
            .rmdir(&location)
            .await?;
        session.cache.invalidate_prefix(location.full_path());
        session.invalidate_lineage(&location);
        Ok(())
    }

    /// Attributes of `path`, served from the shared cache when possible
    pub async fn attributes(&self, path: &str) -> Result<AttributeRecord> {
        diagnostics::log_debug!("ATTR '{path}'", path: path);
        let session = self.session().await?;
        let location = session.resolve(path)?;
        let backend = session.backend.as_ref();
        session
            .cache
            .get_or_compute(location.full_path(), || {
                compute_attributes(backend, &location)
            })
            .await?
            .ok_or_else(|| Error::not_found(location.full_path()))
    }

    /// Attributes are read-only; this always fails
    pub async fn set_attributes(&self, path: &str, times: FileTimes) -> Result<()> {
        let modified = times.modified.map(|t| t.to_rfc3339()).unwrap_or_default();
        diagnostics::log_debug!(
            "SETATTR '{path}' refused (modified {modified})",
            path: path,
            modified: modified
        );
        Err(Error::read_only(BlobPath::canonical(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_filename() {
        assert_eq!(best_filename("remote.txt", "local.txt", "host"), "remote.txt");
        assert_eq!(best_filename("", "local.txt", "host"), "local.txt");
        assert_eq!(best_filename("host", "local.txt", "host"), "local.txt");
        assert_eq!(best_filename("host", "", "host"), "host");
        assert_eq!(best_filename("", "", "host"), "");
    }
}
