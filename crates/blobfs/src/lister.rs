// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Directory listing synthesized from single-level prefix listings

use crate::attributes::AttributeRecord;
use crate::backend::{BlobBackend, ListItem};
use crate::cache::ConnectionCache;
use crate::entry_kind::EntryKind;
use crate::error::{Error, Result};
use crate::path::{BlobPath, CANONICAL_DELIMITER};
use crate::resolver::ResolvedLocation;
use chrono::{DateTime, Utc};

/// Size reported for directory entries
pub const DIRECTORY_SIZE: i64 = -1;

/// One child in a directory listing, as the caller sees it
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    /// Caller-relative path; directories end with '/'
    pub path: String,
    pub kind: EntryKind,
    /// Byte size, or [`DIRECTORY_SIZE`] for directories
    pub size: i64,
    pub modified: Option<DateTime<Utc>>,
}

impl DirectoryEntry {
    fn directory(display: &BlobPath, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            path: format!("{display}{CANONICAL_DELIMITER}"),
            kind: EntryKind::Directory,
            size: DIRECTORY_SIZE,
            modified,
        }
    }

    fn file(display: &BlobPath, size: u64, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            path: display.to_string(),
            kind: EntryKind::File,
            size: i64::try_from(size).unwrap_or(i64::MAX),
            modified,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// Last path segment, without the directory suffix
    pub fn name(&self) -> &str {
        let trimmed = self.path.trim_end_matches(CANONICAL_DELIMITER);
        trimmed
            .rsplit(CANONICAL_DELIMITER)
            .next()
            .unwrap_or(trimmed)
    }
}

pub struct DirectoryLister<'a> {
    backend: &'a dyn BlobBackend,
    cache: Option<&'a ConnectionCache>,
}

impl<'a> DirectoryLister<'a> {
    pub fn new(backend: &'a dyn BlobBackend) -> Self {
        Self {
            backend,
            cache: None,
        }
    }

    /// Prime `cache` with the attributes of every listed entry
    pub fn with_cache(mut self, cache: &'a ConnectionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Immediate children of `location`, in backend order
    pub async fn list(&self, location: &ResolvedLocation) -> Result<Vec<DirectoryEntry>> {
        let Some(container) = location.container() else {
            return self.list_containers(location).await;
        };

        let delimiter = self.backend.delimiter();
        let prefix = location.path().as_prefix();
        // Taken before the listing so a write that lands meanwhile wins
        let generation = self.cache.map(ConnectionCache::generation);
        let items = self
            .backend
            .list_objects(container, &prefix)
            .await
            .map_err(|e| Error::from_backend(location.full_path(), e))?;

        let display_base = location.display_base();
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ListItem::Prefix(reported) => {
                    let parsed = BlobPath::parse(&reported, delimiter);
                    let name = parsed.name();
                    if name.is_empty() {
                        continue;
                    }
                    entries.push(DirectoryEntry::directory(&display_base.child(name), None));
                }
                ListItem::Object(properties) => {
                    // The placeholder that keeps this directory alive
                    if properties.key == prefix {
                        continue;
                    }
                    let parsed = BlobPath::parse(&properties.key, delimiter);
                    let name = parsed.name();
                    if name.is_empty() {
                        continue;
                    }
                    entries.push(DirectoryEntry::file(
                        &display_base.child(name),
                        properties.size,
                        properties.last_modified,
                    ));
                    if let (Some(cache), Some(seen)) = (self.cache, generation) {
                        _ = cache.put_if_unchanged(
                            &location.full_path().child(name),
                            AttributeRecord::from_object(&properties),
                            seen,
                        );
                    }
                }
            }
        }

        let count = entries.len();
        let path = location.full_path().to_string();
        diagnostics::log_debug!("listed {count} entries under {path}", count: count, path: path);
        Ok(entries)
    }

    async fn list_containers(&self, location: &ResolvedLocation) -> Result<Vec<DirectoryEntry>> {
        let generation = self.cache.map(ConnectionCache::generation);
        let containers = self
            .backend
            .list_containers()
            .await
            .map_err(|e| Error::from_backend(location.full_path(), e))?;

        Ok(containers
            .into_iter()
            .map(|info| {
                if let (Some(cache), Some(seen)) = (self.cache, generation) {
                    _ = cache.put_if_unchanged(
                        &BlobPath::canonical(&info.name),
                        AttributeRecord::from_container(&info),
                        seen,
                    );
                }
                DirectoryEntry::directory(&BlobPath::canonical(&info.name), info.last_modified)
            })
            .collect())
    }
}
