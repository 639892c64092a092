// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! BlobFS - a filesystem view over object storage
//!
//! Containers appear as top-level directories (unless the connection is
//! bound to one container, which then becomes the root) and '/'-separated
//! key prefixes appear as nested directories.
//!
//! Set BLOBFS_LOG to control logging:
//! - BLOBFS_LOG=off (default) - silent
//! - BLOBFS_LOG=info - connections and mutations
//! - BLOBFS_LOG=debug - every command and cache decision

// Error types
pub mod error;

// Delimiter-aware paths
pub mod path;

/// Storage boundary and its implementations
pub mod backend;
pub mod memory;
pub mod object_store_backend;

// Logical path to container and key
pub mod resolver;

pub mod entry_kind;
pub mod attributes;
pub mod cache;
pub mod lister;
pub mod dirops;
pub mod unique;

// Streaming adapters for backend readers and writers
pub mod async_helpers;

pub mod config;
pub mod client;

pub use attributes::{AttributeKind, AttributeRecord, AttributeSource, compute_attributes};
pub use backend::{
    BlobBackend, ByteReader, ByteWriter, ContainerInfo, ContainerRef, ListItem, NamingRule,
    ObjectKind, ObjectProperties,
};
pub use cache::{AttributeCache, CacheStats, ConnectionCache, ConnectionKey};
pub use client::{
    BlobClient, Connector, DownloadOptions, FileTimes, PutOutcome, SharedBackend, UploadOptions,
    best_filename,
};
pub use config::{ConfigError, ConnectionConfig, HeaderRow};
pub use entry_kind::EntryKind;
pub use error::{BackendError, BackendResult, Error, Result};
pub use lister::{DIRECTORY_SIZE, DirectoryEntry, DirectoryLister};
pub use memory::{CallCounts, MemoryBackend};
pub use object_store_backend::ObjectStoreBackend;
pub use path::{BlobPath, CANONICAL_DELIMITER};
pub use resolver::{PathResolver, ResolvedLocation};

#[cfg(test)]
mod tests;
