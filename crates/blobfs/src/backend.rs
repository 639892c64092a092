// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! The object-storage boundary consumed by the adapter

use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;
pub type ByteWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Object kinds. Overwrites produce block objects, appends produce append objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Block,
    Append,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Block => "block",
            ObjectKind::Append => "append",
        }
    }

    /// The kind a write with the given intent produces and requires
    pub fn for_write(append: bool) -> Self {
        if append {
            ObjectKind::Append
        } else {
            ObjectKind::Block
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} blob", self.as_str())
    }
}

/// Handle on a container, obtained from [`BlobBackend::open_container`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    name: String,
}

impl ContainerRef {
    pub(crate) fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInfo {
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperties {
    /// Full key within the container
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub kind: ObjectKind,
}

/// One row of a single-level prefix listing
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Object(ObjectProperties),
    /// Common prefix, reported with its trailing delimiter
    Prefix(String),
}

/// Container naming rules enforced by [`BlobBackend::open_container`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingRule {
    /// Any non-empty name without the delimiter
    #[default]
    Permissive,
    /// 3-63 characters of lowercase letters, digits and single hyphens,
    /// starting and ending with a letter or digit
    Azure,
}

impl NamingRule {
    pub fn check(&self, name: &str, delimiter: char) -> BackendResult<()> {
        if name.is_empty() {
            return Err(BackendError::invalid_name(name, "container name is empty"));
        }
        if name.contains(delimiter) {
            return Err(BackendError::invalid_name(
                name,
                format!("container name contains '{delimiter}'"),
            ));
        }
        match self {
            NamingRule::Permissive => Ok(()),
            NamingRule::Azure => {
                if !(3..=63).contains(&name.len()) {
                    return Err(BackendError::invalid_name(name, "length must be 3-63"));
                }
                if !name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                {
                    return Err(BackendError::invalid_name(
                        name,
                        "only lowercase letters, digits and '-' are allowed",
                    ));
                }
                if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
                    return Err(BackendError::invalid_name(name, "misplaced '-'"));
                }
                Ok(())
            }
        }
    }
}

/// Object storage with containers and flat, delimiter-structured keys
///
/// "Not found" on a lookup is an `Ok(None)`, never an error, so callers can
/// check for existence without filtering error codes.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Delimiter that simulates directories inside keys
    fn delimiter(&self) -> char;

    /// Validate a container name and produce a handle. No network access.
    fn open_container(&self, name: &str) -> BackendResult<ContainerRef>;

    async fn list_containers(&self) -> BackendResult<Vec<ContainerInfo>>;

    async fn container_properties(
        &self,
        container: &ContainerRef,
    ) -> BackendResult<Option<ContainerInfo>>;

    /// Succeeds whether or not the container already exists
    async fn create_container(&self, container: &ContainerRef) -> BackendResult<()>;

    /// Succeeds whether or not the container exists
    async fn delete_container(&self, container: &ContainerRef) -> BackendResult<()>;

    async fn stat_object(
        &self,
        container: &ContainerRef,
        key: &str,
    ) -> BackendResult<Option<ObjectProperties>>;

    /// Direct children of `prefix` (objects and common prefixes), non-recursive
    async fn list_objects(
        &self,
        container: &ContainerRef,
        prefix: &str,
    ) -> BackendResult<Vec<ListItem>>;

    async fn open_read(&self, container: &ContainerRef, key: &str) -> BackendResult<ByteReader>;

    /// The object is written when the returned writer is shut down.
    /// Fails with `KindMismatch` when an existing object has the wrong kind.
    async fn open_write(
        &self,
        container: &ContainerRef,
        key: &str,
        append: bool,
    ) -> BackendResult<ByteWriter>;

    async fn delete_object(&self, container: &ContainerRef, key: &str) -> BackendResult<()>;
}
