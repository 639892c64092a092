// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! File attributes synthesized from container and object properties
//!
//! The backend keeps a single timestamp per entity, so creation, access and
//! modification times all report it. Attributes are read-only.

use crate::backend::{BlobBackend, ContainerInfo, ObjectProperties};
use crate::error::{BackendError, Error, Result};
use crate::resolver::ResolvedLocation;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Directory,
    RegularFile,
}

/// Backend entity an [`AttributeRecord`] was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSource {
    /// The account root of an unbound connection; has no backend entity
    Root,
    /// A container, or a virtual directory approximated by its container
    Container,
    Blob,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRecord {
    kind: AttributeKind,
    source: AttributeSource,
    size: u64,
    modified: DateTime<Utc>,
}

impl AttributeRecord {
    pub fn root() -> Self {
        Self {
            kind: AttributeKind::Directory,
            source: AttributeSource::Root,
            size: 0,
            modified: Utc::now(),
        }
    }

    /// Containers (and virtual directories standing in for them) have size 0.
    /// A container without a reported timestamp reports "now".
    pub fn from_container(info: &ContainerInfo) -> Self {
        Self {
            kind: AttributeKind::Directory,
            source: AttributeSource::Container,
            size: 0,
            modified: info.last_modified.unwrap_or_else(Utc::now),
        }
    }

    pub fn from_object(properties: &ObjectProperties) -> Self {
        Self {
            kind: AttributeKind::RegularFile,
            source: AttributeSource::Blob,
            size: properties.size,
            modified: properties.last_modified.unwrap_or_else(Utc::now),
        }
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn source(&self) -> AttributeSource {
        self.source
    }

    pub fn type_name(&self) -> &'static str {
        match self.source {
            AttributeSource::Root => "root",
            AttributeSource::Container => "container",
            AttributeSource::Blob => "blob",
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == AttributeKind::Directory
    }

    pub fn is_regular_file(&self) -> bool {
        self.kind == AttributeKind::RegularFile
    }

    pub fn is_symbolic_link(&self) -> bool {
        false
    }

    pub fn is_other(&self) -> bool {
        false
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn last_modified_time(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn last_access_time(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.modified
    }

    // DOS-style flags are never set on stored objects.

    pub fn is_read_only(&self) -> bool {
        false
    }

    pub fn is_hidden(&self) -> bool {
        false
    }

    pub fn is_archive(&self) -> bool {
        false
    }

    pub fn is_system(&self) -> bool {
        false
    }
}

/// Compute the attributes of `location`, or `None` if nothing is there
///
/// 1. no container: the account root
/// 2. container root: the container itself
/// 3. an object with exactly this key: a regular file
/// 4. any key under `path/`: a virtual directory, approximated by the container
pub async fn compute_attributes(
    backend: &dyn BlobBackend,
    location: &ResolvedLocation,
) -> Result<Option<AttributeRecord>> {
    let Some(container) = location.container() else {
        return Ok(Some(AttributeRecord::root()));
    };
    let wrap = |e: BackendError| Error::from_backend(location.full_path(), e);

    if location.path().is_empty() {
        let info = backend.container_properties(container).await.map_err(wrap)?;
        return Ok(info.as_ref().map(AttributeRecord::from_container));
    }

    if let Some(properties) = backend
        .stat_object(container, &location.key())
        .await
        .map_err(wrap)?
    {
        return Ok(Some(AttributeRecord::from_object(&properties)));
    }

    let children = backend
        .list_objects(container, &location.path().as_prefix())
        .await
        .map_err(wrap)?;
    if children.is_empty() {
        return Ok(None);
    }

    let info = backend
        .container_properties(container)
        .await
        .map_err(wrap)?
        .unwrap_or_else(|| ContainerInfo {
            name: container.name().to_string(),
            last_modified: None,
        });
    Ok(Some(AttributeRecord::from_container(&info)))
}
