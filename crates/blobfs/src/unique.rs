// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Collision-free object names for uploads
//!
//! `report.txt` becomes `report.1.txt`, `report.2.txt`, ... until a free name
//! is found. The search is sequential and unbounded.

use crate::backend::{BlobBackend, ContainerRef, ObjectKind, ObjectProperties};
use crate::error::{BackendError, BackendResult};
use crate::path::BlobPath;

/// Split a file name into base and extension
///
/// The extension is the text after the last '.', including the '.', and is
/// empty when the name has no '.' or ends with one.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() => name.split_at(dot),
        _ => (name, ""),
    }
}

/// `path` with its last segment numbered `n`
pub fn numbered_variant(path: &BlobPath, n: u64) -> BlobPath {
    let (base, ext) = split_extension(path.name());
    path.parent().child(&format!("{base}.{n}{ext}"))
}

/// Check that a write with the given intent may target `key`
///
/// Returns the existing object, if any. A target of the other kind fails with
/// [`BackendError::KindMismatch`].
pub async fn check_write_kind(
    backend: &dyn BlobBackend,
    container: &ContainerRef,
    key: &str,
    append: bool,
) -> BackendResult<Option<ObjectProperties>> {
    let required = ObjectKind::for_write(append);
    match backend.stat_object(container, key).await? {
        Some(existing) if existing.kind != required => Err(BackendError::KindMismatch {
            key: key.to_string(),
            required,
        }),
        existing => Ok(existing),
    }
}

/// Lowest-numbered variant of `path` with no object behind it
pub async fn next_free_variant(
    backend: &dyn BlobBackend,
    container: &ContainerRef,
    path: &BlobPath,
) -> BackendResult<BlobPath> {
    let mut n = 1;
    loop {
        let candidate = numbered_variant(path, n);
        if backend
            .stat_object(container, &candidate.to_string())
            .await?
            .is_none()
        {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// `path` itself if free, otherwise its lowest free numbered variant
pub async fn make_unique(
    backend: &dyn BlobBackend,
    container: &ContainerRef,
    path: &BlobPath,
) -> BackendResult<BlobPath> {
    if backend
        .stat_object(container, &path.to_string())
        .await?
        .is_none()
    {
        return Ok(path.clone());
    }
    let unique = next_free_variant(backend, container, path).await?;
    let requested = path.to_string();
    let chosen = unique.to_string();
    diagnostics::log_debug!(
        "{requested} exists, using {chosen}",
        requested: requested,
        chosen: chosen
    );
    Ok(unique)
}
