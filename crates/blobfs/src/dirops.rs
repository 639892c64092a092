// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Make and remove directories on storage without directories
//!
//! A directory is either a container, a key prefix that has children, or a
//! zero-length placeholder object named `prefix/`. Creating a directory
//! writes the placeholder; removing one deletes it once nothing else shares
//! the prefix.

use crate::backend::{BlobBackend, ListItem};
use crate::error::{BackendError, Error, Result};
use crate::resolver::ResolvedLocation;
use tokio::io::AsyncWriteExt;

pub struct DirectoryMutator<'a> {
    backend: &'a dyn BlobBackend,
    bound: bool,
}

impl<'a> DirectoryMutator<'a> {
    /// `bound` is true when the connection is bound to one container
    pub fn new(backend: &'a dyn BlobBackend, bound: bool) -> Self {
        Self { backend, bound }
    }

    /// Create the directory at `location`; succeeds if it already exists
    pub async fn mkdir(&self, location: &ResolvedLocation) -> Result<()> {
        let Some(container) = location.container() else {
            return Err(Error::refused("MKDIR: directory name is required"));
        };
        let wrap = |e: BackendError| Error::from_backend(location.full_path(), e);

        if location.path().is_empty() {
            if self.bound {
                return Ok(());
            }
            self.backend
                .create_container(container)
                .await
                .map_err(wrap)?;
            let name = container.name();
            diagnostics::log_debug!("created container {name}", name: name);
            return Ok(());
        }

        let placeholder = location.path().as_prefix();
        let mut writer = self
            .backend
            .open_write(container, &placeholder, false)
            .await
            .map_err(wrap)?;
        writer
            .shutdown()
            .await
            .map_err(|e| Error::unavailable(location.full_path(), e))?;
        let name = container.name();
        diagnostics::log_debug!(
            "created placeholder {key} in {name}",
            key: placeholder,
            name: name
        );
        Ok(())
    }

    /// Remove the (empty) directory at `location`
    pub async fn rmdir(&self, location: &ResolvedLocation) -> Result<()> {
        let Some(container) = location.container() else {
            return Err(Error::refused("RMDIR: directory name is required"));
        };
        let wrap = |e: BackendError| Error::from_backend(location.full_path(), e);

        if location.path().is_empty() {
            if self.bound {
                return Err(Error::refused("RMDIR: cannot remove /"));
            }
            self.backend
                .delete_container(container)
                .await
                .map_err(wrap)?;
            let name = container.name();
            diagnostics::log_debug!("deleted container {name}", name: name);
            return Ok(());
        }

        let placeholder = location.path().as_prefix();
        let children = self
            .backend
            .list_objects(container, &placeholder)
            .await
            .map_err(wrap)?;
        let has_other = children.iter().any(|item| match item {
            ListItem::Object(properties) => properties.key != placeholder,
            ListItem::Prefix(_) => true,
        });
        if has_other {
            return Err(Error::directory_not_empty(location.full_path()));
        }

        match self.backend.delete_object(container, &placeholder).await {
            Ok(()) => Ok(()),
            Err(BackendError::NotFound(_)) => Err(Error::not_found(location.full_path())),
            Err(e) => Err(wrap(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ObjectKind;
    use crate::memory::MemoryBackend;
    use crate::resolver::PathResolver;

    fn unbound(backend: &MemoryBackend, raw: &str) -> ResolvedLocation {
        PathResolver::default()
            .resolve(backend, raw)
            .expect("resolves")
    }

    #[tokio::test]
    async fn test_container_mkdir_rmdir_idempotent() {
        let backend = MemoryBackend::new();
        let mutator = DirectoryMutator::new(&backend, false);
        let location = unbound(&backend, "newc");

        mutator.mkdir(&location).await.expect("creates");
        mutator.mkdir(&location).await.expect("already exists");
        assert_eq!(backend.container_names().await, vec!["newc".to_string()]);

        mutator.rmdir(&location).await.expect("deletes");
        mutator.rmdir(&location).await.expect("already gone");
        assert!(backend.container_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_placeholder_lifecycle() {
        let backend = MemoryBackend::new();
        let mutator = DirectoryMutator::new(&backend, false);
        mutator
            .mkdir(&unbound(&backend, "c"))
            .await
            .expect("container");

        let dir = unbound(&backend, "c/photos");
        mutator.mkdir(&dir).await.expect("creates placeholder");
        mutator.mkdir(&dir).await.expect("idempotent");
        assert_eq!(backend.object_data("c", "photos/").await, Some(Vec::new()));

        backend.put_object("c", "photos/cat.jpg", b"meow", ObjectKind::Block).await;
        let err = mutator.rmdir(&dir).await.expect_err("not empty");
        assert!(matches!(err, Error::DirectoryNotEmpty(ref p) if p == "c/photos"));

        backend.remove_object("c", "photos/cat.jpg").await;
        mutator.rmdir(&dir).await.expect("removes placeholder");
        assert_eq!(backend.object_data("c", "photos/").await, None);

        let err = mutator.rmdir(&dir).await.expect_err("already removed");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_nested_prefix_counts_as_content() {
        let backend = MemoryBackend::new();
        backend.put_object("c", "d/", b"", ObjectKind::Block).await;
        backend.put_object("c", "d/e/f", b"", ObjectKind::Block).await;
        let mutator = DirectoryMutator::new(&backend, false);
        let err = mutator
            .rmdir(&unbound(&backend, "c/d"))
            .await
            .expect_err("has a subdirectory");
        assert!(matches!(err, Error::DirectoryNotEmpty(_)));
    }

    #[tokio::test]
    async fn test_bound_root() {
        let backend = MemoryBackend::new();
        backend.put_object("c", "x", b"", ObjectKind::Block).await;
        let resolver = PathResolver::new(Some(backend.open_container("c").expect("valid")));
        let root = resolver.resolve(&backend, "/").expect("resolves");
        let mutator = DirectoryMutator::new(&backend, true);

        mutator.mkdir(&root).await.expect("root always exists");
        assert_eq!(backend.calls().create_container, 0);
        assert!(matches!(
            mutator.rmdir(&root).await,
            Err(Error::Refused(_))
        ));
    }

    #[tokio::test]
    async fn test_no_container_is_refused() {
        let backend = MemoryBackend::new();
        let mutator = DirectoryMutator::new(&backend, false);
        let root = unbound(&backend, "");
        assert!(matches!(mutator.mkdir(&root).await, Err(Error::Refused(_))));
        assert!(matches!(mutator.rmdir(&root).await, Err(Error::Refused(_))));
    }
}
