// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! [`BlobBackend`] over any [`ObjectStore`]
//!
//! Containers are the top-level prefixes of the store. Bookkeeping lives in
//! reserved names that never appear in listings:
//!
//! - `<container>/.blobfs-container` marks a container created through this adapter
//! - `<container>/<dir>/.blobfs-dir` stands for the placeholder key `<dir>/`
//! - `<container>/.blobfs-append/<key>` marks `<key>` as an append object
//!
//! Keys are mapped segment by segment onto [`object_store::path::Path`]. A
//! segment that the store would percent-encode is rejected as an invalid name,
//! and stored names in encoded form are left out of listings, so every name
//! this backend reports can be addressed again.

use crate::async_helpers::BufferedWriter;
use crate::backend::{
    BlobBackend, ByteReader, ByteWriter, ContainerInfo, ContainerRef, ListItem, NamingRule,
    ObjectKind, ObjectProperties,
};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::path::{Path as ObjectPath, PathPart};
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use std::io;
use std::sync::Arc;

const DELIMITER: char = '/';
const RESERVED: &str = ".blobfs-";
const CONTAINER_MARKER: &str = ".blobfs-container";
const DIR_MARKER: &str = ".blobfs-dir";
const APPEND_MARKERS: &str = ".blobfs-append";

fn map_error(err: object_store::Error) -> BackendError {
    match err {
        object_store::Error::NotFound { path, .. } => BackendError::NotFound(path),
        other => BackendError::unavailable(other),
    }
}

fn io_error(err: object_store::Error) -> io::Error {
    match err {
        object_store::Error::NotFound { path, .. } => io::Error::new(io::ErrorKind::NotFound, path),
        other => io::Error::other(other),
    }
}

/// Treat "not found" as `None`
fn found<T>(result: object_store::Result<T>) -> BackendResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(object_store::Error::NotFound { .. }) => Ok(None),
        Err(e) => Err(map_error(e)),
    }
}

/// True when the store keeps `segment` as is instead of encoding it
fn plain_segment(segment: &str) -> bool {
    PathPart::from(segment).as_ref() == segment
}

/// Split a key into its segments; a trailing delimiter marks a placeholder
fn key_segments(key: &str) -> BackendResult<(Vec<&str>, bool)> {
    let (body, placeholder) = match key.strip_suffix(DELIMITER) {
        Some(body) => (body, true),
        None => (key, false),
    };
    if body.is_empty() {
        return Err(BackendError::invalid_name(key, "empty key"));
    }
    let segments: Vec<&str> = body.split(DELIMITER).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(BackendError::invalid_name(key, "empty path segment"));
    }
    if segments.iter().any(|s| s.starts_with(RESERVED)) {
        return Err(BackendError::invalid_name(key, "reserved name"));
    }
    if !segments.iter().all(|s| plain_segment(s)) {
        return Err(BackendError::invalid_name(
            key,
            "contains characters the object store does not support",
        ));
    }
    Ok((segments, placeholder))
}

pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    naming: NamingRule,
}

impl std::fmt::Debug for ObjectStoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreBackend")
            .field("store", &self.store.to_string())
            .field("naming", &self.naming)
            .finish()
    }
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            naming: NamingRule::default(),
        }
    }

    pub fn with_naming(mut self, naming: NamingRule) -> Self {
        self.naming = naming;
        self
    }

    fn container_path(container: &str) -> ObjectPath {
        ObjectPath::from_iter([container])
    }

    fn object_path(container: &str, key: &str) -> BackendResult<ObjectPath> {
        let (segments, placeholder) = key_segments(key)?;
        let parts = std::iter::once(container)
            .chain(segments)
            .chain(placeholder.then_some(DIR_MARKER));
        Ok(ObjectPath::from_iter(parts))
    }

    fn append_marker_path(container: &str, key: &str) -> BackendResult<ObjectPath> {
        let (segments, _) = key_segments(key)?;
        Ok(ObjectPath::from_iter(
            [container, APPEND_MARKERS].into_iter().chain(segments),
        ))
    }

    /// Container-relative key of `location`, or `None` for bookkeeping objects
    fn relative_key(container_path: &ObjectPath, location: &ObjectPath) -> Option<String> {
        let parts: Vec<String> = location
            .prefix_match(container_path)?
            .map(|part| part.as_ref().to_string())
            .collect();
        let (last, parents) = parts.split_last()?;
        if !parts.iter().all(|p| plain_segment(p)) {
            return None;
        }
        if parents.iter().any(|p| p.starts_with(RESERVED)) {
            return None;
        }
        if last == DIR_MARKER {
            if parents.is_empty() {
                return None;
            }
            return Some(format!("{}{DELIMITER}", parents.join("/")));
        }
        if last.starts_with(RESERVED) {
            return None;
        }
        Some(parts.join("/"))
    }

    async fn kind_of(&self, container: &str, key: &str) -> BackendResult<ObjectKind> {
        if key.ends_with(DELIMITER) {
            return Ok(ObjectKind::Block);
        }
        let marker = Self::append_marker_path(container, key)?;
        Ok(match found(self.store.head(&marker).await)? {
            Some(_) => ObjectKind::Append,
            None => ObjectKind::Block,
        })
    }

    fn properties(key: String, meta: &ObjectMeta, kind: ObjectKind) -> ObjectProperties {
        ObjectProperties {
            key,
            size: meta.size,
            last_modified: Some(meta.last_modified),
            kind,
        }
    }

    async fn container_exists(&self, container: &str) -> BackendResult<bool> {
        let listing = self
            .store
            .list_with_delimiter(Some(&Self::container_path(container)))
            .await
            .map_err(map_error)?;
        Ok(!listing.objects.is_empty() || !listing.common_prefixes.is_empty())
    }

    async fn delete_ignoring_missing(&self, location: &ObjectPath) -> BackendResult<()> {
        found(self.store.delete(location).await).map(|_| ())
    }
}

#[async_trait]
impl BlobBackend for ObjectStoreBackend {
    fn delimiter(&self) -> char {
        DELIMITER
    }

    fn open_container(&self, name: &str) -> BackendResult<ContainerRef> {
        self.naming.check(name, DELIMITER)?;
        if name.starts_with(RESERVED) {
            return Err(BackendError::invalid_name(name, "reserved name"));
        }
        if !plain_segment(name) {
            return Err(BackendError::invalid_name(
                name,
                "contains characters the object store does not support",
            ));
        }
        Ok(ContainerRef::new(name))
    }

    async fn list_containers(&self) -> BackendResult<Vec<ContainerInfo>> {
        let listing = self
            .store
            .list_with_delimiter(None)
            .await
            .map_err(map_error)?;
        let mut containers = Vec::with_capacity(listing.common_prefixes.len());
        for prefix in listing.common_prefixes {
            let Some(name) = prefix
                .filename()
                .filter(|name| plain_segment(name))
                .map(str::to_string)
            else {
                continue;
            };
            let marker = prefix.child(CONTAINER_MARKER);
            let last_modified = found(self.store.head(&marker).await)?.map(|m| m.last_modified);
            containers.push(ContainerInfo {
                name,
                last_modified,
            });
        }
        Ok(containers)
    }

    async fn container_properties(
        &self,
        container: &ContainerRef,
    ) -> BackendResult<Option<ContainerInfo>> {
        let marker = Self::container_path(container.name()).child(CONTAINER_MARKER);
        if let Some(meta) = found(self.store.head(&marker).await)? {
            return Ok(Some(ContainerInfo {
                name: container.name().to_string(),
                last_modified: Some(meta.last_modified),
            }));
        }
        // A prefix created outside this adapter still counts
        if self.container_exists(container.name()).await? {
            return Ok(Some(ContainerInfo {
                name: container.name().to_string(),
                last_modified: None,
            }));
        }
        Ok(None)
    }

    async fn create_container(&self, container: &ContainerRef) -> BackendResult<()> {
        let marker = Self::container_path(container.name()).child(CONTAINER_MARKER);
        if found(self.store.head(&marker).await)?.is_some() {
            return Ok(());
        }
        _ = self
            .store
            .put(&marker, PutPayload::new())
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn delete_container(&self, container: &ContainerRef) -> BackendResult<()> {
        let prefix = Self::container_path(container.name());
        let locations: Vec<ObjectPath> = self
            .store
            .list(Some(&prefix))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await
            .map_err(map_error)?;
        for location in &locations {
            self.delete_ignoring_missing(location).await?;
        }
        Ok(())
    }

    async fn stat_object(
        &self,
        container: &ContainerRef,
        key: &str,
    ) -> BackendResult<Option<ObjectProperties>> {
        let location = Self::object_path(container.name(), key)?;
        let Some(meta) = found(self.store.head(&location).await)? else {
            return Ok(None);
        };
        let kind = self.kind_of(container.name(), key).await?;
        Ok(Some(Self::properties(key.to_string(), &meta, kind)))
    }

    async fn list_objects(
        &self,
        container: &ContainerRef,
        prefix: &str,
    ) -> BackendResult<Vec<ListItem>> {
        let container_path = Self::container_path(container.name());
        let dir = match prefix.rfind(DELIMITER) {
            Some(at) => &prefix[..at],
            None => "",
        };
        if !dir.split(DELIMITER).all(plain_segment) {
            return Err(BackendError::invalid_name(
                prefix,
                "contains characters the object store does not support",
            ));
        }
        let listed = ObjectPath::from_iter(
            std::iter::once(container.name()).chain(dir.split(DELIMITER).filter(|s| !s.is_empty())),
        );

        if dir.is_empty() && !self.container_exists(container.name()).await? {
            return Err(BackendError::not_found(container.name()));
        }

        let listing = self
            .store
            .list_with_delimiter(Some(&listed))
            .await
            .map_err(map_error)?;

        let mut items = Vec::new();
        for common in &listing.common_prefixes {
            if let Some(key) = Self::relative_key(&container_path, common)
                && !key.is_empty()
            {
                let key = format!("{key}{DELIMITER}");
                if key.starts_with(prefix) {
                    items.push(ListItem::Prefix(key));
                }
            }
        }
        for meta in &listing.objects {
            if let Some(key) = Self::relative_key(&container_path, &meta.location)
                && key.starts_with(prefix)
            {
                // Kinds are resolved by stat_object; listings report block
                items.push(ListItem::Object(Self::properties(
                    key,
                    meta,
                    ObjectKind::Block,
                )));
            }
        }
        Ok(items)
    }

    async fn open_read(&self, container: &ContainerRef, key: &str) -> BackendResult<ByteReader> {
        let location = Self::object_path(container.name(), key)?;
        let result = self.store.get(&location).await.map_err(map_error)?;
        let bytes = result.bytes().await.map_err(map_error)?;
        Ok(Box::pin(io::Cursor::new(bytes)))
    }

    async fn open_write(
        &self,
        container: &ContainerRef,
        key: &str,
        append: bool,
    ) -> BackendResult<ByteWriter> {
        let location = Self::object_path(container.name(), key)?;
        let marker = if key.ends_with(DELIMITER) {
            None
        } else {
            Some(Self::append_marker_path(container.name(), key)?)
        };
        let required = ObjectKind::for_write(append);
        if let Some(existing) = self.stat_object(container, key).await?
            && existing.kind != required
        {
            return Err(BackendError::KindMismatch {
                key: key.to_string(),
                required,
            });
        }

        let store = self.store.clone();
        Ok(Box::pin(BufferedWriter::new(move |data| async move {
            let data = if append {
                match store.get(&location).await {
                    Ok(existing) => {
                        let mut combined = existing.bytes().await.map_err(io_error)?.to_vec();
                        combined.extend_from_slice(&data);
                        combined
                    }
                    Err(object_store::Error::NotFound { .. }) => data,
                    Err(e) => return Err(io_error(e)),
                }
            } else {
                data
            };
            _ = store
                .put(&location, PutPayload::from(data))
                .await
                .map_err(io_error)?;
            let Some(marker) = marker else {
                return Ok(());
            };
            if append {
                _ = store
                    .put(&marker, PutPayload::new())
                    .await
                    .map_err(io_error)?;
            } else {
                match store.delete(&marker).await {
                    Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                    Err(e) => return Err(io_error(e)),
                }
            }
            Ok(())
        })))
    }

    async fn delete_object(&self, container: &ContainerRef, key: &str) -> BackendResult<()> {
        let location = Self::object_path(container.name(), key)?;
        if found(self.store.head(&location).await)?.is_none() {
            return Err(BackendError::not_found(key));
        }
        self.store.delete(&location).await.map_err(map_error)?;
        if !key.ends_with(DELIMITER) {
            self.delete_ignoring_missing(&Self::append_marker_path(container.name(), key)?)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_helpers::{read_all_to_vec, write_all_and_commit};
    use object_store::memory::InMemory;

    fn backend() -> ObjectStoreBackend {
        ObjectStoreBackend::new(Arc::new(InMemory::new()))
    }

    async fn write(
        backend: &ObjectStoreBackend,
        c: &ContainerRef,
        key: &str,
        data: &[u8],
        append: bool,
    ) {
        let writer = backend.open_write(c, key, append).await.expect("opens");
        write_all_and_commit(writer, data).await.expect("commits");
    }

    fn keys(items: &[ListItem]) -> Vec<String> {
        let mut keys: Vec<String> = items
            .iter()
            .map(|item| match item {
                ListItem::Object(p) => p.key.clone(),
                ListItem::Prefix(p) => p.clone(),
            })
            .collect();
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn test_containers() {
        let backend = backend();
        let c = backend.open_container("alpha").expect("valid");
        assert!(backend.container_properties(&c).await.expect("ok").is_none());

        backend.create_container(&c).await.expect("creates");
        backend.create_container(&c).await.expect("idempotent");
        let info = backend
            .container_properties(&c)
            .await
            .expect("ok")
            .expect("exists");
        assert!(info.last_modified.is_some());

        let names: Vec<String> = backend
            .list_containers()
            .await
            .expect("lists")
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["alpha".to_string()]);

        assert!(backend.list_objects(&c, "").await.expect("lists").is_empty());

        backend.delete_container(&c).await.expect("deletes");
        backend.delete_container(&c).await.expect("idempotent");
        assert!(backend.list_containers().await.expect("lists").is_empty());
        assert!(backend.open_container(".blobfs-x").is_err());
    }

    #[tokio::test]
    async fn test_placeholders_and_listing() {
        let backend = backend();
        let c = backend.open_container("c").expect("valid");
        backend.create_container(&c).await.expect("creates");

        write(&backend, &c, "folder/", b"", false).await;
        write(&backend, &c, "folder/x.txt", b"xx", false).await;
        write(&backend, &c, "folder/sub/y.txt", b"y", false).await;
        write(&backend, &c, "top.txt", b"t", false).await;

        let root = backend.list_objects(&c, "").await.expect("lists");
        assert_eq!(keys(&root), vec!["folder/", "top.txt"]);

        let folder = backend.list_objects(&c, "folder/").await.expect("lists");
        assert_eq!(keys(&folder), vec!["folder/", "folder/sub/", "folder/x.txt"]);

        let placeholder = backend
            .stat_object(&c, "folder/")
            .await
            .expect("ok")
            .expect("exists");
        assert_eq!(placeholder.size, 0);

        backend.delete_object(&c, "folder/").await.expect("deletes");
        assert!(backend.stat_object(&c, "folder/").await.expect("ok").is_none());
        assert_eq!(
            backend.delete_object(&c, "folder/").await,
            Err(BackendError::not_found("folder/"))
        );
    }

    #[tokio::test]
    async fn test_append_and_kinds() {
        let backend = backend();
        let c = backend.open_container("c").expect("valid");
        backend.create_container(&c).await.expect("creates");

        write(&backend, &c, "log", b"aabb", true).await;
        write(&backend, &c, "log", b"ccdd", true).await;
        let reader = backend.open_read(&c, "log").await.expect("opens");
        assert_eq!(read_all_to_vec(reader).await.expect("reads"), b"aabbccdd");

        let props = backend.stat_object(&c, "log").await.expect("ok").expect("exists");
        assert_eq!(props.kind, ObjectKind::Append);
        assert_eq!(props.size, 8);

        let err = backend.open_write(&c, "log", false).await.err().expect("mismatch");
        assert!(matches!(err, BackendError::KindMismatch { required: ObjectKind::Block, .. }));

        // Markers stay out of listings
        assert_eq!(keys(&backend.list_objects(&c, "").await.expect("lists")), vec!["log"]);

        backend.delete_object(&c, "log").await.expect("deletes");
        write(&backend, &c, "log", b"fresh", false).await;
        let props = backend.stat_object(&c, "log").await.expect("ok").expect("exists");
        assert_eq!(props.kind, ObjectKind::Block);
    }

    #[tokio::test]
    async fn test_invalid_keys() {
        let backend = backend();
        let c = backend.open_container("c").expect("valid");
        assert!(matches!(
            backend.stat_object(&c, "a//b").await,
            Err(BackendError::InvalidName { .. })
        ));
        assert!(backend.stat_object(&c, ".blobfs-dir").await.is_err());
        assert!(matches!(
            backend.list_objects(&c, "").await,
            Err(BackendError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_encoded_names_are_refused() {
        let store = Arc::new(InMemory::new());
        let backend = ObjectStoreBackend::new(store.clone());
        let c = backend.open_container("c").expect("valid");

        for key in ["my#dir/report.txt", "report[1].txt", "100%", "a~b", "x|y", "..", "a/./b"] {
            assert!(
                matches!(
                    backend.open_write(&c, key, false).await,
                    Err(BackendError::InvalidName { .. })
                ),
                "{key} should be refused"
            );
        }
        assert!(matches!(
            backend.list_objects(&c, "my#dir/").await,
            Err(BackendError::InvalidName { .. })
        ));
        assert!(backend.open_container("my#container").is_err());

        // Written by another tool straight into the store
        let foreign = ObjectPath::from_iter(["c", "odd#name.txt"]);
        _ = store
            .put(&foreign, PutPayload::from_static(b"x"))
            .await
            .expect("stores");
        write(&backend, &c, "plain_name-1.txt", b"ok", false).await;
        assert_eq!(
            keys(&backend.list_objects(&c, "").await.expect("lists")),
            vec!["plain_name-1.txt"]
        );
    }
}
