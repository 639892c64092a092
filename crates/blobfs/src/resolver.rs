// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Turning caller paths into (container, key path) pairs
//!
//! A connection is either bound to one container, in which case every caller
//! path lives inside it, or unbound, in which case the first segment of the
//! caller path names the container. Either way the *full logical path* of a
//! location starts with the container name, so cache keys agree between modes.

use crate::backend::{BlobBackend, ContainerRef};
use crate::error::{Error, Result};
use crate::path::{BlobPath, CANONICAL_DELIMITER};

/// Where a caller path points, resolved against one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    container: Option<ContainerRef>,
    path: BlobPath,
    prefix_width: usize,
    full_path: BlobPath,
}

impl ResolvedLocation {
    /// `None` for the account root of an unbound connection
    pub fn container(&self) -> Option<&ContainerRef> {
        self.container.as_ref()
    }

    /// Path inside the container, using the backend delimiter
    pub fn path(&self) -> &BlobPath {
        &self.path
    }

    /// Object key for [`Self::path`]
    pub fn key(&self) -> String {
        self.path.to_string()
    }

    /// Number of leading segments of the full path the caller did not type
    pub fn prefix_width(&self) -> usize {
        self.prefix_width
    }

    /// Canonical path including the container name; used for cache keys
    pub fn full_path(&self) -> &BlobPath {
        &self.full_path
    }

    /// The path as the caller sees it
    pub fn display_base(&self) -> BlobPath {
        self.full_path.chroot(self.prefix_width)
    }

    /// The same location with its last segment replaced by `name`
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            container: self.container.clone(),
            path: self.path.parent().child(name),
            prefix_width: self.prefix_width,
            full_path: self.full_path.parent().child(name),
        }
    }
}

/// Resolves caller paths for one connection
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    bound: Option<ContainerRef>,
}

impl PathResolver {
    pub fn new(bound: Option<ContainerRef>) -> Self {
        Self { bound }
    }

    pub fn bound(&self) -> Option<&ContainerRef> {
        self.bound.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Resolve `raw`. Fails only when the backend rejects the container name.
    pub fn resolve(&self, backend: &dyn BlobBackend, raw: &str) -> Result<ResolvedLocation> {
        let raw = normalize_current_dir(raw);
        let full_path = BlobPath::parse(raw, CANONICAL_DELIMITER);
        let path = full_path.with_delimiter(backend.delimiter());

        if let Some(bound) = &self.bound {
            return Ok(ResolvedLocation {
                container: Some(bound.clone()),
                path,
                prefix_width: 1,
                full_path: BlobPath::canonical(bound.name()).join(&full_path),
            });
        }

        match full_path.node(0) {
            None => Ok(ResolvedLocation {
                container: None,
                path,
                prefix_width: 0,
                full_path,
            }),
            Some(name) => {
                let container = backend
                    .open_container(name)
                    .map_err(|e| Error::from_backend(raw, e))?;
                Ok(ResolvedLocation {
                    container: Some(container),
                    path: path.chroot(1),
                    prefix_width: 0,
                    full_path,
                })
            }
        }
    }
}

/// A bare "." means the connection root
fn normalize_current_dir(raw: &str) -> &str {
    if raw.trim() == "." { "" } else { raw }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::NamingRule;

    #[test]
    fn test_bound_resolution() {
        let backend = MemoryBackend::new();
        let container = backend.open_container("C").expect("valid name");
        let resolver = PathResolver::new(Some(container.clone()));

        let location = resolver.resolve(&backend, "a/b").expect("resolves");
        assert_eq!(location.container(), Some(&container));
        assert_eq!(location.key(), "a/b");
        assert_eq!(location.prefix_width(), 1);
        assert_eq!(location.full_path().to_string(), "C/a/b");
        assert_eq!(location.display_base().to_string(), "a/b");
    }

    #[test]
    fn test_unbound_resolution() {
        let backend = MemoryBackend::new();
        let resolver = PathResolver::default();

        let location = resolver.resolve(&backend, "C/a/b").expect("resolves");
        assert_eq!(location.container().map(ContainerRef::name), Some("C"));
        assert_eq!(location.key(), "a/b");
        assert_eq!(location.prefix_width(), 0);
        assert_eq!(location.full_path().to_string(), "C/a/b");
        assert_eq!(location.display_base().to_string(), "C/a/b");
    }

    #[test]
    fn test_full_path_agrees_between_modes() {
        let backend = MemoryBackend::new();
        let bound = PathResolver::new(Some(backend.open_container("C").expect("valid")));
        let unbound = PathResolver::default();

        let a = bound.resolve(&backend, "/a/b/").expect("resolves");
        let b = unbound.resolve(&backend, "C/a/b").expect("resolves");
        assert_eq!(a.full_path(), b.full_path());
        assert_eq!(a.path(), b.path());
    }

    #[test]
    fn test_empty_and_current_dir() {
        let backend = MemoryBackend::new();
        let unbound = PathResolver::default();
        for raw in ["", ".", "/"] {
            let location = unbound.resolve(&backend, raw).expect("resolves");
            assert!(location.container().is_none());
            assert!(location.full_path().is_empty());
        }

        let bound = PathResolver::new(Some(backend.open_container("C").expect("valid")));
        let location = bound.resolve(&backend, ".").expect("resolves");
        assert!(location.path().is_empty());
        assert_eq!(location.full_path().to_string(), "C");
        assert!(location.display_base().is_empty());
    }

    #[test]
    fn test_rejected_container_name() {
        let backend = MemoryBackend::with_naming(NamingRule::Azure);
        let result = PathResolver::default().resolve(&backend, "Bad_Name/file");
        assert!(matches!(result, Err(Error::InvalidPath { .. })));
    }

    #[test]
    fn test_backend_delimiter_encoding() {
        let backend = MemoryBackend::new().with_delimiter('|');
        let location = PathResolver::default()
            .resolve(&backend, "C/x/y.txt")
            .expect("resolves");
        assert_eq!(location.key(), "x|y.txt");
        assert_eq!(location.full_path().to_string(), "C/x/y.txt");
        assert_eq!(location.renamed("z.txt").key(), "x|z.txt");
    }
}
