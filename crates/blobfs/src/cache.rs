// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Process-wide attribute cache
//!
//! Entries are keyed by connection identity plus full logical path and live
//! until they are invalidated or overwritten. Each key owns a
//! [`tokio::sync::OnceCell`], so concurrent lookups of one uncached path run a
//! single computation and share its result. A failed or cancelled
//! computation removes its empty cell and the next caller retries.
//!
//! Every invalidation advances a generation counter. Writers that gathered a
//! record before an await (a directory listing) store it with
//! [`AttributeCache::put_if_unchanged`], which refuses once an invalidation
//! has happened in between.

use crate::attributes::AttributeRecord;
use crate::error::{Error, Result};
use crate::path::BlobPath;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;

/// Identity of one connection's view of the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    pub fn new<S: Into<String>>(identity: S) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

type Slot = Arc<OnceCell<Option<AttributeRecord>>>;
type SlotKey = (ConnectionKey, String);

/// Counter snapshot for monitoring and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub invalidations: u64,
    /// Computations actually run; at most one per miss burst
    pub computations: u64,
}

#[derive(Debug, Default)]
pub struct AttributeCache {
    slots: Mutex<HashMap<SlotKey, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    invalidations: AtomicU64,
    computations: AtomicU64,
    // Only advanced while the slot map is locked
    generation: AtomicU64,
}

/// Removes a slot whose computation ended without a value
struct PendingSlot<'a> {
    cache: &'a AttributeCache,
    key: &'a SlotKey,
    slot: &'a Slot,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if self.slot.initialized() {
            return;
        }
        let mut slots = self.cache.slots();
        let current = slots
            .get(self.key)
            .is_some_and(|slot| Arc::ptr_eq(slot, self.slot));
        if current && !self.slot.initialized() {
            _ = slots.remove(self.key);
        }
    }
}

impl AttributeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // The map lock is never held across an await.
    fn slots(&self) -> MutexGuard<'_, HashMap<SlotKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(conn: &ConnectionKey, path: &BlobPath) -> SlotKey {
        (conn.clone(), path.with_delimiter('/').to_string())
    }

    /// Return the cached record for `path`, running `compute` on a miss
    ///
    /// `Ok(None)` (the path does not exist) is cached like any other result.
    pub async fn get_or_compute<F, Fut>(
        &self,
        conn: &ConnectionKey,
        path: &BlobPath,
        compute: F,
    ) -> Result<Option<AttributeRecord>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<AttributeRecord>>>,
    {
        let key = Self::key(conn, path);
        let slot = {
            let mut slots = self.slots();
            slots.entry(key.clone()).or_default().clone()
        };

        if let Some(record) = slot.get() {
            _ = self.hits.fetch_add(1, Ordering::Relaxed);
            let path = &key.1;
            diagnostics::log_debug!("attribute cache HIT for {path}", path: path);
            return Ok(record.clone());
        }

        _ = self.misses.fetch_add(1, Ordering::Relaxed);
        let path = &key.1;
        diagnostics::log_debug!("attribute cache MISS for {path}", path: path);

        let _pending = PendingSlot {
            cache: self,
            key: &key,
            slot: &slot,
        };
        let record = slot
            .get_or_try_init(|| async {
                _ = self.computations.fetch_add(1, Ordering::Relaxed);
                let record = compute().await?;
                _ = self.inserts.fetch_add(1, Ordering::Relaxed);
                Ok::<_, Error>(record)
            })
            .await?;
        Ok(record.clone())
    }

    /// Store `record` for `path`, replacing any earlier entry
    pub fn put(&self, conn: &ConnectionKey, path: &BlobPath, record: AttributeRecord) {
        let slot = Arc::new(OnceCell::new_with(Some(Some(record))));
        _ = self.slots().insert(Self::key(conn, path), slot);
        _ = self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Current invalidation generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store `record` only if no invalidation happened since `seen` was read
    /// from [`AttributeCache::generation`]
    pub fn put_if_unchanged(
        &self,
        conn: &ConnectionKey,
        path: &BlobPath,
        record: AttributeRecord,
        seen: u64,
    ) -> bool {
        let mut slots = self.slots();
        if self.generation.load(Ordering::Acquire) != seen {
            let path = path.to_string();
            diagnostics::log_debug!("attribute cache skipped stale record for {path}", path: path);
            return false;
        }
        let slot = Arc::new(OnceCell::new_with(Some(Some(record))));
        _ = slots.insert(Self::key(conn, path), slot);
        _ = self.inserts.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Drop the entry for `path`; a no-op when nothing is cached
    pub fn invalidate(&self, conn: &ConnectionKey, path: &BlobPath) {
        let key = Self::key(conn, path);
        let mut slots = self.slots();
        _ = self.generation.fetch_add(1, Ordering::AcqRel);
        if slots.remove(&key).is_some() {
            _ = self.invalidations.fetch_add(1, Ordering::Relaxed);
            let path = &key.1;
            diagnostics::log_debug!("attribute cache invalidated {path}", path: path);
        }
    }

    /// Drop the entry for `path` and every entry beneath it
    pub fn invalidate_prefix(&self, conn: &ConnectionKey, path: &BlobPath) {
        let base = path.with_delimiter('/');
        let exact = base.to_string();
        let nested = base.as_prefix();
        let mut slots = self.slots();
        _ = self.generation.fetch_add(1, Ordering::AcqRel);
        let before = slots.len();
        slots.retain(|(c, p), _| {
            c != conn || !(exact.is_empty() || *p == exact || p.starts_with(&nested))
        });
        let removed = (before - slots.len()) as u64;
        if removed > 0 {
            _ = self.invalidations.fetch_add(removed, Ordering::Relaxed);
            diagnostics::log_debug!(
                "attribute cache invalidated {count} entries under {path}",
                count: removed,
                path: exact
            );
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
        }
    }

    /// Number of keys, including ones whose computation is still in flight
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An [`AttributeCache`] seen through one connection
#[derive(Debug, Clone)]
pub struct ConnectionCache {
    cache: Arc<AttributeCache>,
    key: ConnectionKey,
}

impl ConnectionCache {
    pub fn new(cache: Arc<AttributeCache>, key: ConnectionKey) -> Self {
        Self { cache, key }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    pub async fn get_or_compute<F, Fut>(
        &self,
        path: &BlobPath,
        compute: F,
    ) -> Result<Option<AttributeRecord>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<AttributeRecord>>>,
    {
        self.cache.get_or_compute(&self.key, path, compute).await
    }

    pub fn put(&self, path: &BlobPath, record: AttributeRecord) {
        self.cache.put(&self.key, path, record);
    }

    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    pub fn put_if_unchanged(&self, path: &BlobPath, record: AttributeRecord, seen: u64) -> bool {
        self.cache.put_if_unchanged(&self.key, path, record, seen)
    }

    pub fn invalidate(&self, path: &BlobPath) {
        self.cache.invalidate(&self.key, path);
    }

    pub fn invalidate_prefix(&self, path: &BlobPath) {
        self.cache.invalidate_prefix(&self.key, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn conn(name: &str) -> ConnectionKey {
        ConnectionKey::new(name)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight() {
        let cache = AttributeCache::shared();
        let calls = Arc::new(AtomicUsize::new(0));
        let path = BlobPath::canonical("C/a.txt");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let calls = calls.clone();
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(&conn("acct"), &path, || async {
                        _ = calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(Some(AttributeRecord::root()))
                    })
                    .await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.expect("task").expect("compute"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.stats().computations, 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = AttributeCache::new();
        let path = BlobPath::canonical("C/x");

        let result = cache
            .get_or_compute(&conn("a"), &path, || async {
                Err(Error::unavailable("C/x", "timeout"))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty());

        let result = cache
            .get_or_compute(&conn("a"), &path, || async { Ok(None) })
            .await
            .expect("second attempt computes");
        assert!(result.is_none());
        assert_eq!(cache.stats().computations, 2);

        // Absence is cached
        let result = cache
            .get_or_compute(&conn("a"), &path, || async {
                Ok(Some(AttributeRecord::root()))
            })
            .await
            .expect("cached");
        assert!(result.is_none());
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_invalidate_and_put() {
        let cache = AttributeCache::new();
        let path = BlobPath::canonical("C/x");

        cache.invalidate(&conn("a"), &path);
        assert_eq!(cache.stats().invalidations, 0);

        cache.put(&conn("a"), &path, AttributeRecord::root());
        let hit = cache
            .get_or_compute(&conn("a"), &path, || async { Ok(None) })
            .await
            .expect("hit");
        assert!(hit.is_some());

        cache.invalidate(&conn("a"), &path);
        assert_eq!(cache.stats().invalidations, 1);
        let miss = cache
            .get_or_compute(&conn("a"), &path, || async { Ok(None) })
            .await
            .expect("recomputed");
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_compute_leaves_no_slot() {
        let cache = AttributeCache::new();
        let path = BlobPath::canonical("C/slow");

        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            cache.get_or_compute(&conn("a"), &path, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(None)
            }),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(cache.is_empty());

        let record = cache
            .get_or_compute(&conn("a"), &path, || async {
                Ok(Some(AttributeRecord::root()))
            })
            .await
            .expect("recomputed");
        assert!(record.is_some());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_put_if_unchanged_refuses_after_invalidation() {
        let cache = AttributeCache::new();
        let path = BlobPath::canonical("C/a.txt");

        let seen = cache.generation();
        assert!(cache.put_if_unchanged(&conn("a"), &path, AttributeRecord::root(), seen));

        let seen = cache.generation();
        // A write lands between reading the listing and storing it
        cache.invalidate(&conn("a"), &path);
        assert!(!cache.put_if_unchanged(&conn("a"), &path, AttributeRecord::root(), seen));
        assert!(cache.is_empty());

        // Invalidating an uncached path still advances the generation
        let seen = cache.generation();
        cache.invalidate_prefix(&conn("a"), &BlobPath::canonical("C/other"));
        assert_ne!(cache.generation(), seen);
        assert!(!cache.put_if_unchanged(&conn("a"), &path, AttributeRecord::root(), seen));
    }

    #[tokio::test]
    async fn test_invalidate_prefix() {
        let cache = AttributeCache::new();
        for p in ["C/d", "C/d/x", "C/d/y/z", "C/dd", "D/d"] {
            cache.put(&conn("a"), &BlobPath::canonical(p), AttributeRecord::root());
        }
        cache.put(&conn("b"), &BlobPath::canonical("C/d/x"), AttributeRecord::root());

        cache.invalidate_prefix(&conn("a"), &BlobPath::canonical("C/d"));
        assert_eq!(cache.stats().invalidations, 3);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_connections_are_isolated() {
        let cache = AttributeCache::new();
        let path = BlobPath::canonical("C/x");
        cache.put(&conn("a"), &path, AttributeRecord::root());

        let other = cache
            .get_or_compute(&conn("b"), &path, || async { Ok(None) })
            .await
            .expect("computed");
        assert!(other.is_none());
    }
}
