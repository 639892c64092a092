// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! In-process object storage
//!
//! Implements the whole [`BlobBackend`] contract (containers, block and append
//! objects, single-level prefix listing) over ordered maps. Every trait call
//! is counted so tests can observe how many round trips an operation costs.

use crate::async_helpers::BufferedWriter;
use crate::backend::{
    BlobBackend, ByteReader, ByteWriter, ContainerInfo, ContainerRef, ListItem, NamingRule,
    ObjectKind, ObjectProperties,
};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Vec<u8>,
    kind: ObjectKind,
    modified: DateTime<Utc>,
}

#[derive(Debug)]
struct MemoryContainer {
    created: DateTime<Utc>,
    objects: BTreeMap<String, MemoryObject>,
}

impl MemoryContainer {
    fn new() -> Self {
        Self {
            created: Utc::now(),
            objects: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeMap<String, MemoryContainer>,
}

impl State {
    fn properties(key: &str, object: &MemoryObject) -> ObjectProperties {
        ObjectProperties {
            key: key.to_string(),
            size: object.data.len() as u64,
            last_modified: Some(object.modified),
            kind: object.kind,
        }
    }

    fn list(&self, container: &str, prefix: &str, delimiter: char) -> BackendResult<Vec<ListItem>> {
        let objects = &self
            .containers
            .get(container)
            .ok_or_else(|| BackendError::not_found(container))?
            .objects;

        let mut items = Vec::new();
        let mut last_prefix: Option<String> = None;
        for (key, object) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            match rest.find(delimiter) {
                Some(at) => {
                    let common = format!("{prefix}{}", &rest[..at + delimiter.len_utf8()]);
                    if last_prefix.as_deref() != Some(common.as_str()) {
                        items.push(ListItem::Prefix(common.clone()));
                        last_prefix = Some(common);
                    }
                }
                None => items.push(ListItem::Object(Self::properties(key, object))),
            }
        }
        Ok(items)
    }

    fn commit(&mut self, container: &str, key: &str, data: Vec<u8>, append: bool) -> io::Result<()> {
        let objects = &mut self
            .containers
            .get_mut(container)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, container.to_string()))?
            .objects;

        let kind = ObjectKind::for_write(append);
        let now = Utc::now();
        match objects.get_mut(key) {
            Some(existing) if existing.kind != kind => Err(io::Error::other(format!(
                "{key} changed kind while being written"
            ))),
            Some(existing) if append => {
                existing.data.extend_from_slice(&data);
                existing.modified = now;
                Ok(())
            }
            _ => {
                _ = objects.insert(
                    key.to_string(),
                    MemoryObject {
                        data,
                        kind,
                        modified: now,
                    },
                );
                Ok(())
            }
        }
    }
}

/// Number of calls made to each [`BlobBackend`] method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_containers: u64,
    pub container_properties: u64,
    pub create_container: u64,
    pub delete_container: u64,
    pub stat_object: u64,
    pub list_objects: u64,
    pub open_read: u64,
    pub open_write: u64,
    pub delete_object: u64,
}

#[derive(Debug, Default)]
struct CallCounters {
    list_containers: AtomicU64,
    container_properties: AtomicU64,
    create_container: AtomicU64,
    delete_container: AtomicU64,
    stat_object: AtomicU64,
    list_objects: AtomicU64,
    open_read: AtomicU64,
    open_write: AtomicU64,
    delete_object: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    _ = counter.fetch_add(1, Ordering::Relaxed);
}

/// In-memory [`BlobBackend`]. Clones share the same storage.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    naming: NamingRule,
    delimiter: char,
    latency: Option<Duration>,
    offline: Arc<AtomicBool>,
    calls: Arc<CallCounters>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            naming: NamingRule::default(),
            delimiter: '/',
            latency: None,
            offline: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(CallCounters::default()),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_naming(naming: NamingRule) -> Self {
        Self {
            naming,
            ..Self::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Delay every lookup and listing by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// While offline, every call fails with [`BackendError::Unavailable`]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.calls;
        CallCounts {
            list_containers: c.list_containers.load(Ordering::Relaxed),
            container_properties: c.container_properties.load(Ordering::Relaxed),
            create_container: c.create_container.load(Ordering::Relaxed),
            delete_container: c.delete_container.load(Ordering::Relaxed),
            stat_object: c.stat_object.load(Ordering::Relaxed),
            list_objects: c.list_objects.load(Ordering::Relaxed),
            open_read: c.open_read.load(Ordering::Relaxed),
            open_write: c.open_write.load(Ordering::Relaxed),
            delete_object: c.delete_object.load(Ordering::Relaxed),
        }
    }

    /// Store an object directly, creating the container if needed
    pub async fn put_object(&self, container: &str, key: &str, data: &[u8], kind: ObjectKind) {
        let mut state = self.state.lock().await;
        let entry = state
            .containers
            .entry(container.to_string())
            .or_insert_with(MemoryContainer::new);
        _ = entry.objects.insert(
            key.to_string(),
            MemoryObject {
                data: data.to_vec(),
                kind,
                modified: Utc::now(),
            },
        );
    }

    pub async fn object_data(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().await;
        state
            .containers
            .get(container)
            .and_then(|c| c.objects.get(key))
            .map(|o| o.data.clone())
    }

    pub async fn object_kind(&self, container: &str, key: &str) -> Option<ObjectKind> {
        let state = self.state.lock().await;
        state
            .containers
            .get(container)
            .and_then(|c| c.objects.get(key))
            .map(|o| o.kind)
    }

    pub async fn remove_object(&self, container: &str, key: &str) {
        let mut state = self.state.lock().await;
        if let Some(c) = state.containers.get_mut(container) {
            _ = c.objects.remove(key);
        }
    }

    pub async fn container_names(&self) -> Vec<String> {
        self.state.lock().await.containers.keys().cloned().collect()
    }

    async fn enter(&self, counter: &AtomicU64) -> BackendResult<()> {
        bump(counter);
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::unavailable("memory backend is offline"));
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobBackend for MemoryBackend {
    fn delimiter(&self) -> char {
        self.delimiter
    }

    fn open_container(&self, name: &str) -> BackendResult<ContainerRef> {
        self.naming.check(name, self.delimiter)?;
        Ok(ContainerRef::new(name))
    }

    async fn list_containers(&self) -> BackendResult<Vec<ContainerInfo>> {
        self.enter(&self.calls.list_containers).await?;
        let state = self.state.lock().await;
        Ok(state
            .containers
            .iter()
            .map(|(name, c)| ContainerInfo {
                name: name.clone(),
                last_modified: Some(c.created),
            })
            .collect())
    }

    async fn container_properties(
        &self,
        container: &ContainerRef,
    ) -> BackendResult<Option<ContainerInfo>> {
        self.enter(&self.calls.container_properties).await?;
        let state = self.state.lock().await;
        Ok(state.containers.get(container.name()).map(|c| ContainerInfo {
            name: container.name().to_string(),
            last_modified: Some(c.created),
        }))
    }

    async fn create_container(&self, container: &ContainerRef) -> BackendResult<()> {
        self.enter(&self.calls.create_container).await?;
        let mut state = self.state.lock().await;
        _ = state
            .containers
            .entry(container.name().to_string())
            .or_insert_with(MemoryContainer::new);
        Ok(())
    }

    async fn delete_container(&self, container: &ContainerRef) -> BackendResult<()> {
        self.enter(&self.calls.delete_container).await?;
        _ = self.state.lock().await.containers.remove(container.name());
        Ok(())
    }

    async fn stat_object(
        &self,
        container: &ContainerRef,
        key: &str,
    ) -> BackendResult<Option<ObjectProperties>> {
        self.enter(&self.calls.stat_object).await?;
        let state = self.state.lock().await;
        Ok(state
            .containers
            .get(container.name())
            .and_then(|c| c.objects.get(key))
            .map(|o| State::properties(key, o)))
    }

    async fn list_objects(
        &self,
        container: &ContainerRef,
        prefix: &str,
    ) -> BackendResult<Vec<ListItem>> {
        self.enter(&self.calls.list_objects).await?;
        self.state
            .lock()
            .await
            .list(container.name(), prefix, self.delimiter)
    }

    async fn open_read(&self, container: &ContainerRef, key: &str) -> BackendResult<ByteReader> {
        self.enter(&self.calls.open_read).await?;
        let data = self
            .object_data(container.name(), key)
            .await
            .ok_or_else(|| BackendError::not_found(key))?;
        Ok(Box::pin(io::Cursor::new(data)))
    }

    async fn open_write(
        &self,
        container: &ContainerRef,
        key: &str,
        append: bool,
    ) -> BackendResult<ByteWriter> {
        self.enter(&self.calls.open_write).await?;
        {
            let state = self.state.lock().await;
            let c = state
                .containers
                .get(container.name())
                .ok_or_else(|| BackendError::not_found(container.name()))?;
            let required = ObjectKind::for_write(append);
            if let Some(existing) = c.objects.get(key)
                && existing.kind != required
            {
                return Err(BackendError::KindMismatch {
                    key: key.to_string(),
                    required,
                });
            }
        }

        let state = self.state.clone();
        let container = container.name().to_string();
        let key = key.to_string();
        Ok(Box::pin(BufferedWriter::new(move |data| async move {
            state.lock().await.commit(&container, &key, data, append)
        })))
    }

    async fn delete_object(&self, container: &ContainerRef, key: &str) -> BackendResult<()> {
        self.enter(&self.calls.delete_object).await?;
        let mut state = self.state.lock().await;
        state
            .containers
            .get_mut(container.name())
            .and_then(|c| c.objects.remove(key))
            .map(|_| ())
            .ok_or_else(|| BackendError::not_found(key))
    }
}
