//! In-memory content store

use super::{ContentStore, StoreResource};
use crate::error::{RepodexError, RepodexResult};
use crate::model::{path, ArtifactStore, StoreKey, Transfer};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type Files = BTreeMap<String, Arc<Vec<u8>>>;

/// Content store backed by maps, with seeded upstreams for remote stores.
///
/// Every `retrieve` call is counted per store so callers can assert how many
/// times a member was actually consulted.
#[derive(Default)]
pub struct MemoryContentStore {
    files: DashMap<StoreKey, Files>,
    upstream: DashMap<StoreKey, Files>,
    retrievals: DashMap<StoreKey, usize>,
    upstream_fetches: DashMap<StoreKey, usize>,
    latency: Option<Duration>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every remote fetch, to widen race windows in tests
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make `path` available upstream of a remote store
    pub fn seed_upstream(&self, key: &StoreKey, path: &str, data: impl Into<Vec<u8>>) {
        self.upstream
            .entry(key.clone())
            .or_default()
            .insert(path::normalize(path).to_string(), Arc::new(data.into()));
    }

    /// Number of `retrieve` calls made against `key`
    pub fn retrievals(&self, key: &StoreKey) -> usize {
        self.retrievals.get(key).map(|c| *c).unwrap_or(0)
    }

    /// Number of upstream fetches performed for `key`
    pub fn upstream_fetches(&self, key: &StoreKey) -> usize {
        self.upstream_fetches.get(key).map(|c| *c).unwrap_or(0)
    }

    fn local(&self, key: &StoreKey, path: &str) -> Option<Arc<Vec<u8>>> {
        self.files.get(key).and_then(|files| files.get(path).cloned())
    }

    fn upstream(&self, key: &StoreKey, path: &str) -> Option<Arc<Vec<u8>>> {
        self.upstream.get(key).and_then(|files| files.get(path).cloned())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn retrieve(&self, store: &ArtifactStore, path: &str) -> RepodexResult<Option<Transfer>> {
        let path = path::normalize(path);
        *self.retrievals.entry(store.key.clone()).or_insert(0) += 1;

        if self.local(&store.key, path).is_some() {
            return Ok(Some(Transfer::new(store.key.clone(), path)));
        }

        if !store.is_remote() {
            return Ok(None);
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        *self.upstream_fetches.entry(store.key.clone()).or_insert(0) += 1;

        match self.upstream(&store.key, path) {
            Some(data) => {
                debug!("Fetched {} from upstream of {}", path, store.key);
                self.files
                    .entry(store.key.clone())
                    .or_default()
                    .insert(path.to_string(), data);
                Ok(Some(Transfer::new(store.key.clone(), path)))
            }
            None => Ok(None),
        }
    }

    async fn exists(&self, transfer: &Transfer) -> RepodexResult<bool> {
        Ok(self.local(&transfer.key, &transfer.path).is_some())
    }

    async fn read(&self, transfer: &Transfer) -> RepodexResult<Vec<u8>> {
        self.local(&transfer.key, &transfer.path)
            .map(|data| data.as_ref().clone())
            .ok_or_else(|| RepodexError::PathNotFound(transfer.to_string().into()))
    }

    async fn store(&self, key: &StoreKey, path: &str, data: &[u8]) -> RepodexResult<Transfer> {
        let path = path::normalize(path);
        if path.is_empty() || path.ends_with('/') {
            return Err(RepodexError::invalid_path(path, "not a file path"));
        }

        self.files
            .entry(key.clone())
            .or_default()
            .insert(path.to_string(), Arc::new(data.to_vec()));
        Ok(Transfer::new(key.clone(), path))
    }

    async fn delete(&self, key: &StoreKey, path: &str) -> RepodexResult<bool> {
        let path = path::normalize(path);
        Ok(self
            .files
            .get_mut(key)
            .map(|mut files| files.remove(path).is_some())
            .unwrap_or(false))
    }

    async fn list(&self, key: &StoreKey, dir: &str) -> RepodexResult<Vec<StoreResource>> {
        let dir = path::normalize(dir);
        let prefix = if dir.is_empty() || dir.ends_with('/') {
            dir.to_string()
        } else {
            format!("{}/", dir)
        };

        let Some(files) = self.files.get(key) else {
            return Ok(Vec::new());
        };

        let mut children = BTreeSet::new();
        for name in files.keys().filter(|p| p.starts_with(&prefix)) {
            let rest = &name[prefix.len()..];
            let child = match rest.find('/') {
                Some(idx) => format!("{}{}", prefix, &rest[..=idx]),
                None => name.clone(),
            };
            children.insert(child);
        }

        Ok(children
            .into_iter()
            .map(|path| StoreResource { path })
            .collect())
    }
}
