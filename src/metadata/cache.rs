//! Parsed metadata per (store, path)

use super::model::Metadata;
use crate::model::StoreKey;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    pub key: StoreKey,
    pub path: String,
}

impl MetadataKey {
    pub fn new(key: StoreKey, path: impl Into<String>) -> Self {
        Self {
            key,
            path: path.into(),
        }
    }
}

/// A parsed document and, for merged documents, where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataInfo {
    pub metadata: Metadata,
    pub merge_info: Option<String>,
}

impl MetadataInfo {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            merge_info: None,
        }
    }

    pub fn with_merge_info(mut self, merge_info: String) -> Self {
        self.merge_info = Some(merge_info);
        self
    }
}

/// Grouped by store so a whole store can be dropped at once
#[derive(Default)]
pub struct MetadataCacheManager {
    stores: DashMap<StoreKey, HashMap<String, Arc<MetadataInfo>>>,
}

impl MetadataCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &MetadataKey) -> Option<Arc<MetadataInfo>> {
        self.stores
            .get(&key.key)
            .and_then(|paths| paths.get(&key.path).cloned())
    }

    pub fn put(&self, key: MetadataKey, info: MetadataInfo) {
        self.stores
            .entry(key.key)
            .or_default()
            .insert(key.path, Arc::new(info));
    }

    pub fn remove(&self, key: &MetadataKey) -> Option<Arc<MetadataInfo>> {
        let removed = self
            .stores
            .get_mut(&key.key)
            .and_then(|mut paths| paths.remove(&key.path));
        self.stores.remove_if(&key.key, |_, paths| paths.is_empty());
        removed
    }

    /// Drop everything cached for `store`, returning the paths that were held
    pub fn remove_all(&self, store: &StoreKey) -> Vec<String> {
        let mut paths: Vec<String> = self
            .stores
            .remove(store)
            .map(|(_, paths)| paths.into_keys().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    pub fn paths(&self, store: &StoreKey) -> Vec<String> {
        let mut paths: Vec<String> = self
            .stores
            .get(store)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.stores.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
