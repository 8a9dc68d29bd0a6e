//! Content index layer
//!
//! Consults the index before touching storage, records where content was
//! found, and maintains the not-found cache for groups. An index entry that
//! no longer matches storage is dropped and the request falls through to a
//! normal walk, so a stale index costs time but never serves wrong content.

use super::ContentManager;
use crate::error::RepodexResult;
use crate::executor::WorkerPool;
use crate::index::ContentIndexManager;
use crate::metadata;
use crate::model::{
    path, ArtifactStore, ConcreteResource, EventFlag, EventMetadata, StoreKey, StoreType, Transfer,
};
use crate::nfc::NotFoundCache;
use crate::registry::StoreRegistry;
use crate::storage::ContentStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

pub struct IndexingContentManager {
    inner: Arc<dyn ContentManager>,
    index: Arc<ContentIndexManager>,
    nfc: Arc<dyn NotFoundCache>,
    registry: Arc<dyn StoreRegistry>,
    storage: Arc<dyn ContentStore>,
    writers: Arc<WorkerPool>,
    authoritative: bool,
}

impl IndexingContentManager {
    pub fn new(
        inner: Arc<dyn ContentManager>,
        index: Arc<ContentIndexManager>,
        nfc: Arc<dyn NotFoundCache>,
        registry: Arc<dyn StoreRegistry>,
        storage: Arc<dyn ContentStore>,
        writers: Arc<WorkerPool>,
    ) -> Self {
        Self {
            inner,
            index,
            nfc,
            registry,
            storage,
            writers,
            authoritative: false,
        }
    }

    /// Treat every store as authoritative, not only those flagged
    pub fn with_authoritative(mut self, authoritative: bool) -> Self {
        self.authoritative = authoritative;
        self
    }

    fn is_authoritative(&self, store: &ArtifactStore) -> bool {
        self.authoritative || store.authoritative_index
    }

    /// Queue an index write for `transfer` off the request path
    fn index_later(&self, transfer: Transfer, top_keys: Vec<StoreKey>) {
        let index = Arc::clone(&self.index);
        let storage = Arc::clone(&self.storage);
        let queued = self.writers.execute(async move {
            index
                .index_transfer_in(storage.as_ref(), &transfer, &top_keys)
                .await;
        });
        if !queued {
            debug!("Index writer pool overloaded, skipped an index update");
        }
    }

    /// Serve `(store, path)` from its index entry, dropping the entry if stale
    async fn from_index(
        &self,
        store: &ArtifactStore,
        path: &str,
        self_only: bool,
        event: &mut EventMetadata,
    ) -> RepodexResult<Option<Transfer>> {
        let Some(origin_key) = self.index.get_indexed_store_key(&store.key, path) else {
            return Ok(None);
        };

        if self_only && origin_key != store.key {
            debug!("Ignoring index entry {} -> {} for {}", store.key, origin_key, path);
            self.index.de_index_store_path(&store.key, path);
            return Ok(None);
        }

        let origin = if origin_key == store.key {
            Some(store.clone())
        } else {
            match self.registry.get_artifact_store(&origin_key).await {
                Ok(origin) => origin,
                Err(e) => {
                    warn!("Cannot look up indexed origin {}: {}", origin_key, e);
                    None
                }
            }
        };

        let found = match origin.as_ref().filter(|o| !o.disabled) {
            Some(origin) => {
                if origin.is_remote() {
                    trace!("Indexed origin {} is remote, retrieval may re-download", origin.key);
                }
                match self.inner.retrieve(origin, path, event).await {
                    Ok(found) => found,
                    Err(e) => {
                        warn!("Indexed origin {} failed for {}: {}", origin.key, path, e);
                        None
                    }
                }
            }
            None => None,
        };

        let origin_live = origin.as_ref().is_some_and(|o| !o.disabled);
        if found.is_none() && origin_live && self.sibling_miss(&origin_key, path).await {
            debug!(
                "{} missing in {}, keeping its populated index directory",
                path, origin_key
            );
            return Ok(None);
        }

        if found.is_none() {
            info!("Stale index entry for {} in {} (origin {})", path, store.key, origin_key);
            self.index.de_index_store_path(&store.key, path);
            if origin_key != store.key {
                self.index.de_index_store_path(&origin_key, path);
            }
        }
        Ok(found)
    }

    /// Whether `path` collapses into an index directory that still holds
    /// other files in `origin`, so only this one file is missing
    async fn sibling_miss(&self, origin: &StoreKey, path: &str) -> bool {
        let indexed = self.index.get_strategy_path(origin, path);
        if !indexed.ends_with('/') || indexed == path::normalize(path) {
            return false;
        }

        match self.storage.list(origin, &indexed).await {
            Ok(children) => !children.is_empty(),
            Err(e) => {
                warn!("Cannot list {} in {}: {}", indexed, origin, e);
                false
            }
        }
    }

    async fn retrieve_concrete(
        &self,
        store: &ArtifactStore,
        path: &str,
        event: &mut EventMetadata,
    ) -> RepodexResult<Option<Transfer>> {
        if let Some(found) = self.from_index(store, path, false, event).await? {
            return Ok(Some(found));
        }

        if self.is_authoritative(store) {
            debug!("{} not indexed in authoritative store {}", path, store.key);
            return Ok(None);
        }

        let found = self.inner.retrieve(store, path, event).await?;
        if let Some(transfer) = &found {
            self.index_later(transfer.clone(), Vec::new());
        }
        Ok(found)
    }

    async fn retrieve_from_group(
        &self,
        group: &ArtifactStore,
        path: &str,
        event: &mut EventMetadata,
    ) -> RepodexResult<Option<Transfer>> {
        let merged = metadata::is_merged_path(group.package_type(), path);

        if let Some(found) = self.from_index(group, path, merged, event).await? {
            return Ok(Some(found));
        }

        if !merged && self.is_authoritative(group) {
            debug!("{} not indexed in authoritative group {}", path, group.key);
            return Ok(None);
        }

        let resource = ConcreteResource::new(group.key.clone(), path);
        if self.nfc.is_missing(&resource) {
            debug!("{} is known missing", resource);
            return Ok(None);
        }

        let found = if merged {
            let found = self.inner.retrieve(group, path, event).await?;
            if let Some(transfer) = &found {
                self.index_later(transfer.clone(), Vec::new());
            }
            found
        } else {
            let found = self.walk_members(group, path, event).await?;
            if let Some(transfer) = &found {
                self.index_later(transfer.clone(), vec![group.key.clone()]);
            }
            found
        };

        match &found {
            Some(_) => self.nfc.clear_missing(&resource),
            None if event.is_set(EventFlag::TransientMiss) => {
                debug!("Not caching transient miss of {}", resource)
            }
            None => self.nfc.add_missing(resource),
        }
        Ok(found)
    }

    /// First hit over the group's concrete members, each checked through the index
    async fn walk_members(
        &self,
        group: &ArtifactStore,
        path: &str,
        event: &mut EventMetadata,
    ) -> RepodexResult<Option<Transfer>> {
        let members = self
            .registry
            .get_ordered_concrete_stores_in_group(&group.key)
            .await?;

        for member in &members {
            match self.retrieve_concrete(member, path, event).await {
                Ok(Some(found)) => {
                    debug!("{} in {} resolved to {}", path, group.key, member.key);
                    return Ok(Some(found));
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping member {} of {}: {}", member.key, group.key, e),
            }
        }
        Ok(None)
    }

    /// Drop `path` from every group that can see `key`, index and NFC alike
    async fn invalidate_groups_of(&self, key: &StoreKey, path: &str) {
        let groups = match self.registry.get_groups_affected_by(key).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!("Cannot find groups containing {}: {}", key, e);
                return;
            }
        };

        let keys: Vec<StoreKey> = groups.into_iter().map(|g| g.key).collect();
        let cleared = self.index.clear_indexed_path_from(path, &keys, |_| {});
        for group in &keys {
            self.nfc
                .clear_missing(&ConcreteResource::new(group.clone(), path));
        }
        debug!(
            "Write of {} in {} cleared {} group index entries across {} groups",
            path,
            key,
            cleared,
            keys.len()
        );
    }
}

#[async_trait]
impl ContentManager for IndexingContentManager {
    async fn retrieve(
        &self,
        store: &ArtifactStore,
        raw: &str,
        event: &mut EventMetadata,
    ) -> RepodexResult<Option<Transfer>> {
        let path = path::normalize(raw);
        if store.disabled {
            debug!("{} is disabled, {} not served", store.key, path);
            return Ok(None);
        }

        if store.is_group() {
            self.retrieve_from_group(store, path, event).await
        } else {
            self.retrieve_concrete(store, path, event).await
        }
    }

    async fn store(
        &self,
        store: &ArtifactStore,
        raw: &str,
        data: &[u8],
        event: &mut EventMetadata,
    ) -> RepodexResult<Transfer> {
        let transfer = self.inner.store(store, raw, data, event).await?;

        if transfer.key.store_type == StoreType::Hosted {
            self.invalidate_groups_of(&transfer.key, &transfer.path).await;
        }

        let top_keys: Vec<StoreKey> = if store.key != transfer.key {
            vec![store.key.clone()]
        } else {
            Vec::new()
        };
        self.index
            .index_path_in_stores(&transfer.path, &transfer.key, &top_keys);
        for key in std::iter::once(&transfer.key).chain(&top_keys) {
            self.nfc
                .clear_missing(&ConcreteResource::new(key.clone(), transfer.path.clone()));
        }
        Ok(transfer)
    }

    async fn delete(
        &self,
        store: &ArtifactStore,
        raw: &str,
        event: &mut EventMetadata,
    ) -> RepodexResult<Vec<StoreKey>> {
        let removed = self.inner.delete(store, raw, event).await?;
        // Own entries only; group entries heal on their next lookup.
        self.index.de_index_store_path(&store.key, raw);
        for key in removed.iter().filter(|k| **k != store.key) {
            self.index.de_index_store_path(key, raw);
        }
        Ok(removed)
    }
}
