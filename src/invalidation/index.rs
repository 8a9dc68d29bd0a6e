//! Keeps the content index and not-found cache in line with store changes

use super::{divergence, InvalidationListener, StoreEvent};
use crate::error::RepodexResult;
use crate::index::ContentIndexManager;
use crate::model::{ArtifactStore, ConcreteResource, StoreKey};
use crate::nfc::NotFoundCache;
use crate::registry::StoreRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ContentIndexListener {
    index: Arc<ContentIndexManager>,
    registry: Arc<dyn StoreRegistry>,
    nfc: Arc<dyn NotFoundCache>,
}

impl ContentIndexListener {
    pub fn new(
        index: Arc<ContentIndexManager>,
        registry: Arc<dyn StoreRegistry>,
        nfc: Arc<dyn NotFoundCache>,
    ) -> Self {
        Self {
            index,
            registry,
            nfc,
        }
    }

    async fn affected_group_keys(&self, key: &StoreKey) -> RepodexResult<Vec<StoreKey>> {
        Ok(self
            .registry
            .get_groups_affected_by(key)
            .await?
            .into_iter()
            .map(|g| g.key)
            .collect())
    }

    /// Concrete stores behind a member key, as currently registered
    async fn concrete_behind(&self, key: &StoreKey) -> RepodexResult<Vec<StoreKey>> {
        if !key.is_group() {
            return Ok(vec![key.clone()]);
        }
        Ok(self
            .registry
            .get_ordered_concrete_stores_in_group(key)
            .await?
            .into_iter()
            .map(|s| s.key)
            .collect())
    }

    /// Forget everything served through `group` from any of `origins`,
    /// in the group and in every group above it
    async fn clear_contributions(&self, group: &StoreKey, origins: &[StoreKey]) -> RepodexResult<usize> {
        let mut groups = vec![group.clone()];
        groups.extend(self.affected_group_keys(group).await?);

        let mut cleared = 0;
        for target in &groups {
            for origin in origins {
                cleared += self
                    .index
                    .clear_all_indexed_path_in_store_with_original(target, origin, |_| {});
            }
        }
        Ok(cleared)
    }

    fn clear_nfc(&self, keys: &[StoreKey]) {
        for key in keys {
            self.nfc.clear_missing_in(key);
        }
    }

    async fn on_removed(&self, store: &ArtifactStore) -> RepodexResult<()> {
        let in_store = self.index.clear_all_indexed_path_in_store(&store.key, |_| {});
        let from_store = self
            .index
            .clear_all_indexed_path_with_original_store(&store.key, |_| {});

        let groups = self.affected_group_keys(&store.key).await?;
        if store.is_group() {
            let origins = self.concrete_behind(&store.key).await?;
            for group in &groups {
                for origin in &origins {
                    self.index
                        .clear_all_indexed_path_in_store_with_original(group, origin, |_| {});
                }
            }
        }

        self.nfc.clear_missing_in(&store.key);
        info!(
            "{} removed from service: cleared {} own and {} referencing index entries",
            store.key, in_store, from_store
        );
        Ok(())
    }

    async fn on_enabled(&self, store: &ArtifactStore) -> RepodexResult<()> {
        // Content of the store may now win over what groups resolved to.
        let groups = self.affected_group_keys(&store.key).await?;
        for group in &groups {
            self.index.clear_all_indexed_path_in_store(group, |_| {});
        }
        self.clear_nfc(&groups);
        info!("{} enabled: reset {} groups", store.key, groups.len());
        Ok(())
    }

    async fn on_membership_changed(&self, old: &ArtifactStore, new: &ArtifactStore) -> RepodexResult<()> {
        let before = old.constituents();
        let after = new.constituents();
        let from = divergence(before, after);

        let mut origins = Vec::new();
        for member in &before[from..] {
            for origin in self.concrete_behind(member).await? {
                if !origins.contains(&origin) {
                    origins.push(origin);
                }
            }
        }

        let cleared = if origins.is_empty() {
            0
        } else {
            self.clear_contributions(&new.key, &origins).await?
        };

        let mut groups = vec![new.key.clone()];
        groups.extend(self.affected_group_keys(&new.key).await?);
        self.clear_nfc(&groups);

        info!(
            "Membership of {} changed at position {}: cleared {} index entries",
            new.key, from, cleared
        );
        Ok(())
    }

    async fn on_expired(&self, key: &StoreKey, path: &str) -> RepodexResult<()> {
        self.index.de_index_store_path(key, path);

        let mut cleared = 0;
        for group in self.affected_group_keys(key).await? {
            let points_here = self
                .index
                .get_indexed_store_key(&group, path)
                .is_some_and(|origin| &origin == key);
            if points_here && self.index.de_index_store_path(&group, path) {
                cleared += 1;
            }
        }
        self.nfc
            .clear_missing(&ConcreteResource::new(key.clone(), path));
        debug!("Expired {} in {}, cleared {} group entries", path, key, cleared);
        Ok(())
    }
}

#[async_trait]
impl InvalidationListener for ContentIndexListener {
    fn name(&self) -> &str {
        "content-index"
    }

    async fn on_event(&self, event: &StoreEvent) -> RepodexResult<()> {
        match event {
            StoreEvent::Deleted { store } => self.on_removed(store).await,
            StoreEvent::Updated { old, new } => {
                if !old.disabled && new.disabled {
                    self.on_removed(old).await
                } else if old.disabled && !new.disabled {
                    self.on_enabled(new).await
                } else if new.is_group() && old.constituents() != new.constituents() {
                    self.on_membership_changed(old, new).await
                } else {
                    Ok(())
                }
            }
            StoreEvent::ContentExpired { key, path } => self.on_expired(key, path).await,
            // The indexing layer already handled writes and deletes.
            StoreEvent::FileStored { .. } | StoreEvent::FileDeleted { .. } => Ok(()),
        }
    }
}
