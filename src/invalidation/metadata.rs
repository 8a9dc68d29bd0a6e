//! Drops merged group metadata when its inputs change

use super::{membership_changed, InvalidationListener, StoreEvent};
use crate::error::RepodexResult;
use crate::index::ContentIndexManager;
use crate::metadata::{self, MetadataCacheManager, MetadataKey};
use crate::model::{ArtifactStore, ConcreteResource, StoreKey};
use crate::nfc::NotFoundCache;
use crate::registry::StoreRegistry;
use crate::storage::{list_recursive, ContentStore};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct MetadataMergeListener {
    cache: Arc<MetadataCacheManager>,
    index: Arc<ContentIndexManager>,
    nfc: Arc<dyn NotFoundCache>,
    registry: Arc<dyn StoreRegistry>,
    storage: Arc<dyn ContentStore>,
}

impl MetadataMergeListener {
    pub fn new(
        cache: Arc<MetadataCacheManager>,
        index: Arc<ContentIndexManager>,
        nfc: Arc<dyn NotFoundCache>,
        registry: Arc<dyn StoreRegistry>,
        storage: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            cache,
            index,
            nfc,
            registry,
            storage,
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

    /// Remove one merged document of a group with its companions
    async fn clear_group_path(&self, group: &StoreKey, metadata_path: &str) {
        self.cache
            .remove(&MetadataKey::new(group.clone(), metadata_path));

        for companion in metadata::merged_companions(metadata_path) {
            if let Err(e) = self.storage.delete(group, &companion).await {
                warn!("Could not delete {} from {}: {}", companion, group, e);
            }
            self.index.de_index_store_path(group, &companion);
            self.nfc
                .clear_missing(&ConcreteResource::new(group.clone(), companion));
        }
    }

    /// Every merged document a group currently has, wherever it is recorded
    async fn merged_paths_of(&self, group: &StoreKey) -> BTreeSet<String> {
        let mut paths: BTreeSet<String> = self.cache.paths(group).into_iter().collect();

        for entry in self
            .index
            .index()
            .query(|e| e.belongs_to(group) && metadata::can_process(&e.path), usize::MAX)
        {
            paths.insert(metadata::metadata_path_for(&entry.path));
        }

        match list_recursive(self.storage.as_ref(), group, "").await {
            Ok(files) => paths.extend(
                files
                    .iter()
                    .filter(|f| metadata::can_process(f))
                    .map(|f| metadata::metadata_path_for(f)),
            ),
            Err(e) => warn!("Could not list generated files of {}: {}", group, e),
        }
        paths
    }

    /// Drop all merged metadata of `group` and of every group above it
    async fn clear_group_metadata(&self, group: &StoreKey) -> RepodexResult<()> {
        let mut groups = vec![group.clone()];
        groups.extend(self.affected_group_keys(group).await?);

        for key in &groups {
            let paths = self.merged_paths_of(key).await;
            for path in &paths {
                self.clear_group_path(key, path).await;
            }
            self.cache.remove_all(key);
            info!("Cleared {} merged metadata documents of {}", paths.len(), key);
        }
        Ok(())
    }

    async fn on_content_changed(&self, key: &StoreKey, path: &str) -> RepodexResult<()> {
        let derived = metadata::affected_metadata_paths(path);
        if derived.is_empty() || key.package_type != "maven" {
            return Ok(());
        }

        let groups = self.affected_group_keys(key).await?;

        // Only derived state is dropped; files in the member itself are user content.
        for metadata_path in &derived {
            self.cache
                .remove(&MetadataKey::new(key.clone(), metadata_path.as_str()));

            for group in &groups {
                self.clear_group_path(group, metadata_path).await;
            }
        }

        debug!(
            "{} in {} invalidated {} metadata paths across {} groups",
            path,
            key,
            derived.len(),
            groups.len()
        );
        Ok(())
    }

    async fn on_updated(&self, old: &ArtifactStore, new: &ArtifactStore) -> RepodexResult<()> {
        if !membership_changed(old, new) {
            return Ok(());
        }

        if new.is_group() {
            self.clear_group_metadata(&new.key).await
        } else {
            for group in self.affected_group_keys(&new.key).await? {
                self.clear_group_metadata(&group).await?;
            }
            Ok(())
        }
    }

    async fn on_deleted(&self, store: &ArtifactStore) -> RepodexResult<()> {
        self.cache.remove_all(&store.key);
        for group in self.affected_group_keys(&store.key).await? {
            self.clear_group_metadata(&group).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl InvalidationListener for MetadataMergeListener {
    fn name(&self) -> &str {
        "metadata-merge"
    }

    async fn on_event(&self, event: &StoreEvent) -> RepodexResult<()> {
        match event {
            StoreEvent::Deleted { store } => self.on_deleted(store).await,
            StoreEvent::Updated { old, new } => self.on_updated(old, new).await,
            StoreEvent::FileStored { key, path }
            | StoreEvent::FileDeleted { key, path }
            | StoreEvent::ContentExpired { key, path } => self.on_content_changed(key, path).await,
        }
    }
}
