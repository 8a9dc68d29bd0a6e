//! Innermost layer: storage access and plain group traversal

use super::ContentManager;
use crate::error::{RepodexError, RepodexResult};
use crate::metadata::{self, MavenMetadataGenerator};
use crate::model::{
    path, ArtifactStore, EventFlag, EventMetadata, StoreKey, StoreKind, Transfer,
};
use crate::registry::StoreRegistry;
use crate::storage::ContentStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct DirectContentManager {
    storage: Arc<dyn ContentStore>,
    registry: Arc<dyn StoreRegistry>,
    generator: Arc<MavenMetadataGenerator>,
}

impl DirectContentManager {
    pub fn new(
        storage: Arc<dyn ContentStore>,
        registry: Arc<dyn StoreRegistry>,
        generator: Arc<MavenMetadataGenerator>,
    ) -> Self {
        Self {
            storage,
            registry,
            generator,
        }
    }

    async fn writable_member(&self, group: &ArtifactStore) -> RepodexResult<ArtifactStore> {
        self.registry
            .get_ordered_concrete_stores_in_group(&group.key)
            .await?
            .into_iter()
            .find(|m| m.is_hosted() && !m.is_readonly())
            .ok_or_else(|| RepodexError::NoWritableMember(group.key.clone()))
    }

    async fn retrieve_from_group(
        &self,
        group: &ArtifactStore,
        path: &str,
        event: &mut EventMetadata,
    ) -> RepodexResult<Option<Transfer>> {
        let members = self
            .registry
            .get_ordered_concrete_stores_in_group(&group.key)
            .await?;

        if metadata::is_merged_path(group.package_type(), path) {
            return match self
                .generator
                .generate_group_file_content(group, &members, path, event)
                .await
            {
                Err(e @ RepodexError::GenerationTimeout { .. }) => {
                    warn!("Serving {} in {} as missing: {}", path, group.key, e);
                    event.set(EventFlag::TransientMiss);
                    Ok(None)
                }
                other => other,
            };
        }

        for member in &members {
            match self.storage.retrieve(member, path).await {
                Ok(Some(found)) => {
                    debug!("{} in {} found in member {}", path, group.key, member.key);
                    return Ok(Some(found));
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping member {} of {}: {}", member.key, group.key, e),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ContentManager for DirectContentManager {
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
            self.storage.retrieve(store, path).await
        }
    }

    async fn store(
        &self,
        store: &ArtifactStore,
        raw: &str,
        data: &[u8],
        _event: &mut EventMetadata,
    ) -> RepodexResult<Transfer> {
        let path = path::normalize(raw);
        match &store.kind {
            StoreKind::Hosted { readonly: true } => Err(RepodexError::ReadonlyStore(store.key.clone())),
            StoreKind::Group { .. } => {
                let target = self.writable_member(store).await?;
                debug!("Storing {} for {} in member {}", path, store.key, target.key);
                self.storage.store(&target.key, path, data).await
            }
            _ => self.storage.store(&store.key, path, data).await,
        }
    }

    async fn delete(
        &self,
        store: &ArtifactStore,
        raw: &str,
        _event: &mut EventMetadata,
    ) -> RepodexResult<Vec<StoreKey>> {
        let path = path::normalize(raw);
        let mut removed = Vec::new();
        match &store.kind {
            StoreKind::Hosted { readonly: true } => {
                return Err(RepodexError::ReadonlyStore(store.key.clone()))
            }
            StoreKind::Group { .. } => {
                // Generated files live in the group itself; uploads in the writable member.
                if self.storage.delete(&store.key, path).await? {
                    removed.push(store.key.clone());
                }
                match self.writable_member(store).await {
                    Ok(member) => {
                        if self.storage.delete(&member.key, path).await? {
                            removed.push(member.key);
                        }
                    }
                    Err(RepodexError::NoWritableMember(_)) => {}
                    Err(e) => return Err(e),
                }
            }
            _ => {
                if self.storage.delete(&store.key, path).await? {
                    removed.push(store.key.clone());
                }
            }
        }
        Ok(removed)
    }
}
