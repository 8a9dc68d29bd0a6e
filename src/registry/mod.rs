//! Store definition registry
//!
//! Read/query access to repository definitions and group membership. The
//! resolution core never mutates definitions through this trait; the engine
//! performs mutations on a concrete registry after running invalidation.

mod memory;

pub use memory::MemoryStoreRegistry;

use crate::error::RepodexResult;
use crate::model::{ArtifactStore, StoreKey};
use async_trait::async_trait;

#[async_trait]
pub trait StoreRegistry: Send + Sync {
    async fn get_artifact_store(&self, key: &StoreKey) -> RepodexResult<Option<ArtifactStore>>;

    async fn get_all_stores(&self) -> RepodexResult<Vec<ArtifactStore>>;

    /// Groups listing `key` as a direct constituent
    async fn get_groups_containing(&self, key: &StoreKey) -> RepodexResult<Vec<ArtifactStore>>;

    /// Every group that reaches `key` through membership, at any depth
    async fn get_groups_affected_by(&self, key: &StoreKey) -> RepodexResult<Vec<ArtifactStore>>;

    /// Enabled concrete stores of a group in resolution order, nested groups
    /// expanded depth first and duplicates dropped
    async fn get_ordered_concrete_stores_in_group(
        &self,
        key: &StoreKey,
    ) -> RepodexResult<Vec<ArtifactStore>>;
}
