//! Content resolution pipeline
//!
//! A request for `(store, path)` flows through an ordered stack of
//! [`ContentManager`] layers built at startup. The innermost layer talks to
//! storage and walks group members; outer layers add caching behavior such
//! as the content index.

mod direct;
mod indexing;
mod pipeline;

pub use direct::DirectContentManager;
pub use indexing::IndexingContentManager;
pub use pipeline::{ContentLayer, ContentPipeline, PipelineContext};

use crate::error::RepodexResult;
use crate::model::{ArtifactStore, EventMetadata, StoreKey, Transfer};
use async_trait::async_trait;

#[async_trait]
pub trait ContentManager: Send + Sync {
    /// Resolve `path` in `store`; `Ok(None)` is not-found
    async fn retrieve(
        &self,
        store: &ArtifactStore,
        path: &str,
        event: &mut EventMetadata,
    ) -> RepodexResult<Option<Transfer>>;

    /// Write content; a group delegates to its first writable hosted member
    async fn store(
        &self,
        store: &ArtifactStore,
        path: &str,
        data: &[u8],
        event: &mut EventMetadata,
    ) -> RepodexResult<Transfer>;

    /// Remove content, returning the stores it was actually removed from
    async fn delete(
        &self,
        store: &ArtifactStore,
        path: &str,
        event: &mut EventMetadata,
    ) -> RepodexResult<Vec<StoreKey>>;

    /// First hit over `stores`, in order
    async fn retrieve_first(
        &self,
        stores: &[ArtifactStore],
        path: &str,
        event: &mut EventMetadata,
    ) -> RepodexResult<Option<Transfer>> {
        for store in stores {
            if let Some(found) = self.retrieve(store, path, event).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}
