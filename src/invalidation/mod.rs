//! Cache invalidation on store and content changes
//!
//! Registry mutations and content writes are turned into [`StoreEvent`]s and
//! handed to every registered listener in order. Dispatch is awaited, so by
//! the time a mutation returns, the index, metadata cache and not-found
//! cache no longer hold anything the change made stale.

mod index;
mod metadata;

pub use index::ContentIndexListener;
pub use metadata::MetadataMergeListener;

use crate::error::RepodexResult;
use crate::model::{ArtifactStore, StoreKey};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A definition is about to be removed
    Deleted { store: ArtifactStore },
    /// A definition is about to be replaced
    Updated { old: ArtifactStore, new: ArtifactStore },
    FileStored { key: StoreKey, path: String },
    FileDeleted { key: StoreKey, path: String },
    /// Cached content reached its time-to-live
    ContentExpired { key: StoreKey, path: String },
}

impl StoreEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deleted { .. } => "deleted",
            Self::Updated { .. } => "updated",
            Self::FileStored { .. } => "file-stored",
            Self::FileDeleted { .. } => "file-deleted",
            Self::ContentExpired { .. } => "content-expired",
        }
    }
}

#[async_trait]
pub trait InvalidationListener: Send + Sync {
    fn name(&self) -> &str;

    async fn on_event(&self, event: &StoreEvent) -> RepodexResult<()>;
}

#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn InvalidationListener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn InvalidationListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Run every listener; a failing listener is logged and the rest still run
    pub async fn dispatch(&self, event: &StoreEvent) {
        debug!("Dispatching {} event to {} listeners", event.name(), self.listeners.len());
        for listener in &self.listeners {
            if let Err(e) = listener.on_event(event).await {
                error!(
                    "Listener {} failed on {} event: {}",
                    listener.name(),
                    event.name(),
                    e
                );
            }
        }
    }
}

/// Position of the first difference between two member lists
pub(crate) fn divergence(old: &[StoreKey], new: &[StoreKey]) -> usize {
    old.iter()
        .zip(new)
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| old.len().min(new.len()))
}

/// Whether an update changes what a group resolves to
pub(crate) fn membership_changed(old: &ArtifactStore, new: &ArtifactStore) -> bool {
    old.disabled != new.disabled || old.constituents() != new.constituents()
}
