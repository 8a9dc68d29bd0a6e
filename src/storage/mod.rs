//! Physical content storage
//!
//! The resolution core only needs handles and a handful of byte-level
//! operations from storage. Two backends are provided: an in-memory store
//! used by tests and embedders, and a directory tree on local disk that can
//! proxy remote stores from a `file://` or `http(s)://` upstream.

mod fs;
mod memory;

pub use fs::FileContentStore;
pub use memory::MemoryContentStore;

use crate::error::RepodexResult;
use crate::model::{ArtifactStore, StoreKey, Transfer};
use async_trait::async_trait;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoreResource {
    /// Path relative to the store root; directories end with `/`
    pub path: String,
}

impl StoreResource {
    pub fn is_dir(&self) -> bool {
        self.path.ends_with('/')
    }
}

/// Byte-level access to the content of concrete stores
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Locate content, fetching it from upstream first when `store` is remote
    async fn retrieve(&self, store: &ArtifactStore, path: &str) -> RepodexResult<Option<Transfer>>;

    /// Whether the handle currently has content behind it
    async fn exists(&self, transfer: &Transfer) -> RepodexResult<bool>;

    async fn read(&self, transfer: &Transfer) -> RepodexResult<Vec<u8>>;

    async fn store(&self, key: &StoreKey, path: &str, data: &[u8]) -> RepodexResult<Transfer>;

    /// Returns whether anything was removed
    async fn delete(&self, key: &StoreKey, path: &str) -> RepodexResult<bool>;

    /// Immediate children of a directory, sorted
    async fn list(&self, key: &StoreKey, path: &str) -> RepodexResult<Vec<StoreResource>>;
}

/// Every file below `path`, depth first
pub async fn list_recursive(
    storage: &dyn ContentStore,
    key: &StoreKey,
    path: &str,
) -> RepodexResult<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![path.to_string()];

    while let Some(dir) = pending.pop() {
        for resource in storage.list(key, &dir).await? {
            if resource.is_dir() {
                pending.push(resource.path);
            } else {
                files.push(resource.path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Join a directory (with or without trailing `/`) and a child name
pub(crate) fn child_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}
