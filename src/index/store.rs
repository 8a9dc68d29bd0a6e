//! Backing map for index entries, with JSON snapshots

use crate::error::{RepodexError, RepodexResult};
use crate::model::IndexedStorePath;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<IndexedStorePath>,
}

/// Concurrent map of index entries keyed by requesting store and path.
///
/// Single-entry operations are atomic. Queries are weakly consistent with
/// respect to concurrent writers.
#[derive(Default)]
pub struct ContentIndex {
    entries: DashMap<IndexedStorePath, IndexedStorePath>,
}

impl ContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing any entry with the same identity
    pub fn put(&self, entry: IndexedStorePath) -> Option<IndexedStorePath> {
        self.entries.insert(entry.clone(), entry)
    }

    pub fn get(&self, lookup: &IndexedStorePath) -> Option<IndexedStorePath> {
        self.entries.get(lookup).map(|e| e.value().clone())
    }

    pub fn remove(&self, lookup: &IndexedStorePath) -> Option<IndexedStorePath> {
        self.entries.remove(lookup).map(|(_, v)| v)
    }

    /// Up to `limit` entries matching `filter`
    pub fn query<F>(&self, filter: F, limit: usize) -> Vec<IndexedStorePath>
    where
        F: Fn(&IndexedStorePath) -> bool,
    {
        self.entries
            .iter()
            .filter(|e| filter(e.value()))
            .take(limit)
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn count<F>(&self, filter: F) -> usize
    where
        F: Fn(&IndexedStorePath) -> bool,
    {
        self.entries.iter().filter(|e| filter(e.value())).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Write every entry to `path` as JSON
    pub async fn save(&self, path: &Path) -> RepodexResult<()> {
        let mut entries: Vec<IndexedStorePath> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.to_string());

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries,
        };
        let data = serde_json::to_vec(&snapshot)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                RepodexError::io(format!("creating directory {}", parent.display()), e)
            })?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &data)
            .await
            .map_err(|e| RepodexError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| RepodexError::io(format!("renaming into {}", path.display()), e))?;

        debug!("Saved {} index entries to {}", snapshot.entries.len(), path.display());
        Ok(())
    }

    /// Merge a snapshot into the index; returns the number of entries loaded.
    ///
    /// A missing or unreadable snapshot loads nothing, since every entry can
    /// be rebuilt by resolution.
    pub async fn load(&self, path: &Path) -> usize {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Could not read index snapshot {}: {}", path.display(), e);
                return 0;
            }
        };

        let snapshot: Snapshot = match serde_json::from_slice(&data) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Discarding corrupt index snapshot {}: {}", path.display(), e);
                return 0;
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                "Discarding index snapshot {} with unsupported version {}",
                path.display(),
                snapshot.version
            );
            return 0;
        }

        let count = snapshot.entries.len();
        for entry in snapshot.entries {
            self.put(entry);
        }
        info!("Loaded {} index entries from {}", count, path.display());
        count
    }
}
