//! Not-found cache
//!
//! Negative results keyed by (location, path). Group resolution consults it
//! before walking members and records misses after an exhausted walk.

use crate::model::{ConcreteResource, StoreKey};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

pub trait NotFoundCache: Send + Sync {
    fn is_missing(&self, resource: &ConcreteResource) -> bool;

    fn add_missing(&self, resource: ConcreteResource);

    fn clear_missing(&self, resource: &ConcreteResource);

    /// Forget every missing path recorded for `key`
    fn clear_missing_in(&self, key: &StoreKey);

    fn clear_all(&self);

    /// Missing paths for `key`, sorted, one page at a time
    fn get_missing(&self, key: &StoreKey, page: usize, page_size: usize) -> Vec<String>;

    fn size(&self) -> usize;
}

/// Expiring in-memory implementation
pub struct MemoryNotFoundCache {
    entries: DashMap<ConcreteResource, Option<DateTime<Utc>>>,
    timeout: Option<Duration>,
    max_page_size: usize,
}

impl MemoryNotFoundCache {
    /// `timeout_secs == 0` keeps entries until explicitly cleared
    pub fn new(timeout_secs: u64, max_page_size: usize) -> Self {
        let timeout = (timeout_secs > 0)
            .then(|| Duration::try_seconds(timeout_secs as i64))
            .flatten();
        Self {
            entries: DashMap::new(),
            timeout,
            max_page_size: max_page_size.max(1),
        }
    }

    fn expired(expiry: &Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        expiry.map(|at| at <= now).unwrap_or(false)
    }
}

impl Default for MemoryNotFoundCache {
    fn default() -> Self {
        Self::new(0, 1000)
    }
}

impl NotFoundCache for MemoryNotFoundCache {
    fn is_missing(&self, resource: &ConcreteResource) -> bool {
        let now = Utc::now();
        let removed = self
            .entries
            .remove_if(resource, |_, expiry| Self::expired(expiry, now));
        if removed.is_some() {
            debug!("NFC entry for {} expired", resource);
            return false;
        }
        self.entries.contains_key(resource)
    }

    fn add_missing(&self, resource: ConcreteResource) {
        let expiry = self.timeout.map(|t| Utc::now() + t);
        debug!("NFC add {}", resource);
        self.entries.insert(resource, expiry);
    }

    fn clear_missing(&self, resource: &ConcreteResource) {
        if self.entries.remove(resource).is_some() {
            debug!("NFC clear {}", resource);
        }
    }

    fn clear_missing_in(&self, key: &StoreKey) {
        self.entries.retain(|resource, _| &resource.key != key);
    }

    fn clear_all(&self) {
        self.entries.clear();
    }

    fn get_missing(&self, key: &StoreKey, page: usize, page_size: usize) -> Vec<String> {
        let now = Utc::now();
        let size = page_size.clamp(1, self.max_page_size);

        let mut paths: Vec<String> = self
            .entries
            .iter()
            .filter(|e| &e.key().key == key && !Self::expired(e.value(), now))
            .map(|e| e.key().path.clone())
            .collect();
        paths.sort();

        paths.into_iter().skip(page * size).take(size).collect()
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}
