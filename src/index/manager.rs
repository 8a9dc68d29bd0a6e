//! Content index operations
//!
//! Every path is passed through the package type's indexing strategy before
//! it touches the index, on reads and writes alike. Index failures never
//! fail the caller; a missing entry only costs a member walk.

use super::store::ContentIndex;
use super::strategy::IndexingStrategies;
use crate::error::RepodexResult;
use crate::model::{IndexedStorePath, StoreKey, Transfer};
use crate::storage::ContentStore;
use std::path::Path;
use tracing::{debug, info, trace, warn};

pub struct ContentIndexManager {
    index: ContentIndex,
    strategies: IndexingStrategies,
    page_size: usize,
}

impl ContentIndexManager {
    pub fn new(strategies: IndexingStrategies, page_size: usize) -> Self {
        Self {
            index: ContentIndex::new(),
            strategies,
            page_size: page_size.max(1),
        }
    }

    pub fn index(&self) -> &ContentIndex {
        &self.index
    }

    pub fn get_strategy_path(&self, key: &StoreKey, raw: &str) -> String {
        self.strategies.normalize(&key.package_type, raw)
    }

    /// Self entry for `origin` plus one entry per top key pointing at it
    pub fn index_path_in_stores(&self, raw: &str, origin: &StoreKey, top_keys: &[StoreKey]) {
        let path = self.get_strategy_path(origin, raw);

        self.index.put(IndexedStorePath::self_entry(origin, path.clone()));
        trace!("Indexed {} in {}", path, origin);

        for top in top_keys.iter().filter(|k| *k != origin) {
            self.index.put(IndexedStorePath::new(top, origin, path.clone()));
            trace!("Indexed {} in {} via {}", path, top, origin);
        }
    }

    /// Index a transfer, skipping handles with nothing behind them
    pub async fn index_transfer_in(
        &self,
        storage: &dyn ContentStore,
        transfer: &Transfer,
        top_keys: &[StoreKey],
    ) {
        match storage.exists(transfer).await {
            Ok(true) => self.index_path_in_stores(&transfer.path, &transfer.key, top_keys),
            Ok(false) => trace!("Not indexing {}, content is gone", transfer),
            Err(e) => warn!("Not indexing {}: {}", transfer, e),
        }
    }

    pub fn get_indexed_store_path(&self, key: &StoreKey, raw: &str) -> Option<IndexedStorePath> {
        let path = self.get_strategy_path(key, raw);
        self.index.get(&IndexedStorePath::lookup(key, path))
    }

    /// Origin of the content for `(key, path)`, if indexed
    pub fn get_indexed_store_key(&self, key: &StoreKey, raw: &str) -> Option<StoreKey> {
        let found = self.get_indexed_store_path(key, raw).map(|e| e.origin_key());
        trace!("Index lookup {} in {}: {:?}", raw, key, found);
        found
    }

    /// Remove the single entry for `(key, path)`
    pub fn de_index_store_path(&self, key: &StoreKey, raw: &str) -> bool {
        self.remove_indexed_store_path(raw, key, |_| {})
    }

    pub fn remove_indexed_store_path(
        &self,
        raw: &str,
        key: &StoreKey,
        mut consumer: impl FnMut(&IndexedStorePath),
    ) -> bool {
        let path = self.get_strategy_path(key, raw);
        match self.index.remove(&IndexedStorePath::lookup(key, path.clone())) {
            Some(removed) => {
                debug!("De-indexed {} from {}", path, key);
                consumer(&removed);
                true
            }
            None => {
                trace!("Nothing indexed for {} in {}", path, key);
                false
            }
        }
    }

    /// Remove every entry requested through `key`
    pub fn clear_all_indexed_path_in_store(
        &self,
        key: &StoreKey,
        consumer: impl FnMut(&IndexedStorePath),
    ) -> usize {
        let removed = self.clear_matching(|e| e.belongs_to(key), consumer);
        info!("Cleared {} index entries in {}", removed, key);
        removed
    }

    /// Remove every entry whose content lives in `origin`, whoever requested it
    pub fn clear_all_indexed_path_with_original_store(
        &self,
        origin: &StoreKey,
        consumer: impl FnMut(&IndexedStorePath),
    ) -> usize {
        let removed = self.clear_matching(|e| e.originates_from(origin), consumer);
        info!("Cleared {} index entries originating in {}", removed, origin);
        removed
    }

    /// Remove the entries of `key` that point into `origin`
    pub fn clear_all_indexed_path_in_store_with_original(
        &self,
        key: &StoreKey,
        origin: &StoreKey,
        consumer: impl FnMut(&IndexedStorePath),
    ) -> usize {
        let removed =
            self.clear_matching(|e| e.belongs_to(key) && e.originates_from(origin), consumer);
        info!(
            "Cleared {} index entries in {} originating in {}",
            removed, key, origin
        );
        removed
    }

    /// Remove `path` from each of `groups`.
    ///
    /// Does not follow membership; callers pass the complete affected set.
    pub fn clear_indexed_path_from(
        &self,
        raw: &str,
        groups: &[StoreKey],
        mut consumer: impl FnMut(&IndexedStorePath),
    ) -> usize {
        groups
            .iter()
            .filter(|g| self.remove_indexed_store_path(raw, g, &mut consumer))
            .count()
    }

    /// Entries requested through `key`, sorted by path, one page at a time
    pub fn get_all_indexed_paths_in_store(
        &self,
        key: &StoreKey,
        page: usize,
        page_size: usize,
    ) -> Vec<IndexedStorePath> {
        let mut entries = self.index.query(|e| e.belongs_to(key), usize::MAX);
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
            .into_iter()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .collect()
    }

    pub fn count_in_store(&self, key: &StoreKey) -> usize {
        self.index.count(|e| e.belongs_to(key))
    }

    pub async fn save(&self, path: &Path) -> RepodexResult<()> {
        self.index.save(path).await
    }

    pub async fn load(&self, path: &Path) -> usize {
        self.index.load(path).await
    }

    /// Query-then-delete in pages until nothing matches
    fn clear_matching<F>(&self, filter: F, mut consumer: impl FnMut(&IndexedStorePath)) -> usize
    where
        F: Fn(&IndexedStorePath) -> bool,
    {
        let mut removed = 0;
        loop {
            let batch = self.index.query(&filter, self.page_size);
            if batch.is_empty() {
                break;
            }

            let mut progressed = false;
            for entry in &batch {
                if let Some(gone) = self.index.remove(entry) {
                    progressed = true;
                    removed += 1;
                    consumer(&gone);
                }
            }

            // Another writer emptied the batch under us; re-query.
            if !progressed {
                trace!("Bulk clear batch of {} was already gone", batch.len());
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryContentStore;

    fn manager() -> ContentIndexManager {
        ContentIndexManager::new(IndexingStrategies::standard(), 1000)
    }

    #[test]
    fn index_then_lookup_returns_origin() {
        let m = manager();
        let group = StoreKey::group("maven", "g");
        let origin = StoreKey::hosted("maven", "a");

        m.index_path_in_stores("org/foo/1.0/foo-1.0.jar", &origin, &[group.clone()]);

        assert_eq!(m.get_indexed_store_key(&group, "org/foo/1.0/foo-1.0.pom"), Some(origin.clone()));
        assert_eq!(m.get_indexed_store_key(&origin, "org/foo/1.0/foo-1.0.jar"), Some(origin));
    }

    #[test]
    fn self_index_twice_is_one_entry() {
        let m = manager();
        let a = StoreKey::hosted("maven", "a");

        m.index_path_in_stores("org/foo/maven-metadata.xml", &a, &[]);
        m.index_path_in_stores("org/foo/maven-metadata.xml", &a, &[]);

        assert_eq!(m.index().count(|e| e.path == "org/foo/maven-metadata.xml"), 1);
    }

    #[test]
    fn deindex_is_single_entry() {
        let m = manager();
        let group = StoreKey::group("maven", "g");
        let a = StoreKey::hosted("maven", "a");
        m.index_path_in_stores("p/x.jar", &a, &[group.clone()]);

        assert!(m.de_index_store_path(&group, "p/x.jar"));
        assert!(!m.de_index_store_path(&group, "p/x.jar"));
        assert_eq!(m.get_indexed_store_key(&a, "p/x.jar"), Some(a));
    }

    #[test]
    fn consumer_sees_removed_entry() {
        let m = manager();
        let group = StoreKey::group("maven", "g");
        let a = StoreKey::hosted("maven", "a");
        m.index_path_in_stores("p/x.jar", &a, &[group.clone()]);

        let mut seen = Vec::new();
        m.remove_indexed_store_path("p/x.jar", &group, |e| seen.push(e.origin_key()));
        assert_eq!(seen, vec![a]);
    }

    #[test]
    fn origin_filters() {
        let m = manager();
        let g1 = StoreKey::group("maven", "g1");
        let g2 = StoreKey::group("maven", "g2");
        let a = StoreKey::hosted("maven", "a");
        let b = StoreKey::hosted("maven", "b");
        m.index_path_in_stores("a/", &a, &[g1.clone(), g2.clone()]);
        m.index_path_in_stores("b/", &b, &[g1.clone()]);

        assert_eq!(m.clear_all_indexed_path_in_store_with_original(&g1, &a, |_| {}), 1);
        assert_eq!(m.get_indexed_store_key(&g1, "b/"), Some(b.clone()));
        assert_eq!(m.get_indexed_store_key(&g2, "a/"), Some(a.clone()));

        // self entry of a plus g2's pointer
        assert_eq!(m.clear_all_indexed_path_with_original_store(&a, |_| {}), 2);
        assert_eq!(m.get_indexed_store_key(&g2, "a/"), None);
    }

    #[test]
    fn clear_from_groups_is_non_recursive() {
        let m = manager();
        let inner = StoreKey::group("maven", "inner");
        let outer = StoreKey::group("maven", "outer");
        let a = StoreKey::hosted("maven", "a");
        m.index_path_in_stores("p/", &a, &[inner.clone(), outer.clone()]);

        assert_eq!(m.clear_indexed_path_from("p/", &[inner.clone()], |_| {}), 1);
        assert_eq!(m.get_indexed_store_key(&outer, "p/"), Some(a));
    }

    #[test]
    fn paginated_clear_crosses_batches() {
        let m = ContentIndexManager::new(IndexingStrategies::identity(), 7);
        let a = StoreKey::hosted("generic", "a");
        for i in 0..50 {
            m.index_path_in_stores(&format!("f{}", i), &a, &[]);
        }

        assert_eq!(m.clear_all_indexed_path_in_store(&a, |_| {}), 50);
        assert_eq!(m.count_in_store(&a), 0);
    }

    #[test]
    fn listing_pages() {
        let m = ContentIndexManager::new(IndexingStrategies::identity(), 10);
        let a = StoreKey::hosted("generic", "a");
        for p in ["c", "a", "b"] {
            m.index_path_in_stores(p, &a, &[]);
        }
        let page: Vec<_> = m
            .get_all_indexed_paths_in_store(&a, 1, 2)
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(page, vec!["c"]);
    }

    #[tokio::test]
    async fn transfer_without_content_is_not_indexed() {
        let m = manager();
        let storage = MemoryContentStore::new();
        let a = StoreKey::hosted("maven", "a");

        m.index_transfer_in(&storage, &Transfer::new(a.clone(), "x/y.jar"), &[]).await;
        assert_eq!(m.get_indexed_store_key(&a, "x/y.jar"), None);

        let t = storage.store(&a, "x/y.jar", b"1").await.unwrap();
        m.index_transfer_in(&storage, &t, &[]).await;
        assert_eq!(m.get_indexed_store_key(&a, "x/y.jar"), Some(a));
    }
}
