//! In-memory registry

use super::StoreRegistry;
use crate::error::RepodexResult;
use crate::model::{ArtifactStore, StoreKey};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Default)]
pub struct MemoryStoreRegistry {
    stores: RwLock<BTreeMap<StoreKey, ArtifactStore>>,
}

impl MemoryStoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stores(stores: impl IntoIterator<Item = ArtifactStore>) -> Self {
        Self {
            stores: RwLock::new(stores.into_iter().map(|s| (s.key.clone(), s)).collect()),
        }
    }

    /// Insert or replace a definition, returning the previous one
    pub async fn put_store(&self, store: ArtifactStore) -> Option<ArtifactStore> {
        self.stores.write().await.insert(store.key.clone(), store)
    }

    pub async fn remove_store(&self, key: &StoreKey) -> Option<ArtifactStore> {
        self.stores.write().await.remove(key)
    }
}

fn flatten(
    stores: &BTreeMap<StoreKey, ArtifactStore>,
    key: &StoreKey,
    visited: &mut HashSet<StoreKey>,
    out: &mut Vec<ArtifactStore>,
) {
    if !visited.insert(key.clone()) {
        return;
    }

    let Some(store) = stores.get(key) else {
        warn!("Group member {} is not defined, skipping", key);
        return;
    };

    if store.disabled {
        return;
    }

    if store.is_group() {
        for member in store.constituents() {
            flatten(stores, member, visited, out);
        }
    } else {
        out.push(store.clone());
    }
}

#[async_trait]
impl StoreRegistry for MemoryStoreRegistry {
    async fn get_artifact_store(&self, key: &StoreKey) -> RepodexResult<Option<ArtifactStore>> {
        Ok(self.stores.read().await.get(key).cloned())
    }

    async fn get_all_stores(&self) -> RepodexResult<Vec<ArtifactStore>> {
        Ok(self.stores.read().await.values().cloned().collect())
    }

    async fn get_groups_containing(&self, key: &StoreKey) -> RepodexResult<Vec<ArtifactStore>> {
        Ok(self
            .stores
            .read()
            .await
            .values()
            .filter(|s| s.constituents().contains(key))
            .cloned()
            .collect())
    }

    async fn get_groups_affected_by(&self, key: &StoreKey) -> RepodexResult<Vec<ArtifactStore>> {
        let stores = self.stores.read().await;

        let mut seen = HashSet::from([key.clone()]);
        let mut queue = VecDeque::from([key.clone()]);
        let mut affected = Vec::new();

        while let Some(current) = queue.pop_front() {
            for group in stores.values().filter(|s| s.constituents().contains(&current)) {
                if seen.insert(group.key.clone()) {
                    queue.push_back(group.key.clone());
                    affected.push(group.clone());
                }
            }
        }

        Ok(affected)
    }

    async fn get_ordered_concrete_stores_in_group(
        &self,
        key: &StoreKey,
    ) -> RepodexResult<Vec<ArtifactStore>> {
        let stores = self.stores.read().await;
        let Some(group) = stores.get(key) else {
            return Ok(Vec::new());
        };

        let mut visited = HashSet::from([key.clone()]);
        let mut out = Vec::new();
        for member in group.constituents() {
            flatten(&stores, member, &mut visited, &mut out);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(stores: &[ArtifactStore]) -> Vec<String> {
        stores.iter().map(|s| s.key.name.clone()).collect()
    }

    fn fixture() -> MemoryStoreRegistry {
        let a = ArtifactStore::hosted("maven", "a");
        let b = ArtifactStore::remote("maven", "b", None);
        let c = ArtifactStore::hosted("maven", "c");
        let inner = ArtifactStore::group("maven", "inner", vec![b.key.clone(), a.key.clone()]);
        let outer = ArtifactStore::group(
            "maven",
            "outer",
            vec![a.key.clone(), inner.key.clone(), c.key.clone()],
        );
        MemoryStoreRegistry::with_stores([a, b, c, inner, outer])
    }

    #[tokio::test]
    async fn ordered_concrete_flattens_and_dedups() {
        let registry = fixture();
        let ordered = registry
            .get_ordered_concrete_stores_in_group(&StoreKey::group("maven", "outer"))
            .await
            .unwrap();
        assert_eq!(keys(&ordered), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn disabled_members_are_skipped() {
        let registry = fixture();
        registry
            .put_store(ArtifactStore::remote("maven", "b", None).disabled(true))
            .await;

        let ordered = registry
            .get_ordered_concrete_stores_in_group(&StoreKey::group("maven", "inner"))
            .await
            .unwrap();
        assert_eq!(keys(&ordered), vec!["a"]);
    }

    #[tokio::test]
    async fn affected_groups_are_transitive() {
        let registry = fixture();
        let affected = registry
            .get_groups_affected_by(&StoreKey::remote("maven", "b"))
            .await
            .unwrap();
        assert_eq!(keys(&affected), vec!["inner", "outer"]);

        let containing = registry
            .get_groups_containing(&StoreKey::remote("maven", "b"))
            .await
            .unwrap();
        assert_eq!(keys(&containing), vec!["inner"]);
    }

    #[tokio::test]
    async fn cycles_terminate() {
        let x = ArtifactStore::group("maven", "x", vec![StoreKey::group("maven", "y")]);
        let y = ArtifactStore::group(
            "maven",
            "y",
            vec![StoreKey::group("maven", "x"), StoreKey::hosted("maven", "h")],
        );
        let h = ArtifactStore::hosted("maven", "h");
        let registry = MemoryStoreRegistry::with_stores([x, y, h]);

        let ordered = registry
            .get_ordered_concrete_stores_in_group(&StoreKey::group("maven", "x"))
            .await
            .unwrap();
        assert_eq!(keys(&ordered), vec!["h"]);

        let affected = registry
            .get_groups_affected_by(&StoreKey::group("maven", "x"))
            .await
            .unwrap();
        assert_eq!(keys(&affected), vec!["y"]);
    }
}
