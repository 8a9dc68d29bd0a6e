//! Rebuilds the content index from what storage actually holds

use super::manager::ContentIndexManager;
use crate::error::RepodexResult;
use crate::metadata;
use crate::registry::StoreRegistry;
use crate::storage::{list_recursive, ContentStore};
use futures_util::future::join_all;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WarmReport {
    pub stores: usize,
    pub self_entries: usize,
    pub group_entries: usize,
}

/// Index every file of every enabled concrete store, then point each group
/// at the first member holding each path it does not know yet.
pub async fn warm(
    manager: &ContentIndexManager,
    registry: &dyn StoreRegistry,
    storage: &dyn ContentStore,
) -> RepodexResult<WarmReport> {
    let stores = registry.get_all_stores().await?;
    let concrete: Vec<_> = stores
        .iter()
        .filter(|s| !s.is_group() && !s.disabled)
        .collect();

    let listings = join_all(
        concrete
            .iter()
            .map(|s| list_recursive(storage, &s.key, "")),
    )
    .await;

    let mut report = WarmReport::default();
    let mut files_by_store = HashMap::new();

    for (store, listing) in concrete.iter().zip(listings) {
        match listing {
            Ok(files) => {
                for file in &files {
                    manager.index_path_in_stores(file, &store.key, &[]);
                }
                report.stores += 1;
                report.self_entries += files.len();
                files_by_store.insert(store.key.clone(), files);
            }
            Err(e) => warn!("Skipping {} while warming index: {}", store.key, e),
        }
    }

    for group in stores.iter().filter(|s| s.is_group() && !s.disabled) {
        let members = match registry.get_ordered_concrete_stores_in_group(&group.key).await {
            Ok(members) => members,
            Err(e) => {
                warn!("Skipping group {} while warming index: {}", group.key, e);
                continue;
            }
        };

        for member in members {
            let Some(files) = files_by_store.get(&member.key) else {
                continue;
            };

            for file in files {
                if metadata::is_merged_path(&group.key.package_type, file) {
                    continue;
                }
                if manager.get_indexed_store_key(&group.key, file).is_none() {
                    manager.index_path_in_stores(file, &member.key, &[group.key.clone()]);
                    report.group_entries += 1;
                }
            }
        }
    }

    info!(
        "Index warmed: {} stores, {} files, {} group entries",
        report.stores, report.self_entries, report.group_entries
    );
    Ok(report)
}
