//! Metadata synthesized from a hosted store's directory layout

use super::merger::finalize;
use super::model::{Metadata, Snapshot, SnapshotVersion, Versioning};
use super::path_info::{ArtifactPathInfo, SnapshotStamp};
use crate::error::RepodexResult;
use crate::model::{path, StoreKey};
use crate::storage::ContentStore;
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;

pub(crate) fn now_stamp() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Build metadata for the directory holding `metadata_path`.
///
/// An artifact directory yields the list of version directories that
/// contain a POM; a `-SNAPSHOT` version directory yields snapshot metadata
/// for the newest deployed build.
pub async fn generate(
    storage: &dyn ContentStore,
    key: &StoreKey,
    metadata_path: &str,
) -> RepodexResult<Option<Metadata>> {
    let dir = path::parent_dir(metadata_path);
    if dir.is_empty() {
        return Ok(None);
    }

    if dir.trim_end_matches('/').ends_with("-SNAPSHOT") {
        snapshot_metadata(storage, key, dir).await
    } else {
        version_metadata(storage, key, dir).await
    }
}

async fn version_metadata(
    storage: &dyn ContentStore,
    key: &StoreKey,
    dir: &str,
) -> RepodexResult<Option<Metadata>> {
    let mut coordinates = None;
    let mut versions = Vec::new();

    for child in storage.list(key, dir).await?.into_iter().filter(|r| r.is_dir()) {
        let version = path::file_name(&child.path).to_string();
        let has_pom = storage.list(key, &child.path).await?.iter().any(|file| {
            ArtifactPathInfo::parse(&file.path)
                .filter(|info| info.extension == "pom" && info.base_version == version)
                .map(|info| {
                    coordinates.get_or_insert((info.group_id, info.artifact_id));
                })
                .is_some()
        });
        if has_pom {
            versions.push(version);
        }
    }

    let Some((group_id, artifact_id)) = coordinates else {
        debug!("No versions with a POM under {} in {}", dir, key);
        return Ok(None);
    };

    let mut metadata = Metadata {
        group_id: Some(group_id),
        artifact_id: Some(artifact_id),
        versioning: Some(Versioning {
            versions,
            last_updated: Some(now_stamp()),
            ..Default::default()
        }),
        ..Default::default()
    };
    finalize(&mut metadata);
    Ok(Some(metadata))
}

async fn snapshot_metadata(
    storage: &dyn ContentStore,
    key: &StoreKey,
    dir: &str,
) -> RepodexResult<Option<Metadata>> {
    let infos: Vec<ArtifactPathInfo> = storage
        .list(key, dir)
        .await?
        .into_iter()
        .filter(|r| !r.is_dir())
        .filter_map(|r| ArtifactPathInfo::parse(&r.path))
        .filter(|info| info.is_snapshot() && !info.is_checksum())
        .collect();

    let Some(first) = infos.first() else {
        return Ok(None);
    };

    let newest: Option<SnapshotStamp> = infos.iter().filter_map(|i| i.snapshot_stamp()).max();

    // newest file per (classifier, extension)
    let mut latest: BTreeMap<(String, Option<String>), (Option<SnapshotStamp>, &ArtifactPathInfo)> =
        BTreeMap::new();
    for info in &infos {
        let stamp = info.snapshot_stamp();
        let slot = (info.extension.clone(), info.classifier.clone());
        let newer = latest
            .get(&slot)
            .map_or(true, |(current, _)| stamp > *current);
        if newer {
            latest.insert(slot, (stamp, info));
        }
    }

    let snapshot_versions = latest
        .into_values()
        .map(|(stamp, info)| SnapshotVersion {
            classifier: info.classifier.clone(),
            extension: info.extension.clone(),
            value: info.version.clone(),
            updated: Some(
                stamp
                    .map(|s| s.timestamp.replace('.', ""))
                    .unwrap_or_else(now_stamp),
            ),
        })
        .collect();

    let snapshot = match &newest {
        Some(stamp) => Snapshot {
            timestamp: Some(stamp.timestamp.clone()),
            build_number: Some(stamp.build_number),
            local_copy: false,
        },
        None => Snapshot {
            local_copy: true,
            ..Default::default()
        },
    };

    let mut metadata = Metadata {
        group_id: Some(first.group_id.clone()),
        artifact_id: Some(first.artifact_id.clone()),
        version: Some(first.base_version.clone()),
        versioning: Some(Versioning {
            snapshot: Some(snapshot),
            snapshot_versions,
            last_updated: Some(now_stamp()),
            ..Default::default()
        }),
        ..Default::default()
    };
    finalize(&mut metadata);
    Ok(Some(metadata))
}
