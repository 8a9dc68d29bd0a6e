//! Field-wise merge of member metadata into a group document
//!
//! Merging is applied in member precedence order. For every scalar field the
//! first member that sets it wins; collections are unioned with the same
//! rule applied per element identity.

use super::model::{Metadata, Versioning};
use super::version::{is_snapshot, sort_versions};

/// Fold `source` into `target`
pub fn merge(target: &mut Metadata, source: &Metadata) {
    fill(&mut target.group_id, &source.group_id);
    fill(&mut target.artifact_id, &source.artifact_id);
    fill(&mut target.version, &source.version);

    for plugin in &source.plugins {
        if !target.plugins.iter().any(|p| p.prefix == plugin.prefix) {
            target.plugins.push(plugin.clone());
        }
    }

    if let Some(src) = &source.versioning {
        let dst = target.versioning.get_or_insert_with(Versioning::default);

        fill(&mut dst.latest, &src.latest);
        fill(&mut dst.release, &src.release);
        if dst.snapshot.is_none() {
            dst.snapshot = src.snapshot.clone();
        }

        for version in &src.versions {
            if !dst.versions.contains(version) {
                dst.versions.push(version.clone());
            }
        }

        for sv in &src.snapshot_versions {
            let known = dst
                .snapshot_versions
                .iter()
                .any(|d| d.classifier == sv.classifier && d.extension == sv.extension);
            if !known {
                dst.snapshot_versions.push(sv.clone());
            }
        }

        dst.last_updated = match (dst.last_updated.take(), &src.last_updated) {
            (Some(a), Some(b)) => Some(if b > &a { b.clone() } else { a }),
            (a, b) => a.or_else(|| b.clone()),
        };
    }
}

/// Sort versions and derive `latest`/`release` from the merged list
pub fn finalize(metadata: &mut Metadata) {
    let Some(versioning) = metadata.versioning.as_mut() else {
        return;
    };

    sort_versions(&mut versioning.versions);
    if let Some(latest) = versioning.versions.last() {
        versioning.latest = Some(latest.clone());
    }
    if let Some(release) = versioning.versions.iter().rev().find(|v| !is_snapshot(v)) {
        versioning.release = Some(release.clone());
    }

    versioning.snapshot_versions.sort_by(|a, b| {
        a.extension
            .cmp(&b.extension)
            .then_with(|| a.classifier.cmp(&b.classifier))
    });
}

fn fill(target: &mut Option<String>, source: &Option<String>) {
    if target.is_none() {
        target.clone_from(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::model::{Plugin, Snapshot, SnapshotVersion};

    fn doc(group: Option<&str>, versions: &[&str], updated: &str) -> Metadata {
        Metadata {
            group_id: group.map(str::to_string),
            artifact_id: Some("widget".to_string()),
            versioning: Some(Versioning {
                latest: versions.last().map(|v| v.to_string()),
                versions: versions.iter().map(|v| v.to_string()).collect(),
                last_updated: Some(updated.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn first_contributor_wins_per_field() {
        let mut master = Metadata::default();
        merge(&mut master, &doc(None, &["1.0"], "20240101000000"));
        merge(&mut master, &doc(Some("org.b"), &["2.0"], "20230101000000"));
        merge(&mut master, &doc(Some("org.c"), &["3.0"], "20220101000000"));

        // first member left groupId unset, so the second one fills it
        assert_eq!(master.group_id.as_deref(), Some("org.b"));
        assert_eq!(
            master.versioning.as_ref().unwrap().last_updated.as_deref(),
            Some("20240101000000")
        );
    }

    #[test]
    fn versions_union_and_latest_recomputed() {
        let mut master = Metadata::default();
        merge(&mut master, &doc(Some("g"), &["1.0", "1.10"], "1"));
        merge(&mut master, &doc(Some("g"), &["1.9", "2.0-SNAPSHOT", "1.0"], "2"));
        finalize(&mut master);

        let v = master.versioning.unwrap();
        assert_eq!(v.versions, vec!["1.0", "1.9", "1.10", "2.0-SNAPSHOT"]);
        assert_eq!(v.latest.as_deref(), Some("2.0-SNAPSHOT"));
        assert_eq!(v.release.as_deref(), Some("1.10"));
    }

    #[test]
    fn snapshot_from_first_member_that_has_one() {
        let sv = |classifier: Option<&str>, value: &str| SnapshotVersion {
            classifier: classifier.map(str::to_string),
            extension: "jar".to_string(),
            value: value.to_string(),
            updated: None,
        };
        let with_snapshot = |build: u32, value: &str| Metadata {
            versioning: Some(Versioning {
                snapshot: Some(Snapshot {
                    timestamp: Some("20240101.000000".to_string()),
                    build_number: Some(build),
                    local_copy: false,
                }),
                snapshot_versions: vec![sv(None, value), sv(Some("sources"), value)],
                ..Default::default()
            }),
            ..Default::default()
        };

        let mut master = Metadata::default();
        merge(&mut master, &with_snapshot(2, "1.0-20240101.000000-2"));
        merge(&mut master, &with_snapshot(9, "1.0-20240101.000000-9"));
        finalize(&mut master);

        let v = master.versioning.unwrap();
        assert_eq!(v.snapshot.unwrap().build_number, Some(2));
        assert_eq!(v.snapshot_versions.len(), 2);
        assert!(v.snapshot_versions.iter().all(|s| s.value.ends_with("-2")));
    }

    #[test]
    fn plugins_union_by_prefix() {
        let plugin = |prefix: &str, artifact: &str| Plugin {
            name: None,
            prefix: prefix.to_string(),
            artifact_id: artifact.to_string(),
        };
        let mut master = Metadata {
            plugins: vec![plugin("compiler", "maven-compiler-plugin")],
            ..Default::default()
        };
        let other = Metadata {
            plugins: vec![
                plugin("compiler", "other-compiler-plugin"),
                plugin("surefire", "maven-surefire-plugin"),
            ],
            ..Default::default()
        };

        merge(&mut master, &other);
        assert_eq!(master.plugins.len(), 2);
        assert_eq!(master.plugins[0].artifact_id, "maven-compiler-plugin");
    }
}
