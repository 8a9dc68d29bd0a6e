//! Group metadata merging and caching
//!
//! Groups do not serve a member's `maven-metadata.xml` as-is; they serve a
//! document merged from every enabled concrete member, produced at most once
//! per (group, path) and cached until a listener invalidates it.

mod cache;
mod generator;
pub mod hosted;
mod lock;
mod merger;
mod model;
mod path_info;
mod provider;
pub mod version;

pub use cache::{MetadataCacheManager, MetadataInfo, MetadataKey};
pub use generator::MavenMetadataGenerator;
pub use lock::{LockAttempt, LockGuard, Locker, Waiter};
pub use merger::{finalize, merge};
pub use model::{Metadata, Plugin, Snapshot, SnapshotVersion, Versioning};
pub use path_info::{ArtifactPathInfo, SnapshotStamp};
pub use provider::{MetadataProvider, StaticMetadataProvider};

use crate::model::path;

pub const MAVEN_METADATA: &str = "maven-metadata.xml";
pub const MERGEINFO_SUFFIX: &str = ".info";
pub const SHA256_SUFFIX: &str = ".sha256";

/// Paths the generator can produce for a group
pub fn can_process(raw: &str) -> bool {
    let name = path::file_name(raw);
    name == MAVEN_METADATA || name.strip_suffix(SHA256_SUFFIX) == Some(MAVEN_METADATA)
}

/// Whether a group resolves `raw` by merging instead of first match
pub fn is_merged_path(package_type: &str, raw: &str) -> bool {
    package_type == "maven" && can_process(raw)
}

/// The metadata document a request is derived from
pub fn metadata_path_for(raw: &str) -> String {
    let raw = path::normalize(raw);
    match raw.strip_suffix(SHA256_SUFFIX) {
        Some(xml) if path::file_name(xml) == MAVEN_METADATA => xml.to_string(),
        _ => raw.to_string(),
    }
}

/// Metadata documents whose content depends on `raw` in a member
pub fn affected_metadata_paths(raw: &str) -> Vec<String> {
    let raw = path::normalize(raw);
    if can_process(raw) {
        return vec![metadata_path_for(raw)];
    }

    let Some(info) = ArtifactPathInfo::parse(raw) else {
        return Vec::new();
    };
    if info.extension != "pom" {
        return Vec::new();
    }

    let version_dir = path::parent_dir(raw);
    let artifact_dir = path::parent_dir(version_dir);
    let mut paths = vec![format!("{}{}", artifact_dir, MAVEN_METADATA)];
    if info.is_snapshot() {
        paths.push(format!("{}{}", version_dir, MAVEN_METADATA));
    }
    paths
}

/// Companion files written next to a merged document
pub fn merged_companions(metadata_path: &str) -> [String; 3] {
    [
        metadata_path.to_string(),
        format!("{}{}", metadata_path, SHA256_SUFFIX),
        format!("{}{}", metadata_path, MERGEINFO_SUFFIX),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processable_paths() {
        assert!(can_process("org/foo/maven-metadata.xml"));
        assert!(can_process("org/foo/maven-metadata.xml.sha256"));
        assert!(!can_process("org/foo/maven-metadata.xml.md5"));
        assert!(!can_process("org/foo/foo-1.0.pom"));
        assert!(is_merged_path("maven", "maven-metadata.xml"));
        assert!(!is_merged_path("npm", "maven-metadata.xml"));
    }

    #[test]
    fn checksum_maps_to_document() {
        assert_eq!(
            metadata_path_for("/org/foo/maven-metadata.xml.sha256"),
            "org/foo/maven-metadata.xml"
        );
        assert_eq!(metadata_path_for("org/foo/maven-metadata.xml"), "org/foo/maven-metadata.xml");
    }

    #[test]
    fn pom_changes_affect_artifact_metadata() {
        assert_eq!(
            affected_metadata_paths("org/foo/1.0/foo-1.0.pom"),
            vec!["org/foo/maven-metadata.xml"]
        );
        assert_eq!(
            affected_metadata_paths("org/foo/1.0-SNAPSHOT/foo-1.0-SNAPSHOT.pom"),
            vec![
                "org/foo/maven-metadata.xml",
                "org/foo/1.0-SNAPSHOT/maven-metadata.xml"
            ]
        );
        assert!(affected_metadata_paths("org/foo/1.0/foo-1.0.jar").is_empty());
        assert_eq!(
            affected_metadata_paths("org/foo/maven-metadata.xml.sha256"),
            vec!["org/foo/maven-metadata.xml"]
        );
    }
}
