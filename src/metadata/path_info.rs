//! Coordinates from Maven repository layout paths
//!
//! `org/example/widget/1.0/widget-1.0-sources.jar` parses into group
//! `org.example`, artifact `widget`, version `1.0`, classifier `sources`,
//! type `jar`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPathInfo {
    pub group_id: String,
    pub artifact_id: String,
    /// Version directory, e.g. `1.0-SNAPSHOT`
    pub base_version: String,
    /// Version as written in the file name, e.g. `1.0-20240102.030405-3`
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

/// Timestamp and build number of a deployed snapshot file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotStamp {
    pub timestamp: String,
    pub build_number: u32,
}

const CHECKSUM_SUFFIXES: [&str; 5] = [".md5", ".sha1", ".sha256", ".sha512", ".asc"];

impl ArtifactPathInfo {
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        if segments.len() < 4 {
            return None;
        }

        let n = segments.len();
        let file = segments[n - 1];
        let base_version = segments[n - 2];
        let artifact_id = segments[n - 3];
        let group_id = segments[..n - 3].join(".");

        let rest = file.strip_prefix(artifact_id)?.strip_prefix('-')?;
        let version = file_version(rest, base_version)?;
        let tail = &rest[version.len()..];

        let (classifier, extension) = if let Some(with_classifier) = tail.strip_prefix('-') {
            let (classifier, ext) = with_classifier.split_once('.')?;
            (Some(classifier.to_string()), ext)
        } else {
            (None, tail.strip_prefix('.')?)
        };

        if extension.is_empty() {
            return None;
        }

        Some(Self {
            group_id,
            artifact_id: artifact_id.to_string(),
            base_version: base_version.to_string(),
            version: version.to_string(),
            classifier,
            extension: extension.to_string(),
        })
    }

    pub fn is_checksum(&self) -> bool {
        CHECKSUM_SUFFIXES.iter().any(|s| self.extension.ends_with(s))
    }

    pub fn is_snapshot(&self) -> bool {
        self.base_version.ends_with("-SNAPSHOT")
    }

    /// Timestamp and build number when the file is a timestamped snapshot
    pub fn snapshot_stamp(&self) -> Option<SnapshotStamp> {
        let prefix = self.base_version.strip_suffix("SNAPSHOT")?;
        let stamp = self.version.strip_prefix(prefix)?;
        let (timestamp, build) = stamp.rsplit_once('-')?;
        Some(SnapshotStamp {
            timestamp: timestamp.to_string(),
            build_number: build.parse().ok()?,
        })
    }
}

/// The version part at the start of `rest`, honoring timestamped snapshots
fn file_version<'a>(rest: &'a str, base_version: &str) -> Option<&'a str> {
    let Some(prefix) = base_version.strip_suffix("SNAPSHOT") else {
        return rest.starts_with(base_version).then(|| &rest[..base_version.len()]);
    };

    let after = rest.strip_prefix(prefix)?;
    if after.starts_with("SNAPSHOT") {
        return Some(&rest[..prefix.len() + "SNAPSHOT".len()]);
    }

    // yyyyMMdd.HHmmss-N
    let bytes = after.as_bytes();
    let stamp_ok = bytes.len() > 16
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'.'
        && bytes[9..15].iter().all(u8::is_ascii_digit)
        && bytes[15] == b'-';
    if !stamp_ok {
        return None;
    }

    let build_len = bytes[16..].iter().take_while(|b| b.is_ascii_digit()).count();
    if build_len == 0 {
        return None;
    }
    Some(&rest[..prefix.len() + 16 + build_len])
}
