//! Per-package-type path normalization for index keys

use crate::model::path;
use std::collections::HashMap;

/// Pure mapping from a raw request path to its index path
pub type IndexingStrategy = fn(&str) -> String;

/// Registry of strategies, resolved once at startup.
///
/// Package types without a registered strategy index raw paths unchanged.
#[derive(Clone)]
pub struct IndexingStrategies {
    by_package: HashMap<String, IndexingStrategy>,
}

impl IndexingStrategies {
    /// No strategies at all
    pub fn identity() -> Self {
        Self {
            by_package: HashMap::new(),
        }
    }

    /// Built-in strategies for maven and npm
    pub fn standard() -> Self {
        let mut strategies = Self::identity();
        strategies.register("maven", maven_path);
        strategies.register("npm", npm_path);
        strategies
    }

    pub fn register(&mut self, package_type: &str, strategy: IndexingStrategy) {
        self.by_package.insert(package_type.to_string(), strategy);
    }

    pub fn normalize(&self, package_type: &str, raw: &str) -> String {
        let raw = path::normalize(raw);
        match self.by_package.get(package_type) {
            Some(strategy) => strategy(raw),
            None => raw.to_string(),
        }
    }
}

impl Default for IndexingStrategies {
    fn default() -> Self {
        Self::standard()
    }
}

/// Files whose content differs per store and must be indexed individually
fn is_maven_special(name: &str) -> bool {
    let base = ["md5", "sha1", "sha256", "sha512", "asc"]
        .iter()
        .find_map(|ext| name.strip_suffix(&format!(".{}", ext)))
        .unwrap_or(name);
    base == crate::metadata::MAVEN_METADATA || base == "archetype-catalog.xml"
}

/// Artifact files collapse into their version directory
fn maven_path(raw: &str) -> String {
    if raw.is_empty() || raw.ends_with('/') || is_maven_special(path::file_name(raw)) {
        return raw.to_string();
    }
    path::parent_dir(raw).to_string()
}

/// Tarballs collapse into the package's `-/` directory
fn npm_path(raw: &str) -> String {
    match raw.find("/-/") {
        Some(idx) if raw.ends_with(".tgz") => raw[..idx + 3].to_string(),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maven_collapses_artifacts_to_directory() {
        let s = IndexingStrategies::standard();
        assert_eq!(s.normalize("maven", "/org/foo/1.0/foo-1.0.jar"), "org/foo/1.0/");
        assert_eq!(s.normalize("maven", "org/foo/1.0/foo-1.0.pom.sha1"), "org/foo/1.0/");
        assert_eq!(s.normalize("maven", "org/foo/1.0/"), "org/foo/1.0/");
    }

    #[test]
    fn maven_keeps_metadata_paths() {
        let s = IndexingStrategies::standard();
        assert_eq!(
            s.normalize("maven", "org/foo/maven-metadata.xml"),
            "org/foo/maven-metadata.xml"
        );
        assert_eq!(
            s.normalize("maven", "org/foo/maven-metadata.xml.sha256"),
            "org/foo/maven-metadata.xml.sha256"
        );
        assert_eq!(s.normalize("maven", "archetype-catalog.xml"), "archetype-catalog.xml");
    }

    #[test]
    fn npm_collapses_tarballs() {
        let s = IndexingStrategies::standard();
        assert_eq!(s.normalize("npm", "left-pad/-/left-pad-1.3.0.tgz"), "left-pad/-/");
        assert_eq!(s.normalize("npm", "left-pad/package.json"), "left-pad/package.json");
        assert_eq!(s.normalize("npm", "@scope/pkg/-/pkg-1.0.0.tgz"), "@scope/pkg/-/");
    }

    #[test]
    fn unknown_package_types_are_identity() {
        let s = IndexingStrategies::standard();
        assert_eq!(s.normalize("generic", "/a/b/c.bin"), "a/b/c.bin");
    }
}
