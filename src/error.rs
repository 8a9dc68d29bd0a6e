//! Error types for Repodex
//!
//! All modules use `RepodexResult<T>` as their return type.

use crate::model::StoreKey;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Repodex operations
pub type RepodexResult<T> = Result<T, RepodexError>;

/// All errors that can occur in Repodex
#[derive(Error, Debug)]
pub enum RepodexError {
    // Store errors
    #[error("Store not found: {0}")]
    StoreNotFound(StoreKey),

    #[error("Invalid store key '{0}', expected <package>:<hosted|remote|group>:<name>")]
    InvalidStoreKey(String),

    #[error("Store {0} is read-only")]
    ReadonlyStore(StoreKey),

    #[error("Group {0} has no writable hosted member")]
    NoWritableMember(StoreKey),

    // Content errors
    #[error("Invalid path: {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Failed to parse metadata at {path}: {reason}")]
    MetadataParse { path: String, reason: String },

    #[error("Upstream fetch failed for {url}: {reason}")]
    Upstream { url: String, reason: String },

    // Coordination errors
    #[error("Timed out after {waited_secs}s waiting for metadata generation of {key}")]
    GenerationTimeout { key: String, waited_secs: u64 },

    #[error("Background task failed: {0}")]
    TaskJoin(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl RepodexError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a metadata parse error
    pub fn metadata_parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MetadataParse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GenerationTimeout { .. } | Self::TaskJoin(_) | Self::Upstream { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::StoreNotFound(_) => Some("Run: repodex stores list"),
            Self::InvalidStoreKey(_) => Some("Example: maven:group:public"),
            Self::ReadonlyStore(_) => Some("Set readonly = false for the store in config.toml"),
            Self::NoWritableMember(_) => Some("Add a hosted store to the group's constituents"),
            Self::ConfigInvalid { .. } => Some("Run: repodex config show"),
            Self::GenerationTimeout { .. } => Some("Retry the request; the generation is still running"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RepodexError::InvalidStoreKey("bogus".to_string());
        assert!(err.to_string().contains("Invalid store key 'bogus'"));
    }

    #[test]
    fn error_hint() {
        let key: StoreKey = "maven:group:public".parse().unwrap();
        let err = RepodexError::StoreNotFound(key);
        assert_eq!(err.hint(), Some("Run: repodex stores list"));
    }

    #[test]
    fn error_retryable() {
        let timeout = RepodexError::GenerationTimeout {
            key: "maven:group:public-a/maven-metadata.xml".to_string(),
            waited_secs: 240,
        };
        assert!(timeout.is_retryable());
        assert!(!RepodexError::Internal("boom".to_string()).is_retryable());
    }
}
