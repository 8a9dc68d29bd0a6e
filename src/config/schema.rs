//! Configuration schema for Repodex
//!
//! Configuration is stored at `~/.config/repodex/config.toml`

use crate::error::{RepodexError, RepodexResult};
use crate::model::{ArtifactStore, StoreKey, StoreKind, StoreType};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Physical storage settings
    pub storage: StorageConfig,

    /// Content index settings
    pub index: IndexConfig,

    /// Not-found cache settings
    pub not_found_cache: NotFoundCacheConfig,

    /// Metadata merge settings
    pub metadata: MetadataConfig,

    /// Repository definitions
    pub stores: Vec<StoreDefinition>,
}

impl Config {
    /// Convert every `[[stores]]` entry into a store definition
    pub fn artifact_stores(&self) -> RepodexResult<Vec<ArtifactStore>> {
        self.stores.iter().map(StoreDefinition::to_store).collect()
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// State directory override (index snapshot, default storage root)
    pub state_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            state_dir: None,
        }
    }
}

/// Physical storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for stored content (defaults to `<state_dir>/storage`)
    pub root: Option<PathBuf>,
}

/// Content index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Include the indexing layer in the content pipeline
    pub enabled: bool,

    /// Treat every index miss as final
    pub authoritative: bool,

    /// Batch size for paginated bulk clears
    pub page_size: usize,

    /// Width of the asynchronous index write pool
    pub writer_threads: usize,

    /// Load and save the index snapshot in the state directory
    pub persist: bool,

    /// Rebuild the index from storage when no snapshot exists
    pub warm_on_start: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            authoritative: false,
            page_size: 1000,
            writer_threads: 8,
            persist: true,
            warm_on_start: false,
        }
    }
}

/// Not-found cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotFoundCacheConfig {
    /// Seconds before a missing entry expires (0 = never)
    pub timeout_secs: u64,

    /// Upper bound for a single page of missing entries
    pub max_page_size: usize,
}

impl Default for NotFoundCacheConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 0,
            max_page_size: 1000,
        }
    }
}

/// Metadata merge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Worker pool width for per-member fetches
    pub generator_threads: usize,

    /// Pool is overloaded once pending work reaches threads * factor
    pub max_load_factor: usize,

    /// Seconds to wait for another caller's in-progress generation
    pub lock_timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            generator_threads: 50,
            max_load_factor: 10,
            lock_timeout_secs: 240,
        }
    }
}

/// One `[[stores]]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreDefinition {
    /// `package:type:name`
    pub key: String,

    /// Hosted only
    pub readonly: bool,

    /// Remote only: `file://` directory or `http(s)://` base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Group only, in precedence order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constituents: Vec<String>,

    pub disabled: bool,

    pub authoritative_index: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StoreDefinition {
    pub fn to_store(&self) -> RepodexResult<ArtifactStore> {
        let key: StoreKey = self.key.parse()?;

        let kind = match key.store_type {
            StoreType::Hosted => StoreKind::Hosted {
                readonly: self.readonly,
            },
            StoreType::Remote => StoreKind::Remote {
                url: self.url.clone(),
            },
            StoreType::Group => StoreKind::Group {
                constituents: self
                    .constituents
                    .iter()
                    .map(|c| c.parse())
                    .collect::<RepodexResult<Vec<StoreKey>>>()?,
            },
        };

        if key.store_type != StoreType::Group && !self.constituents.is_empty() {
            return Err(RepodexError::User(format!(
                "store {} is not a group but lists constituents",
                key
            )));
        }

        Ok(ArtifactStore {
            key,
            kind,
            disabled: self.disabled,
            authoritative_index: self.authoritative_index,
            description: self.description.clone(),
        })
    }
}

impl From<&ArtifactStore> for StoreDefinition {
    fn from(store: &ArtifactStore) -> Self {
        Self {
            key: store.key.to_string(),
            readonly: store.is_readonly(),
            url: store.remote_url().map(str::to_string),
            constituents: store.constituents().iter().map(|k| k.to_string()).collect(),
            disabled: store.disabled,
            authoritative_index: store.authoritative_index,
            description: store.description.clone(),
        }
    }
}
