//! Configuration management for Repodex

pub mod schema;

pub use schema::{
    Config, GeneralConfig, IndexConfig, MetadataConfig, NotFoundCacheConfig, StorageConfig,
    StoreDefinition,
};

use crate::error::{RepodexError, RepodexResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("repodex")
            .join("config.toml")
    }

    /// Get the default state directory path
    pub fn default_state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("repodex")
    }

    /// State directory honoring the `general.state_dir` override
    pub fn state_dir(config: &Config) -> PathBuf {
        config
            .general
            .state_dir
            .clone()
            .unwrap_or_else(Self::default_state_dir)
    }

    /// Storage root honoring the `storage.root` override
    pub fn storage_root(config: &Config) -> PathBuf {
        config
            .storage
            .root
            .clone()
            .unwrap_or_else(|| Self::state_dir(config).join("storage"))
    }

    /// Location of the persisted content index snapshot
    pub fn index_snapshot_path(config: &Config) -> PathBuf {
        Self::state_dir(config).join("content-index.json")
    }

    /// Load configuration, falling back to defaults if not present
    pub async fn load(&self) -> RepodexResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> RepodexResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| RepodexError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| RepodexError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> RepodexResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            RepodexError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> RepodexResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RepodexError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure the state and storage directories exist
    pub async fn ensure_state_dirs(config: &Config) -> RepodexResult<()> {
        for dir in [Self::state_dir(config), Self::storage_root(config)] {
            fs::create_dir_all(&dir).await.map_err(|e| {
                RepodexError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert!(config.index.enabled);
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.index.page_size = 25;
        config.stores.push(StoreDefinition {
            key: "maven:hosted:local".to_string(),
            ..Default::default()
        });

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.index.page_size, 25);
        assert_eq!(loaded.stores[0].key, "maven:hosted:local");
    }

    #[tokio::test]
    async fn invalid_toml_is_reported_with_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "[index\npage_size = ").await.unwrap();

        let err = ConfigManager::with_path(path.clone()).load().await.unwrap_err();
        assert!(matches!(err, RepodexError::ConfigInvalid { path: p, .. } if p == path));
    }

    #[test]
    fn state_dir_override() {
        let mut config = Config::default();
        config.general.state_dir = Some(PathBuf::from("/tmp/rdx"));
        assert_eq!(
            ConfigManager::storage_root(&config),
            PathBuf::from("/tmp/rdx/storage")
        );
        assert_eq!(
            ConfigManager::index_snapshot_path(&config),
            PathBuf::from("/tmp/rdx/content-index.json")
        );
    }
}
