//! CLI command implementations

pub mod completions;
pub mod config;
pub mod content;
pub mod index;
pub mod stores;

pub use completions::execute as completions;
pub use config::execute as config;
pub use content::{delete, get, put};
pub use index::execute as index;
pub use stores::execute as stores;

use crate::config::{Config, ConfigManager};
use crate::engine::ContentEngine;
use crate::error::RepodexResult;

/// Engine over the configured on-disk storage
pub(crate) async fn open_engine(config: &Config) -> RepodexResult<ContentEngine> {
    ConfigManager::ensure_state_dirs(config).await?;
    ContentEngine::from_config(config.clone()).await
}
