//! Startup composition of content layers

use super::{ContentManager, DirectContentManager, IndexingContentManager};
use crate::config::Config;
use crate::executor::WorkerPool;
use crate::index::ContentIndexManager;
use crate::metadata::MavenMetadataGenerator;
use crate::nfc::NotFoundCache;
use crate::registry::StoreRegistry;
use crate::storage::ContentStore;
use std::sync::Arc;
use tracing::debug;

/// Optional layer wrapped around the direct layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentLayer {
    Indexing,
}

impl ContentLayer {
    /// Layers enabled by configuration, innermost first
    pub fn from_config(config: &Config) -> Vec<Self> {
        let mut layers = Vec::new();
        if config.index.enabled {
            layers.push(Self::Indexing);
        }
        layers
    }
}

/// Shared collaborators handed to every layer
#[derive(Clone)]
pub struct PipelineContext {
    pub storage: Arc<dyn ContentStore>,
    pub registry: Arc<dyn StoreRegistry>,
    pub nfc: Arc<dyn NotFoundCache>,
    pub index: Arc<ContentIndexManager>,
    pub generator: Arc<MavenMetadataGenerator>,
    pub index_writers: Arc<WorkerPool>,
    pub authoritative: bool,
}

pub struct ContentPipeline;

impl ContentPipeline {
    pub fn build(layers: &[ContentLayer], ctx: &PipelineContext) -> Arc<dyn ContentManager> {
        let mut manager: Arc<dyn ContentManager> = Arc::new(DirectContentManager::new(
            Arc::clone(&ctx.storage),
            Arc::clone(&ctx.registry),
            Arc::clone(&ctx.generator),
        ));

        for layer in layers {
            debug!("Adding {:?} content layer", layer);
            manager = match layer {
                ContentLayer::Indexing => Arc::new(
                    IndexingContentManager::new(
                        manager,
                        Arc::clone(&ctx.index),
                        Arc::clone(&ctx.nfc),
                        Arc::clone(&ctx.registry),
                        Arc::clone(&ctx.storage),
                        Arc::clone(&ctx.index_writers),
                    )
                    .with_authoritative(ctx.authoritative),
                ),
            };
        }
        manager
    }
}
