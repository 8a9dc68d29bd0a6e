//! Engine facade
//!
//! Wires storage, registry, caches, the content pipeline and invalidation
//! listeners together from a [`Config`]. Registry mutations go through the
//! engine so listeners see the old definition before it is replaced.

use crate::config::{Config, ConfigManager};
use crate::content::{ContentLayer, ContentManager, ContentPipeline, PipelineContext};
use crate::error::{RepodexError, RepodexResult};
use crate::executor::WorkerPool;
use crate::index::{warmer, ContentIndexManager, IndexingStrategies, WarmReport};
use crate::invalidation::{
    ContentIndexListener, EventDispatcher, InvalidationListener, MetadataMergeListener, StoreEvent,
};
use crate::metadata::{MavenMetadataGenerator, MetadataCacheManager, MetadataProvider};
use crate::model::{path, ArtifactStore, EventMetadata, StoreKey, Transfer};
use crate::nfc::{MemoryNotFoundCache, NotFoundCache};
use crate::registry::{MemoryStoreRegistry, StoreRegistry};
use crate::storage::{ContentStore, FileContentStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct ContentEngineBuilder {
    config: Config,
    storage: Option<Arc<dyn ContentStore>>,
    providers: Vec<Arc<dyn MetadataProvider>>,
    snapshot_path: Option<PathBuf>,
}

impl ContentEngineBuilder {
    /// Replace the on-disk storage derived from configuration
    pub fn storage(mut self, storage: Arc<dyn ContentStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Where the index snapshot is loaded from and saved to
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub async fn build(self) -> RepodexResult<ContentEngine> {
        let config = self.config;

        let registry = Arc::new(MemoryStoreRegistry::with_stores(config.artifact_stores()?));
        let storage = self.storage.unwrap_or_else(|| {
            Arc::new(FileContentStore::new(ConfigManager::storage_root(&config)))
        });
        let nfc = Arc::new(MemoryNotFoundCache::new(
            config.not_found_cache.timeout_secs,
            config.not_found_cache.max_page_size,
        ));
        let index = Arc::new(ContentIndexManager::new(
            IndexingStrategies::standard(),
            config.index.page_size,
        ));
        let metadata_cache = Arc::new(MetadataCacheManager::new());

        let metadata_pool = Arc::new(WorkerPool::new(
            "metadata",
            config.metadata.generator_threads,
            config.metadata.max_load_factor,
        ));
        let index_writers = Arc::new(WorkerPool::new(
            "index-writer",
            config.index.writer_threads,
            config.metadata.max_load_factor,
        ));

        let generator = self.providers.into_iter().fold(
            MavenMetadataGenerator::new(
                Arc::clone(&storage),
                Arc::clone(&metadata_cache),
                metadata_pool,
                Duration::from_secs(config.metadata.lock_timeout_secs),
            ),
            |generator, provider| generator.with_provider(provider),
        );

        let ctx = PipelineContext {
            storage: Arc::clone(&storage),
            registry: registry.clone(),
            nfc: nfc.clone(),
            index: Arc::clone(&index),
            generator: Arc::new(generator),
            index_writers: Arc::clone(&index_writers),
            authoritative: config.index.authoritative,
        };
        let content = ContentPipeline::build(&ContentLayer::from_config(&config), &ctx);

        let mut dispatcher = EventDispatcher::new();
        let index_listener: Arc<dyn InvalidationListener> = Arc::new(ContentIndexListener::new(
            Arc::clone(&index),
            registry.clone(),
            nfc.clone(),
        ));
        let metadata_listener: Arc<dyn InvalidationListener> = Arc::new(MetadataMergeListener::new(
            Arc::clone(&metadata_cache),
            Arc::clone(&index),
            nfc.clone(),
            registry.clone(),
            Arc::clone(&storage),
        ));
        dispatcher.register(index_listener);
        dispatcher.register(metadata_listener);

        let snapshot_path = config
            .index
            .persist
            .then(|| {
                self.snapshot_path
                    .unwrap_or_else(|| ConfigManager::index_snapshot_path(&config))
            });

        let engine = ContentEngine {
            config,
            storage,
            registry,
            nfc,
            index,
            metadata_cache,
            content,
            dispatcher,
            index_writers,
            snapshot_path,
        };
        engine.restore_index().await?;
        Ok(engine)
    }
}

pub struct ContentEngine {
    config: Config,
    storage: Arc<dyn ContentStore>,
    registry: Arc<MemoryStoreRegistry>,
    nfc: Arc<MemoryNotFoundCache>,
    index: Arc<ContentIndexManager>,
    metadata_cache: Arc<MetadataCacheManager>,
    content: Arc<dyn ContentManager>,
    dispatcher: EventDispatcher,
    index_writers: Arc<WorkerPool>,
    snapshot_path: Option<PathBuf>,
}

impl ContentEngine {
    pub fn builder(config: Config) -> ContentEngineBuilder {
        ContentEngineBuilder {
            config,
            storage: None,
            providers: Vec::new(),
            snapshot_path: None,
        }
    }

    pub async fn from_config(config: Config) -> RepodexResult<Self> {
        Self::builder(config).build().await
    }

    async fn restore_index(&self) -> RepodexResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let exists = path.exists();
        let loaded = self.index.load(path).await;
        if loaded > 0 {
            info!("Restored {} index entries from {}", loaded, path.display());
        } else if !exists && self.config.index.warm_on_start {
            let report = self.warm_index().await?;
            info!(
                "No index snapshot, warmed {} stores ({} entries)",
                report.stores,
                report.self_entries + report.group_entries
            );
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn ContentStore> {
        &self.storage
    }

    pub fn registry(&self) -> &Arc<MemoryStoreRegistry> {
        &self.registry
    }

    pub fn nfc(&self) -> &Arc<MemoryNotFoundCache> {
        &self.nfc
    }

    pub fn index(&self) -> &Arc<ContentIndexManager> {
        &self.index
    }

    pub fn metadata_cache(&self) -> &Arc<MetadataCacheManager> {
        &self.metadata_cache
    }

    /// Top-level store lookup; an unknown key is a caller error
    pub async fn store_definition(&self, key: &StoreKey) -> RepodexResult<ArtifactStore> {
        self.registry
            .get_artifact_store(key)
            .await?
            .ok_or_else(|| RepodexError::StoreNotFound(key.clone()))
    }

    pub async fn retrieve(&self, key: &StoreKey, path: &str) -> RepodexResult<Option<Transfer>> {
        let store = self.store_definition(key).await?;
        let mut event = EventMetadata::new();
        debug!("[{}] retrieve {} from {}", event.request_id(), path, key);
        self.content.retrieve(&store, path, &mut event).await
    }

    pub async fn read(&self, transfer: &Transfer) -> RepodexResult<Vec<u8>> {
        self.storage.read(transfer).await
    }

    /// Resolve and read in one step
    pub async fn get(&self, key: &StoreKey, path: &str) -> RepodexResult<Option<Vec<u8>>> {
        match self.retrieve(key, path).await? {
            Some(transfer) => Ok(Some(self.read(&transfer).await?)),
            None => Ok(None),
        }
    }

    pub async fn store(&self, key: &StoreKey, path: &str, data: &[u8]) -> RepodexResult<Transfer> {
        let store = self.store_definition(key).await?;
        let mut event = EventMetadata::new();
        debug!("[{}] store {} in {}", event.request_id(), path, key);
        let transfer = self.content.store(&store, path, data, &mut event).await?;

        self.dispatcher
            .dispatch(&StoreEvent::FileStored {
                key: transfer.key.clone(),
                path: transfer.path.clone(),
            })
            .await;
        Ok(transfer)
    }

    pub async fn delete(&self, key: &StoreKey, path: &str) -> RepodexResult<bool> {
        let store = self.store_definition(key).await?;
        let mut event = EventMetadata::new();
        debug!("[{}] delete {} from {}", event.request_id(), path, key);
        let removed = self.content.delete(&store, path, &mut event).await?;

        let path = path::normalize(path);
        for origin in &removed {
            self.dispatcher
                .dispatch(&StoreEvent::FileDeleted {
                    key: origin.clone(),
                    path: path.to_string(),
                })
                .await;
        }
        Ok(!removed.is_empty())
    }

    /// Create or replace a store definition
    pub async fn update_store(&self, store: ArtifactStore) -> RepodexResult<()> {
        if let Some(old) = self.registry.get_artifact_store(&store.key).await? {
            self.dispatcher
                .dispatch(&StoreEvent::Updated {
                    old,
                    new: store.clone(),
                })
                .await;
        }
        info!("Saving store definition {}", store.key);
        self.registry.put_store(store).await;
        Ok(())
    }

    pub async fn delete_store(&self, key: &StoreKey) -> RepodexResult<bool> {
        let Some(store) = self.registry.get_artifact_store(key).await? else {
            return Ok(false);
        };

        self.dispatcher
            .dispatch(&StoreEvent::Deleted { store })
            .await;
        self.registry.remove_store(key).await;
        info!("Deleted store definition {}", key);
        Ok(true)
    }

    /// Drop cached content whose time-to-live ran out
    pub async fn expire(&self, key: &StoreKey, path: &str) -> RepodexResult<()> {
        let path = path::normalize(path);
        if !self.storage.delete(key, path).await? {
            debug!("Expired {} was not cached in {}", path, key);
        }
        self.dispatcher
            .dispatch(&StoreEvent::ContentExpired {
                key: key.clone(),
                path: path.to_string(),
            })
            .await;
        Ok(())
    }

    pub async fn dispatch(&self, event: StoreEvent) {
        self.dispatcher.dispatch(&event).await;
    }

    pub async fn warm_index(&self) -> RepodexResult<WarmReport> {
        warmer::warm(&self.index, self.registry.as_ref(), self.storage.as_ref()).await
    }

    pub fn clear_not_found(&self) {
        self.nfc.clear_all();
    }

    /// Finish queued index writes
    pub async fn flush(&self) {
        self.index_writers.drain().await;
    }

    /// Finish queued index writes, then persist the index
    pub async fn shutdown(&self) -> RepodexResult<()> {
        self.flush().await;

        if let Some(path) = &self.snapshot_path {
            if let Err(e) = self.index.save(path).await {
                warn!("Could not persist content index: {}", e);
                return Err(e);
            }
            debug!("Saved {} index entries to {}", self.index.index().len(), path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryContentStore;
    use tempfile::TempDir;

    fn config() -> Config {
        let mut config: Config = toml::from_str(
            r#"
            [[stores]]
            key = "maven:hosted:local"

            [[stores]]
            key = "maven:remote:central"

            [[stores]]
            key = "maven:group:public"
            constituents = ["maven:hosted:local", "maven:remote:central"]
            "#,
        )
        .unwrap();
        config.index.persist = false;
        config
    }

    async fn engine(storage: Arc<MemoryContentStore>) -> ContentEngine {
        ContentEngine::builder(config())
            .storage(storage)
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_store_is_an_error() {
        let engine = engine(Arc::new(MemoryContentStore::new())).await;
        let err = engine
            .retrieve(&StoreKey::group("maven", "nope"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, RepodexError::StoreNotFound(_)));
    }

    #[tokio::test]
    async fn group_resolves_through_remote() {
        let storage = Arc::new(MemoryContentStore::new());
        let central = StoreKey::remote("maven", "central");
        storage.seed_upstream(&central, "org/a/1.0/a-1.0.jar", b"jar".to_vec());
        let engine = engine(storage).await;

        let data = engine
            .get(&StoreKey::group("maven", "public"), "org/a/1.0/a-1.0.jar")
            .await
            .unwrap();
        assert_eq!(data.as_deref(), Some(b"jar".as_slice()));

        engine.flush().await;
        assert_eq!(
            engine
                .index()
                .get_indexed_store_key(&StoreKey::group("maven", "public"), "org/a/1.0/a-1.0.jar"),
            Some(central)
        );
    }

    #[tokio::test]
    async fn deleting_a_store_forgets_it() {
        let engine = engine(Arc::new(MemoryContentStore::new())).await;
        let local = StoreKey::hosted("maven", "local");
        engine.store(&local, "org/a/1.0/a-1.0.pom", b"<project/>").await.unwrap();

        assert!(engine.delete_store(&local).await.unwrap());
        assert_eq!(engine.index().count_in_store(&local), 0);
        assert!(matches!(
            engine.retrieve(&local, "org/a/1.0/a-1.0.pom").await,
            Err(RepodexError::StoreNotFound(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_survives_restart() {
        let dir = TempDir::new().unwrap();
        let snapshot = dir.path().join("index.json");
        let storage = Arc::new(MemoryContentStore::new());
        let mut config = config();
        config.index.persist = true;

        let first = ContentEngine::builder(config.clone())
            .storage(storage.clone())
            .snapshot_path(&snapshot)
            .build()
            .await
            .unwrap();
        let local = StoreKey::hosted("maven", "local");
        first.store(&local, "org/a/1.0/a-1.0.pom", b"<project/>").await.unwrap();
        first.shutdown().await.unwrap();

        let second = ContentEngine::builder(config)
            .storage(storage)
            .snapshot_path(&snapshot)
            .build()
            .await
            .unwrap();
        assert_eq!(
            second.index().get_indexed_store_key(&local, "org/a/1.0/a-1.0.pom"),
            Some(local)
        );
    }

    #[tokio::test]
    async fn expire_accepts_a_leading_slash() {
        let storage = Arc::new(MemoryContentStore::new());
        let engine = engine(storage.clone()).await;
        let local = StoreKey::hosted("maven", "local");
        let pom = "org/a/1.0/a-1.0.pom";
        engine.store(&local, pom, b"<project/>").await.unwrap();

        engine.expire(&local, "/org/a/1.0/a-1.0.pom").await.unwrap();

        assert!(!storage.exists(&Transfer::new(local.clone(), pom)).await.unwrap());
        assert_eq!(engine.index().get_indexed_store_key(&local, pom), None);
    }
}
