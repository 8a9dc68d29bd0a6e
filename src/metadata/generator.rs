//! Merged `maven-metadata.xml` for groups
//!
//! Generation for one (group, path) runs under a keyed lock; concurrent
//! callers wait for the producer and then read what it wrote. Members are
//! resolved in three passes of increasing cost (cached, downloaded,
//! generated from a hosted listing). Each pass fans out over the worker
//! pool, but results are folded into the master document in member order.

use super::cache::{MetadataCacheManager, MetadataInfo, MetadataKey};
use super::lock::{LockAttempt, Locker};
use super::merger::{finalize, merge};
use super::model::Metadata;
use super::provider::MetadataProvider;
use super::{can_process, hosted, metadata_path_for, MERGEINFO_SUFFIX, SHA256_SUFFIX};
use crate::error::{RepodexError, RepodexResult};
use crate::executor::WorkerPool;
use crate::model::{path, ArtifactStore, EventFlag, EventMetadata, StoreKey, Transfer};
use crate::storage::ContentStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

fn lock_key(group: &StoreKey, merge_path: &str) -> String {
    format!("{}-{}", group, merge_path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Cached,
    Downloaded,
    Generated,
}

/// What a pass task needs, detached from the generator's lifetime
#[derive(Clone)]
struct MemberFetcher {
    storage: Arc<dyn ContentStore>,
    cache: Arc<MetadataCacheManager>,
}

impl MemberFetcher {
    async fn fetch(&self, pass: Pass, member: &ArtifactStore, path: &str) -> Option<Metadata> {
        match pass {
            Pass::Cached => self
                .cache
                .get(&MetadataKey::new(member.key.clone(), path))
                .map(|info| info.metadata.clone()),
            Pass::Downloaded => self.download(member, path).await,
            Pass::Generated if member.is_hosted() => self.generate(member, path).await,
            Pass::Generated => None,
        }
    }

    async fn download(&self, member: &ArtifactStore, path: &str) -> Option<Metadata> {
        let transfer = match self.storage.retrieve(member, path).await {
            Ok(Some(transfer)) => transfer,
            Ok(None) => return None,
            Err(e) => {
                warn!("EXCLUDING {} from merge of {}: {}", member.key, path, e);
                return None;
            }
        };

        let parsed = self
            .storage
            .read(&transfer)
            .await
            .and_then(|data| Metadata::parse_bytes(&data, path));
        match parsed {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("EXCLUDING {} from merge of {}: {}", member.key, path, e);
                None
            }
        }
    }

    /// Listing-derived metadata lives only in the cache, never in the member
    async fn generate(&self, member: &ArtifactStore, path: &str) -> Option<Metadata> {
        match hosted::generate(self.storage.as_ref(), &member.key, path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Could not generate {} in {}: {}", path, member.key, e);
                None
            }
        }
    }
}

pub struct MavenMetadataGenerator {
    storage: Arc<dyn ContentStore>,
    cache: Arc<MetadataCacheManager>,
    pool: Arc<WorkerPool>,
    locks: Locker,
    providers: Vec<Arc<dyn MetadataProvider>>,
    lock_timeout: Duration,
}

impl MavenMetadataGenerator {
    pub fn new(
        storage: Arc<dyn ContentStore>,
        cache: Arc<MetadataCacheManager>,
        pool: Arc<WorkerPool>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            cache,
            pool,
            locks: Locker::new(),
            providers: Vec::new(),
            lock_timeout,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn cache(&self) -> &Arc<MetadataCacheManager> {
        &self.cache
    }

    /// Claim the generation lock for `(group, merge_path)`.
    pub fn lock_generation(&self, group: &StoreKey, merge_path: &str) -> LockAttempt {
        self.locks.try_lock(&lock_key(group, merge_path))
    }

    /// Serve `raw` for a group, generating the merged document if needed.
    ///
    /// `members` are the group's enabled concrete stores in resolution order.
    pub async fn generate_group_file_content(
        &self,
        group: &ArtifactStore,
        members: &[ArtifactStore],
        raw: &str,
        event: &mut EventMetadata,
    ) -> RepodexResult<Option<Transfer>> {
        let requested = path::normalize(raw);
        if !can_process(requested) {
            return Ok(None);
        }

        let merge_path = metadata_path_for(requested);
        let target = Transfer::new(group.key.clone(), merge_path.clone());

        if self.storage.exists(&target).await? {
            event.set(EventFlag::GroupMetadataExists);
            return self.materialized(&target, requested).await;
        }

        let lock_key = lock_key(&group.key, &merge_path);
        match self.lock_generation(&group.key, &merge_path) {
            LockAttempt::Acquired(_guard) => {
                // The previous holder may have finished between our check and the lock.
                if self.storage.exists(&target).await? {
                    event.set(EventFlag::GroupMetadataExists);
                    return self.materialized(&target, requested).await;
                }
                if self.generate_and_write(group, members, &merge_path).await? {
                    event.set(EventFlag::GroupMetadataGenerated);
                }
            }
            LockAttempt::Held(waiter) => {
                info!("Waiting for in-progress generation of {}", lock_key);
                if !waiter.wait(self.lock_timeout).await {
                    error!(
                        "Gave up waiting {}s for generation of {}",
                        self.lock_timeout.as_secs(),
                        lock_key
                    );
                    return Err(RepodexError::GenerationTimeout {
                        key: lock_key,
                        waited_secs: self.lock_timeout.as_secs(),
                    });
                }
            }
        }

        self.materialized(&target, requested).await
    }

    /// Merged document for `(group, path)`, from cache or freshly merged
    pub async fn generate_group_metadata(
        &self,
        group: &ArtifactStore,
        members: &[ArtifactStore],
        contributing: &mut Vec<StoreKey>,
        merge_path: &str,
    ) -> RepodexResult<Option<Arc<MetadataInfo>>> {
        let cache_key = MetadataKey::new(group.key.clone(), merge_path);
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!("Merged {} for {} served from cache", merge_path, group.key);
            return Ok(Some(cached));
        }

        let mut master = Metadata::default();
        let mut missing = members.to_vec();
        for pass in [Pass::Cached, Pass::Downloaded, Pass::Generated] {
            if missing.is_empty() {
                break;
            }
            missing = self
                .merge_pass(pass, &missing, merge_path, &mut master, contributing)
                .await;
        }

        for provider in &self.providers {
            match provider.get_metadata(&group.key, merge_path).await {
                Ok(Some(extra)) => merge(&mut master, &extra),
                Ok(None) => {}
                Err(e) => warn!("Provider {} failed for {}: {}", provider.name(), merge_path, e),
            }
        }

        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|m| m.key.to_string()).collect();
            warn!(
                "Metadata {} for {} is missing from members: {}",
                merge_path,
                group.key,
                names.join(", ")
            );
        }

        if !master.has_content() {
            info!("No metadata to merge for {} in {}", merge_path, group.key);
            return Ok(None);
        }

        finalize(&mut master);
        let info = MetadataInfo::new(master).with_merge_info(merge_info(contributing));
        self.cache.put(cache_key, info.clone());
        Ok(Some(Arc::new(info)))
    }

    async fn merge_pass(
        &self,
        pass: Pass,
        missing: &[ArtifactStore],
        merge_path: &str,
        master: &mut Metadata,
        contributing: &mut Vec<StoreKey>,
    ) -> Vec<ArtifactStore> {
        let fetcher = MemberFetcher {
            storage: Arc::clone(&self.storage),
            cache: Arc::clone(&self.cache),
        };

        let mut service = self.pool.completion_service();
        for (idx, member) in missing.iter().enumerate() {
            let fetcher = fetcher.clone();
            let member = member.clone();
            let merge_path = merge_path.to_string();
            service
                .submit(async move { (idx, fetcher.fetch(pass, &member, &merge_path).await) })
                .await;
        }

        let mut resolved: Vec<Option<Metadata>> = vec![None; missing.len()];
        for (idx, metadata) in service.drain().await {
            resolved[idx] = metadata;
        }

        let mut still_missing = Vec::new();
        for (member, metadata) in missing.iter().zip(resolved) {
            match metadata {
                Some(metadata) => {
                    merge(master, &metadata);
                    contributing.push(member.key.clone());
                    if pass != Pass::Cached {
                        self.cache.put(
                            MetadataKey::new(member.key.clone(), merge_path),
                            MetadataInfo::new(metadata),
                        );
                    }
                }
                None => still_missing.push(member.clone()),
            }
        }

        debug!(
            "{:?} pass for {}: {} resolved, {} missing",
            pass,
            merge_path,
            missing.len() - still_missing.len(),
            still_missing.len()
        );
        still_missing
    }

    async fn generate_and_write(
        &self,
        group: &ArtifactStore,
        members: &[ArtifactStore],
        merge_path: &str,
    ) -> RepodexResult<bool> {
        let mut contributing = Vec::new();
        let Some(info) = self
            .generate_group_metadata(group, members, &mut contributing, merge_path)
            .await?
        else {
            return Ok(false);
        };

        let xml = info.metadata.to_xml();
        let checksum = hex::encode(Sha256::digest(xml.as_bytes()));
        let provenance = info
            .merge_info
            .clone()
            .unwrap_or_else(|| merge_info(&contributing));

        self.storage
            .store(&group.key, merge_path, xml.as_bytes())
            .await?;
        self.storage
            .store(
                &group.key,
                &format!("{}{}", merge_path, SHA256_SUFFIX),
                checksum.as_bytes(),
            )
            .await?;
        self.storage
            .store(
                &group.key,
                &format!("{}{}", merge_path, MERGEINFO_SUFFIX),
                provenance.as_bytes(),
            )
            .await?;

        info!("Generated {} for {} from {} members", merge_path, group.key, contributing.len());
        Ok(true)
    }

    async fn materialized(
        &self,
        target: &Transfer,
        requested: &str,
    ) -> RepodexResult<Option<Transfer>> {
        let transfer = target.sibling(requested);
        Ok(self.storage.exists(&transfer).await?.then_some(transfer))
    }
}

fn merge_info(contributing: &[StoreKey]) -> String {
    contributing
        .iter()
        .map(|key| format!("{}\n", key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::provider::StaticMetadataProvider;
    use crate::metadata::Versioning;
    use crate::storage::MemoryContentStore;

    const PATH: &str = "org/example/widget/maven-metadata.xml";

    fn document(versions: &[&str]) -> String {
        Metadata {
            group_id: Some("org.example".to_string()),
            artifact_id: Some("widget".to_string()),
            versioning: Some(Versioning {
                versions: versions.iter().map(|v| v.to_string()).collect(),
                ..Default::default()
            }),
            ..Default::default()
        }
        .to_xml()
    }

    struct Fixture {
        storage: Arc<MemoryContentStore>,
        generator: MavenMetadataGenerator,
        group: ArtifactStore,
        members: Vec<ArtifactStore>,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MemoryContentStore::new());
        let a = ArtifactStore::remote("maven", "a", None);
        let b = ArtifactStore::remote("maven", "b", None);
        storage.seed_upstream(&a.key, PATH, document(&["1.0", "1.1"]));
        storage.seed_upstream(&b.key, PATH, document(&["2.0"]));

        let group = ArtifactStore::group("maven", "g", vec![a.key.clone(), b.key.clone()]);
        let generator = MavenMetadataGenerator::new(
            storage.clone(),
            Arc::new(MetadataCacheManager::new()),
            Arc::new(WorkerPool::new("metadata", 4, 10)),
            Duration::from_secs(5),
        );
        Fixture {
            storage,
            generator,
            group,
            members: vec![a, b],
        }
    }

    #[tokio::test]
    async fn merges_members_and_writes_companions() {
        let f = fixture();
        let mut event = EventMetadata::new();

        let transfer = f
            .generator
            .generate_group_file_content(&f.group, &f.members, PATH, &mut event)
            .await
            .unwrap()
            .unwrap();

        assert!(event.is_set(EventFlag::GroupMetadataGenerated));
        let merged = Metadata::parse_bytes(&f.storage.read(&transfer).await.unwrap(), PATH).unwrap();
        assert_eq!(merged.versions(), ["1.0", "1.1", "2.0"]);

        let info = f.storage.read(&transfer.sibling(format!("{}.info", PATH))).await.unwrap();
        assert_eq!(String::from_utf8(info).unwrap(), "maven:remote:a\nmaven:remote:b\n");

        let sha = f.storage.read(&transfer.sibling(format!("{}.sha256", PATH))).await.unwrap();
        assert_eq!(sha.len(), 64);
    }

    #[tokio::test]
    async fn second_request_uses_materialized_file() {
        let f = fixture();
        let mut event = EventMetadata::new();
        f.generator
            .generate_group_file_content(&f.group, &f.members, PATH, &mut event)
            .await
            .unwrap();

        let mut again = EventMetadata::new();
        let checksum = f
            .generator
            .generate_group_file_content(&f.group, &f.members, &format!("{}.sha256", PATH), &mut again)
            .await
            .unwrap();

        assert!(checksum.is_some());
        assert!(again.is_set(EventFlag::GroupMetadataExists));
        assert_eq!(f.storage.retrievals(&f.members[0].key), 1);
    }

    #[tokio::test]
    async fn cached_member_metadata_skips_download() {
        let f = fixture();
        let mut contributing = Vec::new();
        f.generator
            .cache()
            .put(
                MetadataKey::new(f.members[0].key.clone(), PATH),
                MetadataInfo::new(Metadata::parse(&document(&["0.9"]), PATH).unwrap()),
            );

        let merged = f
            .generator
            .generate_group_metadata(&f.group, &f.members, &mut contributing, PATH)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(merged.metadata.versions(), ["0.9", "2.0"]);
        assert_eq!(f.storage.retrievals(&f.members[0].key), 0);
        assert_eq!(contributing.len(), 2);
    }

    #[tokio::test]
    async fn providers_contribute_after_members() {
        let f = fixture();
        let provider = StaticMetadataProvider::new("extra")
            .with_document(PATH, Metadata::parse(&document(&["3.0"]), PATH).unwrap());
        let generator = MavenMetadataGenerator::new(
            f.storage.clone(),
            Arc::new(MetadataCacheManager::new()),
            Arc::new(WorkerPool::new("metadata", 2, 10)),
            Duration::from_secs(5),
        )
        .with_provider(Arc::new(provider));

        let mut contributing = Vec::new();
        let merged = generator
            .generate_group_metadata(&f.group, &f.members, &mut contributing, PATH)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged.metadata.versions(), ["1.0", "1.1", "2.0", "3.0"]);
    }

    #[tokio::test]
    async fn hosted_member_generated_from_listing() {
        let storage = Arc::new(MemoryContentStore::new());
        let hosted = ArtifactStore::hosted("maven", "local");
        storage
            .store(&hosted.key, "org/example/widget/5.0/widget-5.0.pom", b"<project/>")
            .await
            .unwrap();
        let group = ArtifactStore::group("maven", "g", vec![hosted.key.clone()]);
        let generator = MavenMetadataGenerator::new(
            storage.clone(),
            Arc::new(MetadataCacheManager::new()),
            Arc::new(WorkerPool::new("metadata", 2, 10)),
            Duration::from_secs(5),
        );

        let mut event = EventMetadata::new();
        let transfer = generator
            .generate_group_file_content(&group, &[hosted.clone()], PATH, &mut event)
            .await
            .unwrap()
            .unwrap();

        let merged = Metadata::parse_bytes(&storage.read(&transfer).await.unwrap(), PATH).unwrap();
        assert_eq!(merged.versions(), ["5.0"]);
        assert!(!storage
            .exists(&Transfer::new(hosted.key.clone(), PATH))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn nothing_found_is_none() {
        let f = fixture();
        let mut event = EventMetadata::new();
        let result = f
            .generator
            .generate_group_file_content(&f.group, &f.members, "org/none/maven-metadata.xml", &mut event)
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(!event.is_set(EventFlag::GroupMetadataGenerated));
    }

    #[tokio::test]
    async fn waiter_times_out_while_producer_runs() {
        let f = fixture();
        let generator = MavenMetadataGenerator::new(
            f.storage.clone(),
            Arc::new(MetadataCacheManager::new()),
            Arc::new(WorkerPool::new("metadata", 2, 10)),
            Duration::from_millis(20),
        );
        let _held = generator.lock_generation(&f.group.key, PATH);

        let mut event = EventMetadata::new();
        let err = generator
            .generate_group_file_content(&f.group, &f.members, PATH, &mut event)
            .await
            .unwrap_err();
        assert!(matches!(err, RepodexError::GenerationTimeout { .. }));
    }
}
