//! Local directory tree content store
//!
//! Layout: `<root>/<package>/<type>/<name>/<path>`. Remote stores with an
//! upstream URL are populated on first retrieval.

use super::{child_path, ContentStore, StoreResource};
use crate::error::{RepodexError, RepodexResult};
use crate::model::{path, ArtifactStore, StoreKey, Transfer};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

pub struct FileContentStore {
    root: PathBuf,
}

impl FileContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, key: &StoreKey) -> PathBuf {
        self.root
            .join(&key.package_type)
            .join(key.store_type.as_str())
            .join(&key.name)
    }

    /// Map a store-relative path onto disk, refusing to escape the store
    fn resolve(&self, key: &StoreKey, raw: &str) -> RepodexResult<PathBuf> {
        let rel = path::normalize(raw);
        let mut target = self.store_dir(key);
        for segment in rel.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." || segment.contains('\\') {
                return Err(RepodexError::invalid_path(raw, "relative segments are not allowed"));
            }
            target.push(segment);
        }
        Ok(target)
    }

    async fn write_atomic(target: &Path, data: &[u8]) -> RepodexResult<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                RepodexError::io(format!("creating directory {}", parent.display()), e)
            })?;
        }

        let mut tmp = target.as_os_str().to_owned();
        tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data)
            .await
            .map_err(|e| RepodexError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, target)
            .await
            .map_err(|e| RepodexError::io(format!("renaming into {}", target.display()), e))
    }

    async fn fetch_upstream(url: &str, rel: &str) -> RepodexResult<Option<Vec<u8>>> {
        if let Some(dir) = url.strip_prefix("file://") {
            let source = Path::new(dir).join(rel);
            if !is_file(&source).await {
                return Ok(None);
            }
            return match fs::read(&source).await {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(RepodexError::io(format!("reading {}", source.display()), e)),
            };
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            let full = format!("{}/{}", url.trim_end_matches('/'), rel);
            return tokio::task::spawn_blocking(move || http_get(&full))
                .await
                .map_err(|e| RepodexError::TaskJoin(e.to_string()))?;
        }

        Err(RepodexError::Upstream {
            url: url.to_string(),
            reason: "unsupported URL scheme".to_string(),
        })
    }
}

fn http_get(url: &str) -> RepodexResult<Option<Vec<u8>>> {
    let upstream = |reason: String| RepodexError::Upstream {
        url: url.to_string(),
        reason,
    };

    let mut response = match ureq::get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::StatusCode(404)) | Err(ureq::Error::StatusCode(410)) => return Ok(None),
        Err(ureq::Error::StatusCode(code)) => {
            return Err(upstream(format!("server returned status {}", code)))
        }
        Err(e) => return Err(upstream(e.to_string())),
    };

    response
        .body_mut()
        .with_config()
        .limit(u64::MAX)
        .read_to_vec()
        .map(Some)
        .map_err(|e| upstream(e.to_string()))
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn retrieve(&self, store: &ArtifactStore, raw: &str) -> RepodexResult<Option<Transfer>> {
        let rel = path::normalize(raw);
        let target = self.resolve(&store.key, rel)?;

        if is_file(&target).await {
            return Ok(Some(Transfer::new(store.key.clone(), rel)));
        }

        let Some(url) = store.remote_url() else {
            return Ok(None);
        };

        match Self::fetch_upstream(url, rel).await? {
            Some(data) => {
                Self::write_atomic(&target, &data).await?;
                debug!("Cached {} from {} into {}", rel, url, store.key);
                Ok(Some(Transfer::new(store.key.clone(), rel)))
            }
            None => Ok(None),
        }
    }

    async fn exists(&self, transfer: &Transfer) -> RepodexResult<bool> {
        let target = self.resolve(&transfer.key, &transfer.path)?;
        Ok(is_file(&target).await)
    }

    async fn read(&self, transfer: &Transfer) -> RepodexResult<Vec<u8>> {
        let target = self.resolve(&transfer.key, &transfer.path)?;
        fs::read(&target).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => RepodexError::PathNotFound(target.clone()),
            _ => RepodexError::io(format!("reading {}", target.display()), e),
        })
    }

    async fn store(&self, key: &StoreKey, raw: &str, data: &[u8]) -> RepodexResult<Transfer> {
        let rel = path::normalize(raw);
        if rel.is_empty() || rel.ends_with('/') {
            return Err(RepodexError::invalid_path(raw, "not a file path"));
        }

        let target = self.resolve(key, rel)?;
        Self::write_atomic(&target, data).await?;
        Ok(Transfer::new(key.clone(), rel))
    }

    async fn delete(&self, key: &StoreKey, raw: &str) -> RepodexResult<bool> {
        let target = self.resolve(key, raw)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RepodexError::io(format!("deleting {}", target.display()), e)),
        }
    }

    async fn list(&self, key: &StoreKey, raw: &str) -> RepodexResult<Vec<StoreResource>> {
        let dir = path::normalize(raw);
        let target = self.resolve(key, dir)?;

        let mut entries = match fs::read_dir(&target).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(RepodexError::io(format!("listing {}", target.display()), e));
            }
        };

        let mut resources = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopped listing {} early: {}", target.display(), e);
                    break;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".tmp") {
                continue;
            }

            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let mut child = child_path(dir, &name);
            if is_dir {
                child.push('/');
            }
            resources.push(StoreResource { path: child });
        }

        resources.sort();
        Ok(resources)
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}
