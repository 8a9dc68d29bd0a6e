//! Metadata sources beyond repository members

use super::model::Metadata;
use crate::error::RepodexResult;
use crate::model::StoreKey;
use async_trait::async_trait;
use std::collections::HashMap;

/// Contributes extra metadata to a group merge, after all members
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn get_metadata(&self, group: &StoreKey, path: &str) -> RepodexResult<Option<Metadata>>;
}

/// Fixed documents by path, for every group
pub struct StaticMetadataProvider {
    name: String,
    documents: HashMap<String, Metadata>,
}

impl StaticMetadataProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: HashMap::new(),
        }
    }

    pub fn with_document(mut self, path: impl Into<String>, metadata: Metadata) -> Self {
        self.documents.insert(path.into(), metadata);
        self
    }
}

#[async_trait]
impl MetadataProvider for StaticMetadataProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_metadata(&self, _group: &StoreKey, path: &str) -> RepodexResult<Option<Metadata>> {
        Ok(self.documents.get(path).cloned())
    }
}
