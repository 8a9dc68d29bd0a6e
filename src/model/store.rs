//! Repository definitions as seen by the resolution core

use super::key::{StoreKey, StoreType};
use serde::{Deserialize, Serialize};

/// Type-specific part of a store definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreKind {
    Hosted {
        #[serde(default)]
        readonly: bool,
    },
    Remote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Group {
        #[serde(default)]
        constituents: Vec<StoreKey>,
    },
}

/// A configured repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStore {
    pub key: StoreKey,
    #[serde(flatten)]
    pub kind: StoreKind,
    #[serde(default)]
    pub disabled: bool,
    /// Trust the content index exclusively; a miss is final
    #[serde(default)]
    pub authoritative_index: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ArtifactStore {
    fn with_kind(key: StoreKey, kind: StoreKind) -> Self {
        Self {
            key,
            kind,
            disabled: false,
            authoritative_index: false,
            description: None,
        }
    }

    pub fn hosted(package_type: &str, name: &str) -> Self {
        Self::with_kind(
            StoreKey::hosted(package_type, name),
            StoreKind::Hosted { readonly: false },
        )
    }

    pub fn remote(package_type: &str, name: &str, url: Option<String>) -> Self {
        Self::with_kind(StoreKey::remote(package_type, name), StoreKind::Remote { url })
    }

    pub fn group(package_type: &str, name: &str, constituents: Vec<StoreKey>) -> Self {
        Self::with_kind(
            StoreKey::group(package_type, name),
            StoreKind::Group { constituents },
        )
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        if let StoreKind::Hosted { readonly: ref mut flag } = self.kind {
            *flag = readonly;
        }
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn authoritative(mut self, authoritative: bool) -> Self {
        self.authoritative_index = authoritative;
        self
    }

    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    pub fn store_type(&self) -> StoreType {
        self.key.store_type
    }

    pub fn package_type(&self) -> &str {
        &self.key.package_type
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, StoreKind::Group { .. })
    }

    pub fn is_hosted(&self) -> bool {
        matches!(self.kind, StoreKind::Hosted { .. })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.kind, StoreKind::Remote { .. })
    }

    pub fn is_readonly(&self) -> bool {
        matches!(self.kind, StoreKind::Hosted { readonly: true })
    }

    pub fn remote_url(&self) -> Option<&str> {
        match &self.kind {
            StoreKind::Remote { url } => url.as_deref(),
            _ => None,
        }
    }

    /// Direct members of a group in precedence order; empty for concrete stores
    pub fn constituents(&self) -> &[StoreKey] {
        match &self.kind {
            StoreKind::Group { constituents } => constituents,
            _ => &[],
        }
    }
}
