//! Path-bearing identities: index entries, NFC resources and content handles

use super::key::{StoreKey, StoreType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// One content index entry.
///
/// Identity is `(package_type, store_type, store_name, path)`; the origin
/// fields are payload. Writing an entry for an existing identity replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedStorePath {
    pub package_type: String,
    pub store_type: StoreType,
    pub store_name: String,
    pub origin_store_type: StoreType,
    pub origin_store_name: String,
    pub path: String,
}

impl IndexedStorePath {
    /// Entry for `key` pointing at `origin`
    pub fn new(key: &StoreKey, origin: &StoreKey, path: impl Into<String>) -> Self {
        Self {
            package_type: key.package_type.clone(),
            store_type: key.store_type,
            store_name: key.name.clone(),
            origin_store_type: origin.store_type,
            origin_store_name: origin.name.clone(),
            path: path.into(),
        }
    }

    /// Entry whose origin is the requesting store itself
    pub fn self_entry(key: &StoreKey, path: impl Into<String>) -> Self {
        Self::new(key, key, path)
    }

    /// Lookup key; origin fields do not take part in equality
    pub fn lookup(key: &StoreKey, path: impl Into<String>) -> Self {
        Self::self_entry(key, path)
    }

    pub fn store_key(&self) -> StoreKey {
        StoreKey::new(self.package_type.clone(), self.store_type, self.store_name.clone())
    }

    pub fn origin_key(&self) -> StoreKey {
        StoreKey::new(
            self.package_type.clone(),
            self.origin_store_type,
            self.origin_store_name.clone(),
        )
    }

    pub fn is_self_entry(&self) -> bool {
        self.store_type == self.origin_store_type && self.store_name == self.origin_store_name
    }

    pub fn belongs_to(&self, key: &StoreKey) -> bool {
        self.package_type == key.package_type
            && self.store_type == key.store_type
            && self.store_name == key.name
    }

    pub fn originates_from(&self, origin: &StoreKey) -> bool {
        self.package_type == origin.package_type
            && self.origin_store_type == origin.store_type
            && self.origin_store_name == origin.name
    }
}

impl PartialEq for IndexedStorePath {
    fn eq(&self, other: &Self) -> bool {
        self.package_type == other.package_type
            && self.store_type == other.store_type
            && self.store_name == other.store_name
            && self.path == other.path
    }
}

impl Eq for IndexedStorePath {}

impl Hash for IndexedStorePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.package_type.hash(state);
        self.store_type.hash(state);
        self.store_name.hash(state);
        self.path.hash(state);
    }
}

impl fmt::Display for IndexedStorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}{} -> {}:{}",
            self.package_type,
            self.store_type,
            self.store_name,
            self.path,
            self.origin_store_type,
            self.origin_store_name
        )
    }
}

/// A (location, path) pair, as tracked by the not-found cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConcreteResource {
    pub key: StoreKey,
    pub path: String,
}

impl ConcreteResource {
    pub fn new(key: StoreKey, path: impl Into<String>) -> Self {
        Self {
            key,
            path: path.into(),
        }
    }
}

impl fmt::Display for ConcreteResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.key, self.path)
    }
}

/// Handle to content inside one physical store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transfer {
    pub key: StoreKey,
    pub path: String,
}

impl Transfer {
    pub fn new(key: StoreKey, path: impl Into<String>) -> Self {
        Self {
            key,
            path: path.into(),
        }
    }

    /// Handle to another path in the same store
    pub fn sibling(&self, path: impl Into<String>) -> Self {
        Self::new(self.key.clone(), path)
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.key, self.path)
    }
}

/// Strip leading slashes so every layer sees the same relative path
pub fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Parent directory of `path` with a trailing `/`, or `""` at the root
pub fn parent_dir(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "",
    }
}

/// Final segment of `path`
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}
