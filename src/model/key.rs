//! Store identity

use crate::error::RepodexError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of repository a key refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    /// Locally writable repository
    Hosted,
    /// Proxy of an upstream repository
    Remote,
    /// Ordered virtual aggregate of other stores
    Group,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Remote => "remote",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreType {
    type Err = RepodexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hosted" => Ok(Self::Hosted),
            "remote" => Ok(Self::Remote),
            "group" => Ok(Self::Group),
            other => Err(RepodexError::InvalidStoreKey(other.to_string())),
        }
    }
}

/// Immutable identity of a repository: `package:type:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreKey {
    pub package_type: String,
    pub store_type: StoreType,
    pub name: String,
}

impl StoreKey {
    pub fn new(package_type: impl Into<String>, store_type: StoreType, name: impl Into<String>) -> Self {
        Self {
            package_type: package_type.into(),
            store_type,
            name: name.into(),
        }
    }

    pub fn hosted(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Hosted, name)
    }

    pub fn remote(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Remote, name)
    }

    pub fn group(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Group, name)
    }

    pub fn is_group(&self) -> bool {
        self.store_type == StoreType::Group
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package_type, self.store_type, self.name)
    }
}

impl FromStr for StoreKey {
    type Err = RepodexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RepodexError::InvalidStoreKey(s.to_string());

        let mut parts = s.splitn(3, ':');
        let (Some(package_type), Some(store_type), Some(name)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        if package_type.is_empty() || name.is_empty() {
            return Err(invalid());
        }

        let store_type = store_type.parse().map_err(|_| invalid())?;
        Ok(Self::new(package_type, store_type, name))
    }
}

impl TryFrom<String> for StoreKey {
    type Error = RepodexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StoreKey> for String {
    fn from(key: StoreKey) -> Self {
        key.to_string()
    }
}
