//! Repodex - artifact repository content index
//!
//! Resolves `(store, path)` requests across hosted, remote and group
//! repositories, caching where content was found, merging group metadata
//! at most once per path, and invalidating both when stores change.

pub mod cli;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod executor;
pub mod index;
pub mod invalidation;
pub mod metadata;
pub mod model;
pub mod nfc;
pub mod registry;
pub mod storage;
pub mod ui;

pub use engine::{ContentEngine, ContentEngineBuilder};
pub use error::{RepodexError, RepodexResult};
