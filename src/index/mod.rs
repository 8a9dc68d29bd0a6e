//! Content index: (requesting store, path) to origin store
//!
//! A denormalized cache that lets group lookups skip membership walks. It is
//! never the source of truth; every entry can be rebuilt by resolution or by
//! the warmer.

mod manager;
mod store;
mod strategy;
pub mod warmer;

pub use manager::ContentIndexManager;
pub use store::ContentIndex;
pub use strategy::{IndexingStrategies, IndexingStrategy};
pub use warmer::WarmReport;
