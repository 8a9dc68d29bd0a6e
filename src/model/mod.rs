//! Identity and handle types shared by every layer

mod event;
mod key;
pub mod path;
mod store;

pub use event::{EventFlag, EventMetadata};
pub use key::{StoreKey, StoreType};
pub use path::{ConcreteResource, IndexedStorePath, Transfer};
pub use store::{ArtifactStore, StoreKind};
