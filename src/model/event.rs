//! Request-scoped metadata carried through a single resolution

use std::collections::HashSet;
use uuid::Uuid;

/// Signals set by inner layers for outer layers of the same request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFlag {
    /// Merged metadata was already materialized in the group's storage
    GroupMetadataExists,
    /// Merged metadata was produced during this request
    GroupMetadataGenerated,
    /// The miss is transient and must not be recorded in the not-found cache
    TransientMiss,
}

#[derive(Debug, Clone)]
pub struct EventMetadata {
    request_id: Uuid,
    flags: HashSet<EventFlag>,
}

impl EventMetadata {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            flags: HashSet::new(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn set(&mut self, flag: EventFlag) {
        self.flags.insert(flag);
    }

    pub fn is_set(&self, flag: EventFlag) -> bool {
        self.flags.contains(&flag)
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}
