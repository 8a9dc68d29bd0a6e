//! Keyed producer locks for metadata generation
//!
//! At most one producer per key. Callers that find the key held get a
//! waiter that resolves when the producer's guard is dropped, bounded by a
//! timeout. Entries exist only while a producer holds them.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

type Locks = Arc<DashMap<String, watch::Sender<bool>>>;

#[derive(Default, Clone)]
pub struct Locker {
    locks: Locks,
}

pub enum LockAttempt {
    Acquired(LockGuard),
    Held(Waiter),
}

/// Releases the key and wakes waiters on drop
pub struct LockGuard {
    key: String,
    locks: Locks,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some((_, released)) = self.locks.remove(&self.key) {
            released.send_replace(true);
        }
    }
}

pub struct Waiter {
    released: watch::Receiver<bool>,
}

impl Waiter {
    /// True if the producer finished within `timeout`
    pub async fn wait(mut self, timeout: Duration) -> bool {
        // A dropped sender also means the producer is gone.
        tokio::time::timeout(timeout, self.released.wait_for(|done| *done))
            .await
            .is_ok()
    }
}

impl Locker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_lock(&self, key: &str) -> LockAttempt {
        match self.locks.entry(key.to_string()) {
            Entry::Occupied(held) => LockAttempt::Held(Waiter {
                released: held.get().subscribe(),
            }),
            Entry::Vacant(slot) => {
                let (released, _) = watch::channel(false);
                slot.insert(released);
                LockAttempt::Acquired(LockGuard {
                    key: key.to_string(),
                    locks: Arc::clone(&self.locks),
                })
            }
        }
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.locks.contains_key(key)
    }
}
