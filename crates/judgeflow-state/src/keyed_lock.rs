//! Per-key async critical sections.
//!
//! Operations on one idea hold that idea's guard for their whole
//! read-check-write sequence. Different ideas never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Recover the guard of a poisoned std mutex; the protected maps are only
/// mutated by single infallible statements.
pub(crate) fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A lazily grown table of async mutexes keyed by string.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Slots nobody holds or waits on are dropped here, so the table only
    /// keeps keys with work in flight.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = lock_recover(&self.slots);
            slots.retain(|k, slot| k == key || Arc::strong_count(slot) > 1);
            slots.entry(key.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }
}
