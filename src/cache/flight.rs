//! Per-key single-flight locks.
//!
//! Callers refreshing the same cache key run one at a time; callers for
//! different keys never block each other. Slots are dropped once no caller
//! holds or waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Registry of per-key locks.
#[derive(Debug, Default)]
pub struct FlightLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FlightLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn run<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let result = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        // Clones only happen under the registry lock, so the count is stable here.
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
        result
    }

    /// Number of keys with a caller holding or waiting on the lock.
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
