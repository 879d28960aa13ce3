//! Process-local token store.

use crate::cache::format::CachedToken;
use crate::cache::TokenStore;
use crate::LicenseClientError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-memory token store shared by every client holding it.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, CachedToken>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    // Every write is a single insert or remove, so a poisoned map is still whole.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, CachedToken>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, cache_key: &str) -> Result<Option<CachedToken>, LicenseClientError> {
        Ok(self.entries().get(cache_key).cloned())
    }

    fn save(&self, cache_key: &str, entry: &CachedToken) -> Result<(), LicenseClientError> {
        self.entries().insert(cache_key.to_string(), entry.clone());
        Ok(())
    }

    fn remove(&self, cache_key: &str) -> Result<(), LicenseClientError> {
        self.entries().remove(cache_key);
        Ok(())
    }

    fn remove_stale(&self, cache_key: &str, stale: &CachedToken) -> Result<(), LicenseClientError> {
        let mut entries = self.entries();
        if entries.get(cache_key) == Some(stale) {
            entries.remove(cache_key);
        }
        Ok(())
    }
}
