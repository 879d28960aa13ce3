//! Access token cache.
//!
//! [`TokenCache`] maps a license key to its most recent access token and
//! enforces the server-supplied absolute expiry on every read. Storage is
//! pluggable through [`TokenStore`]; expiry is never the store's concern.

pub mod file;
pub mod flight;
pub mod format;
pub mod memory;

use crate::clock::{Clock, SystemClock};
use crate::protocol::models::TokenGrant;
use crate::LicenseClientError;
use chrono::{DateTime, Utc};
use file::{hash_key, FileTokenStore};
use flight::FlightLocks;
use format::CachedToken;
use memory::MemoryTokenStore;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::{debug, warn};

/// Prefix shared by every access token cache key.
pub const CACHE_KEY_PREFIX: &str = "license-client:access-token-";

/// Cache key for a license key's access token.
pub fn cache_key(license_key: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, license_key)
}

/// Short, non-reversible label for a license key in log output.
pub fn key_fingerprint(license_key: &str) -> String {
    hash_key(license_key)[..8].to_string()
}

/// Backing storage for cached tokens.
///
/// `save` must replace any existing entry for the key in one step. Stores
/// keep whatever they are given; [`TokenCache`] decides what is expired.
pub trait TokenStore: Send + Sync {
    /// Load the entry for a cache key.
    fn load(&self, cache_key: &str) -> Result<Option<CachedToken>, LicenseClientError>;

    /// Store an entry, overwriting any previous one.
    fn save(&self, cache_key: &str, entry: &CachedToken) -> Result<(), LicenseClientError>;

    /// Remove the entry for a cache key, if any.
    fn remove(&self, cache_key: &str) -> Result<(), LicenseClientError>;

    /// Remove the entry only while it is still `stale`, so a token saved
    /// in the meantime survives.
    fn remove_stale(&self, cache_key: &str, stale: &CachedToken) -> Result<(), LicenseClientError> {
        if self.load(cache_key)?.as_ref() == Some(stale) {
            self.remove(cache_key)
        } else {
            Ok(())
        }
    }
}

static PROCESS_CACHE: Lazy<TokenCache> = Lazy::new(TokenCache::in_memory);

/// Token cache with lazy expiry and single-flight refresh.
///
/// Cloning is cheap and clones share storage and in-flight refreshes.
#[derive(Clone)]
pub struct TokenCache {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    flights: Arc<FlightLocks>,
}

impl TokenCache {
    /// Create a cache over the given store using the system clock.
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            flights: Arc::new(FlightLocks::new()),
        }
    }

    /// Create a cache over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    /// Create a cache persisted under `dirs::data_dir()/<namespace>/`.
    pub fn file(namespace: &str) -> Result<Self, LicenseClientError> {
        Ok(Self::new(Arc::new(FileTokenStore::new(namespace)?)))
    }

    /// The in-memory cache shared by every client in this process.
    pub fn process_wide() -> Self {
        PROCESS_CACHE.clone()
    }

    /// Create a cache with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn with_clock(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            flights: Arc::new(FlightLocks::new()),
        }
    }

    /// Current time according to the cache's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    /// Get the live token for a license key.
    ///
    /// Expired and missing entries both return `None`; an expired entry is
    /// dropped from the store. An unreadable entry is logged and treated as
    /// missing so the next fetch can overwrite it.
    pub fn get(&self, license_key: &str) -> Option<String> {
        let key = cache_key(license_key);
        match self.store.load(&key) {
            Ok(Some(entry)) if !entry.is_expired(self.now()) => Some(entry.token),
            Ok(Some(entry)) => {
                debug!(
                    key = %key_fingerprint(license_key),
                    expired_at = %entry.expires_at,
                    "cached access token expired"
                );
                if let Err(e) = self.store.remove_stale(&key, &entry) {
                    warn!(key = %key_fingerprint(license_key), error = %e, "failed to drop expired token");
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key_fingerprint(license_key), error = %e, "token cache read failed");
                None
            }
        }
    }

    /// Store a token until the absolute `expires_at`, replacing any previous
    /// token for the license key.
    pub fn put(
        &self,
        license_key: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), LicenseClientError> {
        let entry = CachedToken::new(token, expires_at, self.now());
        self.store.save(&cache_key(license_key), &entry)
    }

    /// Drop the cached token for a license key.
    pub fn forget(&self, license_key: &str) -> Result<(), LicenseClientError> {
        self.store.remove(&cache_key(license_key))
    }

    /// Return the cached token, or run `fetch` and cache its grant.
    ///
    /// Concurrent callers for the same license key share one fetch: the
    /// first runs it, the rest wait and then find the fresh token in the
    /// cache. A failed fetch is returned to the caller that ran it; waiting
    /// callers then try their own fetch.
    pub fn get_or_fetch<F>(&self, license_key: &str, fetch: F) -> Result<String, LicenseClientError>
    where
        F: FnOnce() -> Result<TokenGrant, LicenseClientError>,
    {
        if let Some(token) = self.get(license_key) {
            debug!(key = %key_fingerprint(license_key), "access token cache hit");
            return Ok(token);
        }

        self.flights.run(&cache_key(license_key), || -> Result<String, LicenseClientError> {
            if let Some(token) = self.get(license_key) {
                debug!(key = %key_fingerprint(license_key), "access token refreshed by another caller");
                return Ok(token);
            }

            debug!(key = %key_fingerprint(license_key), "access token cache miss, fetching");
            let grant = fetch()?;
            self.store_grant(license_key, &grant);
            Ok(grant.token)
        })
    }

    // The token is handed back even when it cannot be cached.
    fn store_grant(&self, license_key: &str, grant: &TokenGrant) {
        let key = key_fingerprint(license_key);
        match grant.expires_at {
            None => warn!(key = %key, "access token has no usable expires_at, not caching"),
            Some(expires_at) if expires_at <= self.now() => {
                warn!(key = %key, expires_at = %expires_at, "access token already expired, not caching")
            }
            Some(expires_at) => match self.put(license_key, &grant.token, expires_at) {
                Ok(()) => debug!(key = %key, expires_at = %expires_at, "access token cached"),
                Err(e) => warn!(key = %key, error = %e, "failed to cache access token"),
            },
        }
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("in_flight", &self.flights.active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    fn mock_cache() -> (TokenCache, Arc<MockClock>, Arc<MemoryTokenStore>) {
        let clock = Arc::new(MockClock::from_rfc3339("2030-01-01T00:00:00Z"));
        let store = Arc::new(MemoryTokenStore::new());
        let cache = TokenCache::with_clock(store.clone(), clock.clone());
        (cache, clock, store)
    }

    fn grant(token: &str, expires_at: Option<DateTime<Utc>>) -> TokenGrant {
        TokenGrant {
            token: token.to_string(),
            expires_at,
        }
    }

    #[test]
    fn cache_key_format() {
        assert_eq!(cache_key("ABC-123"), "license-client:access-token-ABC-123");
    }

    #[test]
    fn fingerprint_hides_key() {
        let fp = key_fingerprint("ABC-123");
        assert_eq!(fp.len(), 8);
        assert!(!fp.contains("ABC"));
    }

    #[test]
    fn put_then_get_before_expiry() {
        let (cache, clock, store) = mock_cache();
        cache
            .put("LIC", "tok", clock.now_utc() + Duration::hours(1))
            .unwrap();

        assert_eq!(cache.get("LIC"), Some("tok".to_string()));
        assert!(store.load(&cache_key("LIC")).unwrap().is_some());
    }

    #[test]
    fn expired_token_is_absent() {
        let (cache, clock, _) = mock_cache();
        cache
            .put("LIC", "tok", clock.now_utc() - Duration::seconds(1))
            .unwrap();

        assert_eq!(cache.get("LIC"), None);
    }

    #[test]
    fn expiry_checked_at_read_time() {
        let (cache, clock, _) = mock_cache();
        cache
            .put("LIC", "tok", clock.now_utc() + Duration::minutes(10))
            .unwrap();

        clock.advance(Duration::minutes(9));
        assert_eq!(cache.get("LIC"), Some("tok".to_string()));

        clock.advance(Duration::minutes(1));
        assert_eq!(cache.get("LIC"), None);
    }

    #[test]
    fn expired_token_is_dropped_from_store() {
        let (cache, clock, store) = mock_cache();
        cache
            .put("LIC", "tok", clock.now_utc() + Duration::minutes(5))
            .unwrap();
        cache
            .put("OTHER", "tok", clock.now_utc() + Duration::hours(1))
            .unwrap();

        clock.advance(Duration::minutes(5));
        assert_eq!(cache.get("LIC"), None);
        assert_eq!(store.len(), 1);
        assert!(store.load(&cache_key("LIC")).unwrap().is_none());
        assert_eq!(cache.get("OTHER"), Some("tok".to_string()));
    }

    #[test]
    fn put_overwrites_previous_token() {
        let (cache, clock, store) = mock_cache();
        let later = clock.now_utc() + Duration::hours(1);
        cache.put("LIC", "old", later).unwrap();
        cache.put("LIC", "new", later).unwrap();

        assert_eq!(cache.get("LIC"), Some("new".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn keys_are_independent() {
        let (cache, clock, _) = mock_cache();
        cache
            .put("A", "tok-a", clock.now_utc() + Duration::hours(1))
            .unwrap();

        assert_eq!(cache.get("B"), None);
    }

    #[test]
    fn forget_removes_token() {
        let (cache, clock, _) = mock_cache();
        cache
            .put("LIC", "tok", clock.now_utc() + Duration::hours(1))
            .unwrap();
        cache.forget("LIC").unwrap();
        assert_eq!(cache.get("LIC"), None);
    }

    #[test]
    fn get_or_fetch_hit_skips_fetch() {
        let (cache, clock, _) = mock_cache();
        cache
            .put("LIC", "cached", clock.now_utc() + Duration::hours(1))
            .unwrap();

        let token = cache
            .get_or_fetch("LIC", || panic!("fetch must not run on a cache hit"))
            .unwrap();
        assert_eq!(token, "cached");
    }

    #[test]
    fn get_or_fetch_caches_grant() {
        let (cache, clock, _) = mock_cache();
        let expires = clock.now_utc() + Duration::hours(1);

        let token = cache
            .get_or_fetch("LIC", || Ok(grant("fresh", Some(expires))))
            .unwrap();
        assert_eq!(token, "fresh");
        assert_eq!(cache.get("LIC"), Some("fresh".to_string()));
    }

    #[test]
    fn get_or_fetch_without_expiry_returns_but_does_not_cache() {
        let (cache, _, store) = mock_cache();

        let token = cache.get_or_fetch("LIC", || Ok(grant("t", None))).unwrap();
        assert_eq!(token, "t");
        assert!(store.is_empty());
    }

    #[test]
    fn get_or_fetch_with_past_expiry_does_not_cache() {
        let (cache, clock, store) = mock_cache();
        let past = clock.now_utc() - Duration::minutes(1);

        let token = cache.get_or_fetch("LIC", || Ok(grant("t", Some(past)))).unwrap();
        assert_eq!(token, "t");
        assert!(store.is_empty());
    }

    #[test]
    fn get_or_fetch_propagates_fetch_error() {
        let (cache, _, store) = mock_cache();

        let result = cache.get_or_fetch("LIC", || {
            Err(LicenseClientError::Transport("down".to_string()))
        });
        assert!(matches!(result, Err(LicenseClientError::Transport(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_callers_share_one_fetch() {
        let (cache, clock, _) = mock_cache();
        let expires = clock.now_utc() + Duration::hours(1);
        let fetches = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let cache = cache.clone();
                let fetches = Arc::clone(&fetches);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_fetch("LIC", || {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(20));
                        Ok(grant("shared", Some(expires)))
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), "shared");
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn process_wide_cache_is_shared() {
        let a = TokenCache::process_wide();
        let b = TokenCache::process_wide();
        let key = "process-wide-test-key";

        a.put(key, "tok", Utc::now() + Duration::hours(1)).unwrap();
        assert_eq!(b.get(key), Some("tok".to_string()));
        a.forget(key).unwrap();
    }
}
