//! File-backed token store with atomic writes.
//!
//! Stores one JSON file per cache key under `dirs::data_dir()/<namespace>/`.
//! File names are derived from a SHA-256 of the cache key so license keys
//! never appear on disk. Each write goes to its own temp file that is renamed
//! into place, so readers see either the old or the new token.

use crate::cache::format::CachedToken;
use crate::cache::TokenStore;
use crate::LicenseClientError;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// File-based token store.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    /// Directory for token files.
    cache_dir: PathBuf,
}

impl FileTokenStore {
    /// Create a store under `dirs::data_dir()/<namespace>/`.
    pub fn new(namespace: &str) -> Result<Self, LicenseClientError> {
        let base_dir = dirs::data_dir().ok_or_else(|| {
            LicenseClientError::CacheIO("Could not find data directory".to_string())
        })?;

        Self::with_path(base_dir.join(namespace))
    }

    /// Create a store in a specific directory.
    pub fn with_path(cache_dir: impl Into<PathBuf>) -> Result<Self, LicenseClientError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).map_err(|e| {
            LicenseClientError::CacheIO(format!("Failed to create cache dir: {}", e))
        })?;
        Ok(Self { cache_dir })
    }

    /// Directory holding the token files.
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    fn token_path(&self, cache_key: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", &hash_key(cache_key)[..32]))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, cache_key: &str) -> Result<Option<CachedToken>, LicenseClientError> {
        let json = match fs::read_to_string(self.token_path(cache_key)) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LicenseClientError::CacheIO(format!(
                    "Failed to read token file: {}",
                    e
                )))
            }
        };

        CachedToken::from_json(&json).map(Some)
    }

    fn save(&self, cache_key: &str, entry: &CachedToken) -> Result<(), LicenseClientError> {
        let target_path = self.token_path(cache_key);
        let json = entry.to_json()?;

        // Every write gets its own temp file; stores and processes may race on a key.
        let mut temp = tempfile::Builder::new()
            .prefix(".token-")
            .suffix(".tmp")
            .tempfile_in(&self.cache_dir)
            .map_err(|e| LicenseClientError::CacheIO(format!("Failed to create temp file: {}", e)))?;

        temp.write_all(json.as_bytes())
            .map_err(|e| LicenseClientError::CacheIO(format!("Failed to write temp file: {}", e)))?;

        temp.persist(&target_path).map_err(|e| {
            LicenseClientError::CacheIO(format!("Failed to rename token file: {}", e))
        })?;
        Ok(())
    }

    fn remove(&self, cache_key: &str) -> Result<(), LicenseClientError> {
        match fs::remove_file(self.token_path(cache_key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LicenseClientError::CacheIO(format!(
                "Failed to delete token file: {}",
                e
            ))),
        }
    }
}

/// Hex SHA-256 of a key, used for file names and log fingerprints.
pub fn hash_key(key: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::cache_key;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn token(value: &str) -> CachedToken {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        CachedToken::new(value, at, at)
    }

    #[test]
    fn save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTokenStore::with_path(temp_dir.path()).unwrap();
        let key = cache_key("LIC-1");

        store.save(&key, &token("tok123")).unwrap();
        assert_eq!(store.load(&key).unwrap(), Some(token("tok123")));
    }

    #[test]
    fn load_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTokenStore::with_path(temp_dir.path()).unwrap();
        assert!(store.load(&cache_key("nobody")).unwrap().is_none());
    }

    #[test]
    fn save_overwrites_and_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTokenStore::with_path(temp_dir.path()).unwrap();
        let key = cache_key("LIC-1");

        store.save(&key, &token("old")).unwrap();
        store.save(&key, &token("new")).unwrap();

        assert_eq!(store.load(&key).unwrap().unwrap().token, "new");
        let files: Vec<_> = fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn file_names_do_not_contain_license_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTokenStore::with_path(temp_dir.path()).unwrap();
        store.save(&cache_key("SECRET-KEY"), &token("t")).unwrap();

        for entry in fs::read_dir(store.dir()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().into_owned();
            assert!(!name.contains("SECRET-KEY"));
        }
    }

    #[test]
    fn separate_stores_share_directory() {
        let temp_dir = TempDir::new().unwrap();
        let writer = FileTokenStore::with_path(temp_dir.path()).unwrap();
        let reader = FileTokenStore::with_path(temp_dir.path()).unwrap();
        let key = cache_key("LIC-1");

        writer.save(&key, &token("shared")).unwrap();
        assert_eq!(reader.load(&key).unwrap().unwrap().token, "shared");
    }

    #[test]
    fn corrupt_file_is_cache_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTokenStore::with_path(temp_dir.path()).unwrap();
        let key = cache_key("LIC-1");
        fs::write(store.token_path(&key), "garbage").unwrap();

        assert!(matches!(store.load(&key), Err(LicenseClientError::CacheIO(_))));
    }

    #[test]
    fn remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTokenStore::with_path(temp_dir.path()).unwrap();

        store.save(&cache_key("a"), &token("1")).unwrap();
        store.save(&cache_key("b"), &token("2")).unwrap();

        store.remove(&cache_key("a")).unwrap();
        store.remove(&cache_key("a")).unwrap();
        assert!(store.load(&cache_key("a")).unwrap().is_none());
        assert_eq!(store.load(&cache_key("b")).unwrap().unwrap().token, "2");
    }

    #[test]
    fn concurrent_stores_writing_same_key_never_fail() {
        let temp_dir = TempDir::new().unwrap();
        let key = cache_key("LIC");

        let writers: Vec<_> = (0..2)
            .map(|n| {
                let store = FileTokenStore::with_path(temp_dir.path()).unwrap();
                let key = key.clone();
                std::thread::spawn(move || {
                    let value = format!("tok-{}", n);
                    (0..500)
                        .filter(|_| store.save(&key, &token(&value)).is_err())
                        .count()
                })
            })
            .collect();

        let failures: usize = writers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(failures, 0);

        let store = FileTokenStore::with_path(temp_dir.path()).unwrap();
        let stored = store.load(&key).unwrap().unwrap().token;
        assert!(stored == "tok-0" || stored == "tok-1");
        let files: Vec<_> = fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn hash_key_is_stable() {
        assert_eq!(hash_key("k"), hash_key("k"));
        assert_ne!(hash_key("k1"), hash_key("k2"));
        assert_eq!(hash_key("k").len(), 64);
    }
}
