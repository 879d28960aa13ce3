//! Stored form of a cached access token.

use crate::LicenseClientError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An access token together with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
    /// Opaque bearer token.
    pub token: String,

    /// Server-supplied absolute expiry.
    pub expires_at: DateTime<Utc>,

    /// When the token was written to the cache.
    pub cached_at: DateTime<Utc>,
}

impl CachedToken {
    /// Create a record for a token cached at `now`.
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
            cached_at: now,
        }
    }

    /// A token is expired from its expiry instant onwards.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Serialize the record to JSON.
    pub fn to_json(&self) -> Result<String, LicenseClientError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LicenseClientError::CacheIO(format!("Failed to serialize token: {}", e)))
    }

    /// Deserialize a record from JSON.
    pub fn from_json(json: &str) -> Result<Self, LicenseClientError> {
        serde_json::from_str(json)
            .map_err(|e| LicenseClientError::CacheIO(format!("Failed to deserialize token: {}", e)))
    }
}
