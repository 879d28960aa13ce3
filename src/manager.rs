//! License client - the main public API.
//!
//! The `LicenseClient` ties the pieces together:
//! - Access tokens are read from the [`TokenCache`] or fetched from the token
//!   endpoint and cached until their server-stated expiry
//! - Every validation carries a bearer token
//! - Server responses are normalized into a [`LicenseRecord`] or a typed
//!   [`LicenseClientError`]

use crate::cache::{key_fingerprint, TokenCache};
use crate::client::http::{bearer_headers, host_headers, HttpTransport, JsonRequest, Transport};
use crate::config::LicenseClientConfig;
use crate::errors::ServerError;
use crate::protocol::models::{parse_json_body, LicenseRecord, TokenGrant};
use crate::LicenseClientError;
use serde_json::{json, Map, Value};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Body field naming the license key on both endpoints.
pub const LICENSE_KEY_FIELD: &str = "license_key";

/// Message for a token failure whose body carries no `message`.
pub const TOKEN_FETCH_FAILED: &str = "Failed to obtain access token.";

/// Message for a successful validation response without license data.
pub const MISSING_DATA_MESSAGE: &str = "Invalid license server response: missing data.";

/// Status reported when a 2xx response is unusable.
pub const BAD_GATEWAY: u16 = 502;

/// Client for one license key.
///
/// Create one per license key and reuse it; it is `Send + Sync` and can be
/// shared across threads. Clients built with [`LicenseClient::new`] share a
/// process-wide token cache.
pub struct LicenseClient {
    config: LicenseClientConfig,
    license_key: String,
    transport: Arc<dyn Transport>,
    cache: TokenCache,
    last_record: RwLock<Option<LicenseRecord>>,
}

impl LicenseClient {
    /// Create a client using the reqwest transport and the process-wide
    /// in-memory token cache.
    ///
    /// # Errors
    /// - `ConfigError` - configuration is invalid or the HTTP client cannot be built
    /// - `MissingLicense` - the license key is empty
    pub fn new(
        config: LicenseClientConfig,
        license_key: impl Into<String>,
    ) -> Result<Self, LicenseClientError> {
        Self::with_cache(config, license_key, TokenCache::process_wide())
    }

    /// Create a client using the reqwest transport and the given token cache,
    /// e.g. [`TokenCache::file`] to keep tokens across restarts.
    pub fn with_cache(
        config: LicenseClientConfig,
        license_key: impl Into<String>,
        cache: TokenCache,
    ) -> Result<Self, LicenseClientError> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, license_key, transport, cache)
    }

    /// Create a client using the reqwest transport and a file-backed token
    /// cache under `dirs::data_dir()/<config.cache_namespace>/`, so tokens
    /// survive restarts and are shared with other processes.
    ///
    /// # Errors
    /// - `ConfigError` / `MissingLicense` - as for [`LicenseClient::new`]
    /// - `CacheIO` - the cache directory cannot be found or created
    pub fn with_file_cache(
        config: LicenseClientConfig,
        license_key: impl Into<String>,
    ) -> Result<Self, LicenseClientError> {
        config.validate()?;
        let cache = TokenCache::file(&config.cache_namespace)?;
        Self::with_cache(config, license_key, cache)
    }

    /// Create a client with a custom transport.
    pub fn with_transport(
        config: LicenseClientConfig,
        license_key: impl Into<String>,
        transport: Arc<dyn Transport>,
        cache: TokenCache,
    ) -> Result<Self, LicenseClientError> {
        config.validate()?;

        let license_key = license_key.into();
        if license_key.is_empty() {
            return Err(LicenseClientError::MissingLicense);
        }

        Ok(Self {
            config,
            license_key,
            transport,
            cache,
            last_record: RwLock::new(None),
        })
    }

    /// Get an access token for this client's license key.
    ///
    /// A live cached token is returned without any network call. Otherwise
    /// the token endpoint is called once and its grant cached until the
    /// server-supplied `expires_at`.
    ///
    /// # Errors
    /// - `Transport` - the token request could not be completed
    /// - `TokenFetch` - non-2xx status, `status` not `"success"`, or no `data.token`
    pub fn get_access_token(&self) -> Result<String, LicenseClientError> {
        self.cache
            .get_or_fetch(&self.license_key, || self.fetch_token())
    }

    /// Validate the license with no extra fields.
    pub fn validate(&self) -> Result<LicenseRecord, LicenseClientError> {
        self.validate_license(&Map::new())
    }

    /// Validate the license and return its entitlement data.
    ///
    /// `extra` fields are merged into the request body. The client's own
    /// license key always wins: a `license_key` entry in `extra` is dropped.
    ///
    /// # Errors
    /// - `Transport` - a request could not be completed
    /// - `TokenFetch` - no access token could be obtained
    /// - `ValidationHttp` - the server answered with a non-2xx status
    /// - `ValidationProtocol` - 2xx without non-empty `data` (status 502)
    pub fn validate_license(
        &self,
        extra: &Map<String, Value>,
    ) -> Result<LicenseRecord, LicenseClientError> {
        let token = self.get_access_token()?;

        let request = JsonRequest {
            url: self.config.validate_url(),
            headers: bearer_headers(&self.config, &token),
            body: self.validation_body(extra),
        };
        debug!(key = %key_fingerprint(&self.license_key), "sending license validation request");
        let response = self.transport.post_json(&request)?;
        let body = parse_json_body(&response.body);

        if !response.is_success() {
            let error = match body {
                Some(body) => ServerError::from_response(response.status, body),
                None => ServerError::from_raw_body(response.status, &response.body_text()),
            };
            warn!(
                key = %key_fingerprint(&self.license_key),
                status = error.status,
                message = %error.message,
                "license validation rejected"
            );
            return Err(LicenseClientError::ValidationHttp(error));
        }

        let body = body.unwrap_or_else(|| Value::String(response.body_text()));
        let Some(record) = LicenseRecord::from_body(&body) else {
            warn!(
                key = %key_fingerprint(&self.license_key),
                status = response.status,
                "license validation response has no data"
            );
            return Err(LicenseClientError::ValidationProtocol(ServerError::new(
                BAD_GATEWAY,
                MISSING_DATA_MESSAGE,
                body,
            )));
        };

        info!(key = %key_fingerprint(&self.license_key), "license validated");
        *self
            .last_record
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(record)
    }

    /// Snapshot of the most recent successfully validated record.
    pub fn last_record(&self) -> Option<LicenseRecord> {
        self.last_record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the cached token so the next call fetches a new one.
    pub fn forget_token(&self) -> Result<(), LicenseClientError> {
        self.cache.forget(&self.license_key)
    }

    /// The license key this client validates.
    pub fn license_key(&self) -> &str {
        &self.license_key
    }

    /// Get the current configuration.
    pub fn config(&self) -> &LicenseClientConfig {
        &self.config
    }

    /// The token cache in use.
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Call the token endpoint once.
    fn fetch_token(&self) -> Result<TokenGrant, LicenseClientError> {
        let request = JsonRequest {
            url: self.config.token_url(),
            headers: host_headers(&self.config),
            body: json!({ LICENSE_KEY_FIELD: self.license_key }),
        };
        debug!(key = %key_fingerprint(&self.license_key), "requesting access token");
        let response = self.transport.post_json(&request)?;
        let body = parse_json_body(&response.body);

        if response.is_success() {
            if let Some(grant) = body.as_ref().and_then(TokenGrant::from_body) {
                info!(key = %key_fingerprint(&self.license_key), "access token issued");
                return Ok(grant);
            }
        }

        let status = if response.is_success() {
            BAD_GATEWAY
        } else {
            response.status
        };
        let message = body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(TOKEN_FETCH_FAILED)
            .to_string();
        let body = body.unwrap_or_else(|| Value::String(response.body_text()));

        warn!(
            key = %key_fingerprint(&self.license_key),
            status,
            message = %message,
            "access token request failed"
        );
        Err(LicenseClientError::TokenFetch(ServerError::new(
            status, message, body,
        )))
    }

    fn validation_body(&self, extra: &Map<String, Value>) -> Value {
        let mut body = extra.clone();
        let own_key = Value::String(self.license_key.clone());
        if let Some(previous) = body.insert(LICENSE_KEY_FIELD.to_string(), own_key) {
            if previous.as_str() != Some(self.license_key.as_str()) {
                warn!(
                    key = %key_fingerprint(&self.license_key),
                    "ignoring license_key in extra validation data"
                );
            }
        }
        Value::Object(body)
    }
}

impl std::fmt::Debug for LicenseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseClient")
            .field("license_server_url", &self.config.license_server_url)
            .field("key", &key_fingerprint(&self.license_key))
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
