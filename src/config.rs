//! License client configuration.

use crate::LicenseClientError;
use std::time::Duration;

/// Default HTTP timeout for license server calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default namespace for on-disk token storage.
pub const DEFAULT_CACHE_NAMESPACE: &str = "license-client";

/// Configuration for talking to a license server.
///
/// `app_url` and `app_name` identify the calling application and are sent
/// on every request as the `x-host` and `x-host-name` headers.
#[derive(Debug, Clone)]
pub struct LicenseClientConfig {
    /// Base URL of the license server, e.g. `https://licenses.example.com`.
    pub license_server_url: String,

    /// Public URL of the calling application.
    pub app_url: String,

    /// Display name of the calling application.
    pub app_name: String,

    /// Request timeout applied by the HTTP transport.
    pub timeout: Duration,

    /// Directory name used by the file-backed token store.
    pub cache_namespace: String,
}

impl LicenseClientConfig {
    /// Create a config with the default timeout and cache namespace.
    pub fn new(
        license_server_url: impl Into<String>,
        app_url: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            license_server_url: license_server_url.into().trim_end_matches('/').to_string(),
            app_url: app_url.into(),
            app_name: app_name.into(),
            timeout: DEFAULT_TIMEOUT,
            cache_namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
        }
    }

    /// Load configuration from the process environment.
    ///
    /// Reads `LICENSE_SERVER_URL`, `APP_URL` and `APP_NAME`, plus the optional
    /// `LICENSE_CLIENT_TIMEOUT_SECS` and `LICENSE_CLIENT_CACHE_NAMESPACE`.
    pub fn from_env() -> Result<Self, LicenseClientError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, LicenseClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| {
                LicenseClientError::ConfigError(format!("{} is not set", name))
            })
        };

        let mut config = Self::new(
            required("LICENSE_SERVER_URL")?,
            lookup("APP_URL").unwrap_or_default(),
            lookup("APP_NAME").unwrap_or_default(),
        );

        if let Some(raw) = lookup("LICENSE_CLIENT_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|e| {
                LicenseClientError::ConfigError(format!(
                    "LICENSE_CLIENT_TIMEOUT_SECS must be a whole number of seconds: {}",
                    e
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(namespace) = lookup("LICENSE_CLIENT_CACHE_NAMESPACE") {
            config.cache_namespace = namespace;
        }

        config.validate()?;
        Ok(config)
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the file cache namespace.
    pub fn with_cache_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cache_namespace = namespace.into();
        self
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), LicenseClientError> {
        if self.license_server_url.is_empty() {
            return Err(LicenseClientError::ConfigError(
                "license_server_url cannot be empty".to_string(),
            ));
        }
        if !(self.license_server_url.starts_with("http://")
            || self.license_server_url.starts_with("https://"))
        {
            return Err(LicenseClientError::ConfigError(format!(
                "license_server_url must start with http:// or https://, got {}",
                self.license_server_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(LicenseClientError::ConfigError(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.cache_namespace.is_empty() {
            return Err(LicenseClientError::ConfigError(
                "cache_namespace cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Full URL of the token endpoint.
    pub fn token_url(&self) -> String {
        format!("{}/api/licenses/token", self.license_server_url)
    }

    /// Full URL of the validation endpoint.
    pub fn validate_url(&self) -> String {
        format!("{}/api/licenses/validate", self.license_server_url)
    }
}
