//! HTTP transport for the license server.
//!
//! The license flow only needs "POST this JSON, give me status and body", so
//! the transport is a small trait. [`HttpTransport`] is the reqwest-based
//! implementation; tests substitute their own.

use crate::config::LicenseClientConfig;
use crate::LicenseClientError;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;

/// Header carrying the calling application's URL.
pub const X_HOST: &str = "x-host";

/// Header carrying the calling application's name.
pub const X_HOST_NAME: &str = "x-host-name";

/// A JSON POST to the license server.
#[derive(Debug, Clone)]
pub struct JsonRequest {
    /// Absolute endpoint URL.
    pub url: String,

    /// Headers in send order.
    pub headers: Vec<(String, String)>,

    /// JSON body.
    pub body: Value,
}

impl JsonRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a license server response.
#[derive(Debug, Clone)]
pub struct ServerResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl ServerResponse {
    /// Create a response from a status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Blocking request/response exchange with the license server.
///
/// Implementations report network-level failures as
/// [`LicenseClientError::Transport`] and return every HTTP response, whatever
/// its status, as `Ok`.
pub trait Transport: Send + Sync {
    /// Send a JSON POST and return the response.
    fn post_json(&self, request: &JsonRequest) -> Result<ServerResponse, LicenseClientError>;
}

/// reqwest-based transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport using the config's timeout.
    pub fn new(config: &LicenseClientConfig) -> Result<Self, LicenseClientError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                LicenseClientError::ConfigError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, request: &JsonRequest) -> Result<ServerResponse, LicenseClientError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .json(&request.body)
            .send()
            .map_err(|e| LicenseClientError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| LicenseClientError::Transport(format!("Failed to read body: {}", e)))?
            .to_vec();

        Ok(ServerResponse { status, body })
    }
}

/// Headers identifying the calling application, sent on every request.
pub fn host_headers(config: &LicenseClientConfig) -> Vec<(String, String)> {
    vec![
        (X_HOST.to_string(), config.app_url.clone()),
        (X_HOST_NAME.to_string(), config.app_name.clone()),
        (CONTENT_TYPE.as_str().to_string(), "application/json".to_string()),
        (ACCEPT.as_str().to_string(), "application/json".to_string()),
        (USER_AGENT.as_str().to_string(), build_user_agent(config)),
    ]
}

/// Host headers plus `Authorization: Bearer <token>`.
pub fn bearer_headers(config: &LicenseClientConfig, token: &str) -> Vec<(String, String)> {
    let mut headers = host_headers(config);
    headers.push((AUTHORIZATION.as_str().to_string(), format!("Bearer {}", token)));
    headers
}

/// Build a User-Agent string from config.
///
/// Format: `license-client/<version> <app_name>`, or without the app part
/// when no name is configured.
pub fn build_user_agent(config: &LicenseClientConfig) -> String {
    let version = env!("CARGO_PKG_VERSION");
    if config.app_name.is_empty() {
        format!("license-client/{}", version)
    } else {
        format!("license-client/{} {}", version, config.app_name)
    }
}
