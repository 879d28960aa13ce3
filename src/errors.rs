//! License client error types.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Default message when the server body carries no usable message.
pub const DEFAULT_VALIDATION_MESSAGE: &str = "License validation failed.";

/// Message used when a non-JSON error body is empty.
pub const UNKNOWN_SERVER_ERROR: &str = "Unknown license server error.";

/// A failure reported by the license server.
///
/// Carries the HTTP-like status code, a human-readable message and the raw
/// response body so callers can log or inspect what the server sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    /// HTTP status code (or 502 for malformed successful responses).
    pub status: u16,

    /// Human-readable message extracted from the body.
    pub message: String,

    /// Parsed response body. A non-JSON validation error body is carried as
    /// `{"message": "<text>"}`; any other non-JSON body as a JSON string.
    pub body: Value,
}

impl ServerError {
    /// Create a server error from its parts.
    pub fn new(status: u16, message: impl Into<String>, body: Value) -> Self {
        Self {
            status,
            message: message.into(),
            body,
        }
    }

    /// Build an error from a status code and a parsed JSON body.
    ///
    /// The message is taken from `message`, then `error`, then `errors` when
    /// it is a plain string. Anything else yields [`DEFAULT_VALIDATION_MESSAGE`].
    pub fn from_response(status: u16, body: Value) -> Self {
        let message = extract_message(&body)
            .unwrap_or(DEFAULT_VALIDATION_MESSAGE)
            .to_string();
        Self::new(status, message, body)
    }

    /// Build an error from a body that was not valid JSON.
    pub fn from_raw_body(status: u16, raw: &str) -> Self {
        let text = if raw.is_empty() {
            UNKNOWN_SERVER_ERROR
        } else {
            raw
        };
        Self::from_response(status, serde_json::json!({ "message": text }))
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.message)
    }
}

/// Pick the error message out of a server body.
///
/// A non-empty field wins its slot even when it is not a string, in which
/// case no message is extracted at all.
pub fn extract_message(body: &Value) -> Option<&str> {
    let object = body.as_object()?;

    if let Some(message) = object.get("message").filter(|v| is_present(v)) {
        return message.as_str();
    }
    if let Some(error) = object.get("error").filter(|v| is_present(v)) {
        return error.as_str();
    }
    object
        .get("errors")
        .filter(|v| is_present(v))
        .and_then(Value::as_str)
}

/// Loose emptiness check used for server payloads: null, false, 0, "", "0",
/// empty arrays and empty objects all count as absent.
pub(crate) fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Errors that can occur while talking to the license server.
#[derive(Debug, Error)]
pub enum LicenseClientError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No license key provided.
    #[error("No license key provided")]
    MissingLicense,

    /// The HTTP exchange itself failed (connect, timeout, body read).
    #[error("License server transport error: {0}")]
    Transport(String),

    /// The token endpoint refused or returned an unusable token response.
    #[error("Access token request failed ({0})")]
    TokenFetch(ServerError),

    /// The validation endpoint returned a non-success status.
    #[error("License validation failed ({0})")]
    ValidationHttp(ServerError),

    /// The validation endpoint succeeded but sent no license data.
    #[error("Invalid license server response ({0})")]
    ValidationProtocol(ServerError),

    /// Token cache I/O error.
    #[error("Token cache I/O error: {0}")]
    CacheIO(String),
}

impl LicenseClientError {
    /// The server-reported failure, if this error came from the server.
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            Self::TokenFetch(e) | Self::ValidationHttp(e) | Self::ValidationProtocol(e) => Some(e),
            _ => None,
        }
    }

    /// HTTP-like status code. `None` for local and transport failures.
    pub fn status(&self) -> Option<u16> {
        self.server_error().map(|e| e.status)
    }

    /// Human-readable message suitable for showing to a user.
    pub fn message(&self) -> String {
        match self.server_error() {
            Some(e) => e.message.clone(),
            None => self.to_string(),
        }
    }

    /// Raw server response body, if any.
    pub fn body(&self) -> Option<&Value> {
        self.server_error().map(|e| &e.body)
    }

    /// True when the request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
