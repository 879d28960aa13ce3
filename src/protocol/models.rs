//! License server response shapes and field extraction.
//!
//! Bodies are handled as `serde_json::Value` so that odd server payloads
//! (empty arrays for empty objects, numbers for timestamps) end up as typed
//! client errors rather than deserialization failures.

use crate::errors::is_present;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token endpoint `status` value meaning the request was granted.
pub const STATUS_SUCCESS: &str = "success";

/// Access token granted by the token endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    /// Opaque bearer token.
    pub token: String,

    /// Absolute expiry, if the server sent a parseable one.
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenGrant {
    /// Extract a grant from a token endpoint body.
    ///
    /// Returns `None` unless `status` is `"success"` and `data.token` is a
    /// non-empty string.
    pub fn from_body(body: &Value) -> Option<Self> {
        if body.get("status").and_then(Value::as_str) != Some(STATUS_SUCCESS) {
            return None;
        }

        let data = body.get("data").filter(|d| is_present(d))?;
        let token = data
            .get("token")
            .filter(|t| is_present(t))
            .and_then(Value::as_str)?;

        Some(Self {
            token: token.to_string(),
            expires_at: data.get("expires_at").and_then(parse_expires_at),
        })
    }
}

/// Parse a server-supplied expiry timestamp.
///
/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS`
/// (taken as UTC), and Unix seconds as a number or numeric string.
pub fn parse_expires_at(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    s.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Entitlement data returned by a successful validation.
///
/// The fields are defined by the license server; the client treats them as
/// an opaque map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseRecord(Map<String, Value>);

impl LicenseRecord {
    /// Extract the record from a validation body's `data` field.
    ///
    /// Returns `None` when `data` is absent, empty, or not an object.
    pub fn from_body(body: &Value) -> Option<Self> {
        match body.get("data") {
            Some(Value::Object(map)) if !map.is_empty() => Some(Self(map.clone())),
            _ => None,
        }
    }

    /// Look up a single entitlement field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Take ownership of the underlying map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<LicenseRecord> for Value {
    fn from(record: LicenseRecord) -> Self {
        Value::Object(record.0)
    }
}

/// Parse a raw body as JSON, `None` if it is not valid JSON.
pub fn parse_json_body(body: &[u8]) -> Option<Value> {
    serde_json::from_slice(body).ok()
}
