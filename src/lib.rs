//! # license-client
//!
//! **Client for a license server: cached access tokens and license
//! validation.**
//!
//! The client obtains a short-lived access token for a license key, caches it
//! until the expiry the server states, and uses it as a bearer token to ask
//! the server what the license currently permits.
//!
//! ## Features
//!
//! - **Token caching** - tokens are reused until their absolute expiry, checked on every read
//! - **Single-flight refresh** - concurrent callers for one key share a single token request
//! - **Durable storage** - optional file-backed cache survives restarts and is shared by processes
//! - **Typed failures** - every failure is a [`LicenseClientError`] carrying status, message and body
//!
//! ## Quickstart
//!
//! ```no_run
//! use license_client::{LicenseClient, LicenseClientConfig};
//!
//! fn main() -> Result<(), license_client::LicenseClientError> {
//!     let config = LicenseClientConfig::new(
//!         "https://licenses.example.com",
//!         "https://shop.example.com",
//!         "Shop",
//!     );
//!
//!     let client = LicenseClient::new(config, "LICENSE-KEY-HERE")?;
//!     match client.validate() {
//!         Ok(record) => println!("plan: {:?}", record.get("plan")),
//!         Err(e) => eprintln!("license rejected ({:?}): {}", e.status(), e.message()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Wire contract
//!
//! - `POST {server}/api/licenses/token` with `{"license_key": ...}` returns
//!   `{"status":"success","data":{"token":...,"expires_at":...}}`
//! - `POST {server}/api/licenses/validate` with a bearer token and
//!   `{"license_key": ..., ...extra}` returns `{"data": {...}}`
//!
//! Both requests carry `x-host` / `x-host-name` headers naming the calling
//! application. See [`LicenseClientConfig`].
//!
//! The client never retries. Transport timeouts come from
//! [`LicenseClientConfig::timeout`].

#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Protocol layer
pub mod protocol;

// Transport layer
pub mod client;

// Token cache
pub mod cache;

// Client (main public API)
pub mod manager;

// Re-exports for public API
pub use cache::file::FileTokenStore;
pub use cache::memory::MemoryTokenStore;
pub use cache::{TokenCache, TokenStore};
pub use client::http::{HttpTransport, Transport};
pub use clock::{Clock, SystemClock};
pub use config::LicenseClientConfig;
pub use errors::{LicenseClientError, ServerError};
pub use manager::LicenseClient;
pub use protocol::models::LicenseRecord;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
