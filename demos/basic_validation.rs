//! Basic license validation example.
//!
//! Run with:
//! ```bash
//! LICENSE_SERVER_URL=https://licenses.example.com \
//! APP_URL=https://shop.example.com APP_NAME=Shop \
//! RUST_LOG=license_client=debug \
//! cargo run --example basic_validation -- YOUR-LICENSE-KEY
//! ```
//!
//! Set `LICENSE_CLIENT_FILE_CACHE=1` to keep tokens on disk between runs.

use license_client::{LicenseClient, LicenseClientConfig, LicenseClientError};
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let license_key = match std::env::args().nth(1) {
        Some(key) => key,
        None => {
            eprintln!("usage: basic_validation <LICENSE-KEY>");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&license_key) {
        eprintln!("License check failed: {}", e);
        if let Some(status) = e.status() {
            eprintln!("   Status:  {}", status);
            eprintln!("   Message: {}", e.message());
        }
        if let Some(body) = e.body() {
            eprintln!("   Body:    {}", body);
        }
        std::process::exit(1);
    }
}

fn run(license_key: &str) -> Result<(), LicenseClientError> {
    let config = LicenseClientConfig::from_env()?;

    let client = if std::env::var_os("LICENSE_CLIENT_FILE_CACHE").is_some() {
        LicenseClient::with_file_cache(config, license_key)?
    } else {
        LicenseClient::new(config, license_key)?
    };

    println!("Validating license...");
    let record = client.validate()?;

    println!("License valid");
    for (field, value) in record.as_map() {
        println!("   {}: {}", field, value);
    }
    Ok(())
}
