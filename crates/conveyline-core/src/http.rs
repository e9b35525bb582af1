//! Shared blocking-style HTTP access.
//!
//! Uses async reqwest internally on a small shared tokio runtime, but callers
//! block on each request: the pipelines are strictly sequential.

use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

/// HTTP client settings, applied once before the first request
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// Total time allowed for one request, including the body
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install the HTTP settings. Must run before the first call to [`http_client`].
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::warn!("HTTP config already set, ignoring {config:?}");
    }
}

/// Effective HTTP settings (defaults when never set)
pub fn http_config() -> HttpConfig {
    HTTP_CONFIG.get().copied().unwrap_or_default()
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    let config = http_config();
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.timeout)
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});
