//! Configuration for the remote distance/routing API.

use std::env;
use std::time::Duration;

/// Default base URL of the routing service.
pub const DEFAULT_BASE_URL: &str = "https://api.olamaps.io";

/// Default per-request HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Default number of retries for retryable transport failures.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default pause between retry attempts.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Connection settings for the distance-matrix API.
///
/// The credential is never hardcoded; it comes from the environment.
#[derive(Debug, Clone)]
pub struct RouteApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub http_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl RouteApiConfig {
    /// Build a config from `JOURNEY_TRACKER_API_URL` / `JOURNEY_TRACKER_API_KEY`.
    ///
    /// The URL falls back to [`DEFAULT_BASE_URL`]; a missing key yields an
    /// empty credential, which the service will reject as unauthorized.
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("JOURNEY_TRACKER_API_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key: env::var("JOURNEY_TRACKER_API_KEY").unwrap_or_default(),
            ..Self::default()
        }
    }
}

impl Default for RouteApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RouteApiConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.api_key.is_empty());
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_backoff, Duration::from_millis(500));
    }
}
