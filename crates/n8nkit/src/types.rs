//! Client configuration types.

use std::time::Duration;

/// Path prefix of the public API.
pub const API_PREFIX: &str = "/api/v1";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// Page size requested from list endpoints.
pub const PAGE_LIMIT: usize = 250;

/// Connection settings for an n8n instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Instance URL, without the API prefix (e.g. `https://n8n.example.com`)
    pub base_url: String,
    /// API key sent with every request
    pub api_key: String,
    /// Upper bound for a single request
    pub timeout: Duration,
    /// Retry policy for idempotent requests
    pub retry: RetryConfig,
}

impl ClientConfig {
    /// Create a config with default timeout and retry policy.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Root of the public API, e.g. `https://n8n.example.com/api/v1`.
    pub fn api_root(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with(API_PREFIX) {
            base.to_string()
        } else {
            format!("{base}{API_PREFIX}")
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(10),
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_root() {
        let config = ClientConfig::new("https://n8n.example.com/", "key");
        assert_eq!(config.api_root(), "https://n8n.example.com/api/v1");

        let config = ClientConfig::new("http://localhost:5678/api/v1", "key");
        assert_eq!(config.api_root(), "http://localhost:5678/api/v1");
    }

    #[test]
    fn test_retry_delay_backoff() {
        let config = RetryConfig::new(4, Duration::from_secs(1), 2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        // Capped at max_delay
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(10));
    }

    #[test]
    fn test_no_retry() {
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
    }
}
