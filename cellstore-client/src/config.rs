//! Connection and retry configuration.

use std::time::Duration;

/// Default store port.
const DEFAULT_PORT: u16 = 9090;
/// Default session and per-call timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);
/// Default retry backoff base, in seconds.
const DEFAULT_BASE_BACKOFF_SECS: f64 = 2.0;
/// Default maximum number of retries.
const DEFAULT_MAX_RETRIES: u32 = 50;

/// Configuration for a [`Connection`](crate::Connection).
///
/// Host selection is uniform over the configured pool; a single-host setup
/// is just a pool of one. An empty pool is rejected when the connection is
/// opened, not at build time.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    hosts: Vec<String>,
    port: u16,
    timeout: Duration,
    retry: RetryConfig,
}

impl ConnectionConfig {
    /// Returns a new configuration builder.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }

    /// Returns the configured host pool.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Returns the store port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the session and per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the retry settings used by scan loops.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

/// Builder for `ConnectionConfig`.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigBuilder {
    hosts: Vec<String>,
    port: Option<u16>,
    timeout: Option<Duration>,
    retry: RetryConfigBuilder,
}

impl ConnectionConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a host to the pool.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    /// Sets the host pool, replacing any previously configured hosts.
    pub fn hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the store port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the session and per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Configures retry settings using a builder function.
    pub fn retry<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RetryConfigBuilder) -> RetryConfigBuilder,
    {
        self.retry = f(self.retry);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            hosts: self.hosts,
            port: self.port.unwrap_or(DEFAULT_PORT),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            retry: self.retry.build(),
        }
    }
}

/// Settings for the bounded retry-with-backoff executor.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    base_backoff_secs: f64,
    max_retries: u32,
}

impl RetryConfig {
    /// Returns the backoff base in seconds. The n-th retry sleeps
    /// `base ^ n` seconds, capped at one hour.
    pub fn base_backoff_secs(&self) -> f64 {
        self.base_backoff_secs
    }

    /// Returns the maximum number of retries before the last error
    /// propagates.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_backoff_secs: DEFAULT_BASE_BACKOFF_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl From<RetryConfig> for RetryConfigBuilder {
    fn from(config: RetryConfig) -> Self {
        Self {
            base_backoff_secs: Some(config.base_backoff_secs),
            max_retries: Some(config.max_retries),
        }
    }
}

/// Builder for `RetryConfig`.
#[derive(Debug, Clone, Default)]
pub struct RetryConfigBuilder {
    base_backoff_secs: Option<f64>,
    max_retries: Option<u32>,
}

impl RetryConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backoff base in seconds.
    pub fn base_backoff_secs(mut self, secs: f64) -> Self {
        self.base_backoff_secs = Some(secs);
        self
    }

    /// Sets the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Builds the retry configuration.
    pub fn build(self) -> RetryConfig {
        RetryConfig {
            base_backoff_secs: self.base_backoff_secs.unwrap_or(DEFAULT_BASE_BACKOFF_SECS),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout_is_four_seconds() {
        let config = ConnectionConfig::builder().host("12.34.56.78").build();
        assert_eq!(config.timeout(), Duration::from_secs(4));
    }

    #[test]
    fn test_configurable_timeout() {
        let config = ConnectionConfig::builder()
            .timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_port() {
        let config = ConnectionConfig::builder().build();
        assert_eq!(config.port(), 9090);
    }

    #[test]
    fn test_single_host() {
        let config = ConnectionConfig::builder().host("12.34.56.78").build();
        assert_eq!(config.hosts(), ["12.34.56.78"]);
    }

    #[test]
    fn test_host_pool() {
        let config = ConnectionConfig::builder()
            .hosts(["12.34.56.78", "34.56.78.90"])
            .build();
        assert_eq!(config.hosts(), ["12.34.56.78", "34.56.78.90"]);
    }

    #[test]
    fn test_hosts_replaces_previous() {
        let config = ConnectionConfig::builder()
            .host("old")
            .hosts(["h1", "h2"])
            .build();
        assert_eq!(config.hosts(), ["h1", "h2"]);
    }

    #[test]
    fn test_retry_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.base_backoff_secs(), 2.0);
        assert_eq!(retry.max_retries(), 50);
    }

    #[test]
    fn test_retry_builder_through_connection_config() {
        let config = ConnectionConfig::builder()
            .retry(|r| r.base_backoff_secs(0.5).max_retries(3))
            .build();
        assert_eq!(config.retry().base_backoff_secs(), 0.5);
        assert_eq!(config.retry().max_retries(), 3);
    }

    #[test]
    fn test_retry_config_into_builder() {
        let rebuilt = RetryConfigBuilder::from(RetryConfig::default())
            .max_retries(7)
            .build();
        assert_eq!(rebuilt.base_backoff_secs(), 2.0);
        assert_eq!(rebuilt.max_retries(), 7);
    }
}
