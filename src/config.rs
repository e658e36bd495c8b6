//! Configuration types for image-batch-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// Download behavior configuration (destination root, concurrency, timeouts)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory for catalog-derived target paths (default: "./downloads")
    #[serde(default = "default_download_root")]
    pub download_root: PathBuf,

    /// Number of workers fetching simultaneously (default: 15)
    ///
    /// Bounds in-flight network operations, not the size of a batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout applied to each individual fetch attempt (default: 10 seconds)
    #[serde(default = "default_per_attempt_timeout", with = "duration_ms_serde")]
    pub per_attempt_timeout: Duration,

    /// User-Agent sent with every request
    ///
    /// Image hosts such as Wikimedia reject requests without a descriptive agent.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_root: default_download_root(),
            concurrency: default_concurrency(),
            per_attempt_timeout: default_per_attempt_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts per item, including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt (default: 500 milliseconds)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Reject settings the retry loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts", "must be at least 1"));
        }
        if !(self.backoff_multiplier >= 1.0 && self.backoff_multiplier.is_finite()) {
            return Err(Error::config(
                "backoff_multiplier",
                format!(
                    "must be a finite number >= 1.0, got {}",
                    self.backoff_multiplier
                ),
            ));
        }
        if self.initial_delay > self.max_delay {
            return Err(Error::config(
                "initial_delay",
                "must not exceed max_delay",
            ));
        }
        Ok(())
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:9002)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for the downloader and its REST service
///
/// Every field has a default, so `Config::default()` (or `{}` in JSON) is a
/// working configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry and backoff settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load a configuration from a JSON file, filling in defaults for missing fields
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        BatchSettings::from(self).validate()
    }
}

/// Effective settings for a single batch call
///
/// Derived from [`Config`] and optionally narrowed per call (the REST API lets
/// callers pick their own concurrency and timeout within limits).
#[derive(Clone, Debug)]
pub struct BatchSettings {
    /// Worker pool size
    pub concurrency: usize,
    /// Timeout for each fetch attempt
    pub per_attempt_timeout: Duration,
    /// Retry and backoff policy
    pub retry: RetryConfig,
}

impl BatchSettings {
    /// Override the worker pool size
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Override the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = timeout;
        self
    }

    /// Reject settings that would make a batch impossible to run
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("concurrency", "must be at least 1"));
        }
        if self.per_attempt_timeout.is_zero() {
            return Err(Error::config(
                "per_attempt_timeout",
                "must be greater than zero",
            ));
        }
        self.retry.validate()
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for BatchSettings {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.download.concurrency,
            per_attempt_timeout: config.download.per_attempt_timeout,
            retry: config.retry.clone(),
        }
    }
}

fn default_download_root() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_concurrency() -> usize {
    15
}

fn default_per_attempt_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    format!(
        "{}/{} (batch image downloader)",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9002))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Durations are written as integer milliseconds; sub-second backoff is the common case
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
