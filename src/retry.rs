//! Retry logic with exponential backoff
//!
//! This module provides the per-item retry state machine used by the batch
//! downloader. Each attempt either succeeds, fails with a transient error (and is
//! retried after an exponentially growing, optionally jittered delay), or fails
//! terminally. The number of attempts actually made is always reported back.
//!
//! # Example
//!
//! ```no_run
//! use image_batch_dl::retry::{IsRetryable, download_with_retry};
//! use image_batch_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let attempted = download_with_retry(&config, |_attempt| async {
//!     Ok::<_, MyError>(())
//! })
//! .await;
//! assert_eq!(attempted.attempts, 1);
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, ItemError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused or reset connections, 5xx responses) return `true`.
/// Permanent failures (4xx responses, malformed URLs, unsupported content, local write errors)
/// return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ItemError {
    fn is_retryable(&self) -> bool {
        match self {
            ItemError::Timeout { .. } => true,
            ItemError::Connect(_) => true,
            ItemError::Transport(_) => true,
            ItemError::ServerStatus { .. } => true,
            ItemError::InvalidUrl { .. } => false,
            ItemError::ClientStatus { .. } => false,
            ItemError::UnexpectedStatus { .. } => false,
            ItemError::EmptyBody => false,
            ItemError::UnsupportedContent { .. } => false,
            // Disk problems need operator action, another fetch will not fix them
            ItemError::Write { .. } => false,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. } => false,
            Error::DuplicateIdentifier(_) => false,
            Error::InvalidRequest(_) => false,
            Error::Serialization(_) => false,
            Error::ApiServerError(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Per-request retry bookkeeping
///
/// Owned by the worker running the request; never shared.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    next_delay: Duration,
}

impl RetryState {
    /// Start at attempt 1 with the configured initial delay
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 1,
            next_delay: config.initial_delay,
        }
    }

    /// The attempt currently being made (1-based)
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay that will be slept before the next attempt, before jitter
    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    /// Whether another attempt is allowed after the current one fails
    pub fn has_attempts_left(&self, config: &RetryConfig) -> bool {
        self.attempt < config.max_attempts
    }

    /// Move to the next attempt and return how long to sleep before making it
    pub fn advance(&mut self, config: &RetryConfig) -> Duration {
        let sleep_for = if config.jitter {
            add_jitter(self.next_delay)
        } else {
            self.next_delay
        };

        // Products past Duration's range saturate at the cap
        self.next_delay =
            Duration::try_from_secs_f64(self.next_delay.as_secs_f64() * config.backoff_multiplier)
                .map_or(config.max_delay, |grown| grown.min(config.max_delay));
        self.attempt += 1;

        sleep_for
    }
}

/// Terminal result of a retried operation together with the attempts it took
#[derive(Debug)]
pub struct Attempted<T, E> {
    /// Final result: the first success, or the last error
    pub result: Result<T, E>,
    /// Number of attempts made (always >= 1)
    pub attempts: u32,
}

/// Execute an async operation with exponential backoff retry logic
///
/// `operation` receives the 1-based attempt number. The operation is tried at
/// most `config.max_attempts` times; non-retryable errors end the loop
/// immediately.
///
/// # Example
///
/// ```no_run
/// use image_batch_dl::retry::download_with_retry;
/// use image_batch_dl::config::RetryConfig;
/// use image_batch_dl::error::ItemError;
///
/// # async fn example() {
/// let config = RetryConfig::default();
/// let attempted = download_with_retry(&config, |attempt| async move {
///     if attempt < 2 {
///         Err(ItemError::Connect("refused".to_string()))
///     } else {
///         Ok::<_, ItemError>(attempt)
///     }
/// })
/// .await;
/// assert_eq!(attempted.attempts, 2);
/// # }
/// ```
pub async fn download_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> Attempted<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut state = RetryState::new(config);

    loop {
        match operation(state.attempt()).await {
            Ok(value) => {
                if state.attempt() > 1 {
                    tracing::info!(attempts = state.attempt(), "Operation succeeded after retry");
                }
                return Attempted {
                    result: Ok(value),
                    attempts: state.attempt(),
                };
            }
            Err(e) if e.is_retryable() && state.has_attempts_left(config) => {
                let failed_attempt = state.attempt();
                let delay = state.advance(config);

                tracing::warn!(
                    error = %e,
                    attempt = failed_attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                // The caller owns the outcome and reports it at its own level
                if e.is_retryable() {
                    tracing::debug!(
                        error = %e,
                        attempts = state.attempt(),
                        "Operation failed after all attempts exhausted"
                    );
                } else {
                    tracing::debug!(
                        error = %e,
                        attempt = state.attempt(),
                        "Operation failed with non-retryable error"
                    );
                }
                return Attempted {
                    result: Err(e),
                    attempts: state.attempt(),
                };
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
