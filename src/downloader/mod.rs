//! Batch downloader split into focused submodules.
//!
//! - [`batch`] - Pre-dispatch checks, cache partition and report assembly
//! - [`pool`] - Bounded worker pool over a shared work queue
//! - [`attempt`] - Per-request retry state machine and the final write

mod attempt;
mod batch;
mod pool;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::{BatchSettings, Config};
use crate::error::{Error, Result};
use crate::fetch::{HttpFetcher, ImageFetcher};
use crate::types::{BatchReport, DownloadOutcome, DownloadRequest, Event};
use crate::validate::{ImageValidator, SniffingValidator};
use std::sync::Arc;

/// Buffered events per subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Concurrent batch image downloader (cloneable - all fields are Arc-wrapped)
///
/// Holds no per-batch state: every call to [`download_batch`](Self::download_batch)
/// builds its own queue and collector, so one instance can serve concurrent callers.
#[derive(Clone)]
pub struct BatchDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Network transport (trait object so tests can instrument it)
    pub(crate) fetcher: Arc<dyn ImageFetcher>,
    /// Acceptance predicate for fetched bodies
    pub(crate) validator: Arc<dyn ImageValidator>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl BatchDownloader {
    /// Create a downloader with the HTTP transport and the sniffing validator
    ///
    /// # Errors
    /// Returns [`Error::Config`] for invalid settings and [`Error::Network`] if
    /// the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let fetcher = HttpFetcher::new(&config.download.user_agent)?;
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tracing::debug!(
            concurrency = config.download.concurrency,
            max_attempts = config.retry.max_attempts,
            per_attempt_timeout_ms = config.download.per_attempt_timeout.as_millis() as u64,
            "Batch downloader initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
            validator: Arc::new(SniffingValidator),
            event_tx,
        })
    }

    /// Replace the network transport
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the acceptance predicate for fetched bodies
    pub fn with_validator(mut self, validator: Arc<dyn ImageValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Batch settings derived from the configuration
    pub fn settings(&self) -> BatchSettings {
        BatchSettings::from(self.config.as_ref())
    }

    /// Subscribe to batch events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use image_batch_dl::{BatchDownloader, Config};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let downloader = BatchDownloader::new(Config::default())?;
    ///
    /// let mut events = downloader.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "batch event");
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Download a batch using the configured settings
    ///
    /// Returns one outcome per request, in submission order. Individual failures
    /// are reported inside the [`BatchReport`]; the call itself only fails for
    /// invalid settings, duplicate identifiers or destinations, or a destination
    /// directory that cannot be created. Nothing is fetched in those cases.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use image_batch_dl::{BatchDownloader, Config, DownloadRequest};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let downloader = BatchDownloader::new(Config::default())?;
    /// let report = downloader
    ///     .download_batch(vec![
    ///         DownloadRequest::new("lion", "https://example.com/lion.jpg", "out/lion.jpg"),
    ///         DownloadRequest::new("owl", "https://example.com/owl.png", "out/owl.png"),
    ///     ])
    ///     .await?;
    ///
    /// for outcome in &report {
    ///     println!("{} -> {} ({} attempts)", outcome.identifier, outcome.status, outcome.attempts);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn download_batch(&self, requests: Vec<DownloadRequest>) -> Result<BatchReport> {
        let settings = self.settings();
        self.download_batch_with(requests, &settings).await
    }

    /// Download a batch with per-call settings (e.g. a caller-chosen concurrency)
    pub async fn download_batch_with(
        &self,
        requests: Vec<DownloadRequest>,
        settings: &BatchSettings,
    ) -> Result<BatchReport> {
        batch::run_batch(self, requests, settings).await
    }

    /// Download exactly one request
    ///
    /// Same code path as a batch of one: cache check, retry state machine and
    /// write behave identically.
    pub async fn download_one(&self, request: DownloadRequest) -> Result<DownloadOutcome> {
        let settings = self.settings();
        self.download_one_with(request, &settings).await
    }

    /// Download exactly one request with per-call settings
    pub async fn download_one_with(
        &self,
        request: DownloadRequest,
        settings: &BatchSettings,
    ) -> Result<DownloadOutcome> {
        let report = self.download_batch_with(vec![request], settings).await?;
        report
            .into_outcomes()
            .into_iter()
            .next()
            .ok_or_else(|| Error::Other("batch of one produced no outcome".to_string()))
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    ///
    /// Listens on the configured bind address (default: 127.0.0.1:9002).
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
