//! Shared test helpers: an instrumented fetch stub and fast batch settings.

use crate::config::{BatchSettings, Config, RetryConfig};
use crate::downloader::BatchDownloader;
use crate::error::ItemError;
use crate::fetch::{FetchedImage, ImageFetcher};
use crate::types::DownloadRequest;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Minimal PNG signature; enough for magic-byte sniffing
pub(crate) const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
];

/// Scripted response for one fetch call
#[derive(Clone, Debug)]
pub(crate) enum StubResponse {
    /// 200 with a PNG body
    Png,
    /// 200 with an HTML body
    Html,
    /// 200 with no body
    Empty,
    /// Non-success HTTP status
    Status(u16),
    /// Connection refused
    Refused,
    /// Never answers; the per-attempt timeout fires
    Hang,
}

impl StubResponse {
    fn into_result(self) -> std::result::Result<FetchedImage, ItemError> {
        match self {
            StubResponse::Png => Ok(FetchedImage {
                bytes: PNG_BYTES.to_vec(),
                content_type: Some("image/png".to_string()),
            }),
            StubResponse::Html => Ok(FetchedImage {
                bytes: b"<html><body>oops</body></html>".to_vec(),
                content_type: Some("text/html".to_string()),
            }),
            StubResponse::Empty => Ok(FetchedImage {
                bytes: Vec::new(),
                content_type: Some("image/png".to_string()),
            }),
            StubResponse::Status(status) => Err(crate::fetch::classify_status(status)),
            StubResponse::Refused => Err(ItemError::Connect("connection refused".to_string())),
            StubResponse::Hang => unreachable!("fetch parks on Hang before converting"),
        }
    }
}

/// In-memory [`ImageFetcher`] that follows a per-URL script
///
/// Each URL pops its next scripted response; the last one repeats once the
/// script is exhausted. Unscripted URLs answer with a PNG. Calls and peak
/// concurrency are recorded for assertions.
pub(crate) struct StubFetcher {
    scripts: Mutex<HashMap<String, VecDeque<StubResponse>>>,
    calls: Mutex<HashMap<String, u32>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every fetch (makes overlap observable)
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Script the responses for `url`
    pub(crate) fn script(self, url: &str, responses: Vec<StubResponse>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), VecDeque::from(responses));
        self
    }

    /// Number of fetches issued for `url`
    pub(crate) fn calls(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Number of fetches issued overall
    pub(crate) fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    /// Highest number of fetches observed in flight at once
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &str) -> StubResponse {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(StubResponse::Png),
            None => StubResponse::Png,
        }
    }
}

#[async_trait::async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedImage, ItemError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let response = self.next_response(url);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if matches!(response, StubResponse::Hang) {
            // Count out now, the caller's timeout drops this future
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response.into_result()
    }
}

/// Settings with millisecond backoff so retry tests stay fast
pub(crate) fn fast_settings(concurrency: usize) -> BatchSettings {
    BatchSettings {
        concurrency,
        per_attempt_timeout: Duration::from_millis(100),
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            jitter: false,
        },
    }
}

/// Downloader wired to `fetcher`, configured with [`fast_settings`]
pub(crate) fn create_test_downloader(fetcher: Arc<StubFetcher>) -> BatchDownloader {
    let settings = fast_settings(4);
    let mut config = Config::default();
    config.download.concurrency = settings.concurrency;
    config.download.per_attempt_timeout = settings.per_attempt_timeout;
    config.retry = settings.retry;

    BatchDownloader::new(config).unwrap().with_fetcher(fetcher)
}

/// Request for `id` fetched from a fake host and stored under `dir`
pub(crate) fn request_in(dir: &Path, id: &str) -> DownloadRequest {
    DownloadRequest::new(id, url_for(id), dir.join(format!("{id}.png")))
}

/// Fake source URL for `id`
pub(crate) fn url_for(id: &str) -> String {
    format!("https://images.test/{id}.png")
}

/// Scratch directory for one test
pub(crate) fn scratch() -> TempDir {
    tempfile::tempdir().unwrap()
}
