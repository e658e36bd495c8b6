//! Core types for image-batch-dl

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use utoipa::ToSchema;

/// A single named download target
///
/// Immutable once submitted. `identifier` must be unique within a batch; it is
/// the key used to correlate the request with its [`DownloadOutcome`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Unique key within the batch
    pub identifier: String,
    /// HTTP(S) URL to fetch
    pub source_url: String,
    /// Where the fetched bytes are written; its presence is the cache entry
    #[schema(value_type = String)]
    pub destination_path: PathBuf,
}

impl DownloadRequest {
    /// Build a request from its three parts
    pub fn new(
        identifier: impl Into<String>,
        source_url: impl Into<String>,
        destination_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            source_url: source_url.into(),
            destination_path: destination_path.into(),
        }
    }
}

/// Terminal status of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Destination already held a non-empty file; nothing was fetched
    SkippedCached,
    /// Fetched, validated and written
    Succeeded,
    /// Gave up, either on a permanent error or after exhausting attempts
    Failed,
}

impl OutcomeStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::SkippedCached => "skipped_cached",
            OutcomeStatus::Succeeded => "succeeded",
            OutcomeStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result for one [`DownloadRequest`]
///
/// Produced exactly once per request in a batch and never mutated afterwards.
/// `attempts` is 0 for [`OutcomeStatus::SkippedCached`] and at least 1 otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DownloadOutcome {
    /// Identifier of the originating request
    pub identifier: String,
    /// Terminal status
    pub status: OutcomeStatus,
    /// Fetch attempts made
    pub attempts: u32,
    /// Last error, present only for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Destination the request pointed at
    #[schema(value_type = String)]
    pub destination_path: PathBuf,
    /// Size on disk: bytes written, or the cached file's size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Wall time spent on this request, backoff included
    pub elapsed_ms: u64,
}

impl DownloadOutcome {
    /// Outcome for a request whose destination was already populated
    pub fn skipped(request: &DownloadRequest, file_size: u64) -> Self {
        Self {
            identifier: request.identifier.clone(),
            status: OutcomeStatus::SkippedCached,
            attempts: 0,
            error: None,
            destination_path: request.destination_path.clone(),
            file_size: Some(file_size),
            elapsed_ms: 0,
        }
    }

    /// Outcome for a request that was fetched and written
    pub fn succeeded(
        request: &DownloadRequest,
        attempts: u32,
        file_size: u64,
        elapsed: Duration,
    ) -> Self {
        Self {
            identifier: request.identifier.clone(),
            status: OutcomeStatus::Succeeded,
            attempts,
            error: None,
            destination_path: request.destination_path.clone(),
            file_size: Some(file_size),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Outcome for a request that ended in a terminal failure
    pub fn failed(
        request: &DownloadRequest,
        attempts: u32,
        error: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            identifier: request.identifier.clone(),
            status: OutcomeStatus::Failed,
            attempts,
            error: Some(error.into()),
            destination_path: request.destination_path.clone(),
            file_size: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// True for both freshly downloaded and cached items
    pub fn is_available(&self) -> bool {
        self.status != OutcomeStatus::Failed
    }

    /// Destination path as submitted
    pub fn path(&self) -> &Path {
        &self.destination_path
    }
}

/// Ordered outcomes of one batch call
///
/// `outcomes()[i]` always corresponds to the i-th submitted request, whatever
/// order the workers finished in.
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    outcomes: Vec<DownloadOutcome>,
    elapsed: Duration,
}

impl BatchReport {
    pub(crate) fn new(outcomes: Vec<DownloadOutcome>, elapsed: Duration) -> Self {
        Self { outcomes, elapsed }
    }

    /// Outcomes in submission order
    pub fn outcomes(&self) -> &[DownloadOutcome] {
        &self.outcomes
    }

    /// Take ownership of the outcomes
    pub fn into_outcomes(self) -> Vec<DownloadOutcome> {
        self.outcomes
    }

    /// Iterate over outcomes in submission order
    pub fn iter(&self) -> std::slice::Iter<'_, DownloadOutcome> {
        self.outcomes.iter()
    }

    /// Number of outcomes (equal to the number of submitted requests)
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True when the batch was empty
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Look up an outcome by identifier
    pub fn get(&self, identifier: &str) -> Option<&DownloadOutcome> {
        self.outcomes.iter().find(|o| o.identifier == identifier)
    }

    /// Number of items fetched and written during this call
    pub fn success_count(&self) -> usize {
        self.count(OutcomeStatus::Succeeded)
    }

    /// Number of items that ended in a terminal failure
    pub fn failure_count(&self) -> usize {
        self.count(OutcomeStatus::Failed)
    }

    /// Number of items served from the on-disk cache
    pub fn skipped_count(&self) -> usize {
        self.count(OutcomeStatus::SkippedCached)
    }

    /// Wall time of the whole call
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

impl IntoIterator for BatchReport {
    type Item = DownloadOutcome;
    type IntoIter = std::vec::IntoIter<DownloadOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

impl<'a> IntoIterator for &'a BatchReport {
    type Item = &'a DownloadOutcome;
    type IntoIter = std::slice::Iter<'a, DownloadOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}

/// Event emitted while a batch runs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch was accepted and is about to be dispatched
    BatchStarted {
        /// Number of requests in the batch
        total: usize,
        /// Requests that missed the cache and will be fetched
        to_fetch: usize,
    },

    /// A request was satisfied from the on-disk cache
    Skipped {
        /// Request identifier
        identifier: String,
    },

    /// One fetch attempt failed
    AttemptFailed {
        /// Request identifier
        identifier: String,
        /// Attempt number that failed (1-based)
        attempt: u32,
        /// Error message
        error: String,
        /// Whether another attempt will follow
        will_retry: bool,
    },

    /// A request was downloaded and written
    Succeeded {
        /// Request identifier
        identifier: String,
        /// Attempts it took
        attempts: u32,
        /// Bytes written
        file_size: u64,
    },

    /// A request ended in a terminal failure
    Failed {
        /// Request identifier
        identifier: String,
        /// Attempts made
        attempts: u32,
        /// Last error
        error: String,
    },

    /// Every outcome of the batch is known
    BatchFinished {
        /// Items downloaded
        succeeded: usize,
        /// Items that failed
        failed: usize,
        /// Items served from cache
        skipped: usize,
        /// Wall time of the batch
        elapsed_ms: u64,
    },
}
