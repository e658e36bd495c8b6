//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] - Batch and single image downloads
//! - [`system`] - Service info, health, events, OpenAPI

use crate::catalog::ImageItem;
use crate::types::{BatchReport, DownloadOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

mod downloads;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use downloads::*;
pub use system::*;

/// Accepted range for `max_concurrent`
pub const MAX_CONCURRENT_RANGE: RangeInclusive<usize> = 1..=20;

/// Accepted range for `timeout_seconds`
pub const TIMEOUT_SECONDS_RANGE: RangeInclusive<u64> = 5..=300;

// ============================================================================
// Request Types
// ============================================================================

/// Request body for POST /download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct BatchDownloadRequest {
    /// Images to download (must not be empty)
    pub downloads: Vec<ImageItem>,
    /// Maximum concurrent downloads, 1 to 20 (default: 5)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Timeout for each download attempt in seconds, 5 to 300 (default: 30)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_timeout_seconds() -> u64 {
    30
}

// ============================================================================
// Response Types
// ============================================================================

/// Response body for POST /download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct BatchDownloadResponse {
    /// One outcome per submitted item, in submission order
    pub results: Vec<DownloadOutcome>,
    /// Number of submitted items
    pub total_count: usize,
    /// Items downloaded during this request
    pub success_count: usize,
    /// Items that failed
    pub failure_count: usize,
    /// Items already present on disk
    pub skipped_count: usize,
    /// Wall time of the batch in seconds
    pub total_time_secs: f64,
    /// When the batch finished
    pub timestamp: DateTime<Utc>,
}

impl From<BatchReport> for BatchDownloadResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            total_count: report.len(),
            success_count: report.success_count(),
            failure_count: report.failure_count(),
            skipped_count: report.skipped_count(),
            total_time_secs: report.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
            results: report.into_outcomes(),
        }
    }
}

/// Response body for GET /
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ServiceInfo {
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// One-line description
    pub description: String,
    /// Endpoint name to path
    pub endpoints: BTreeMap<String, String>,
}

/// Response body for GET /health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// Always "healthy" while the server answers
    pub status: String,
    /// Service identifier
    pub service: String,
    /// Time of the check
    pub timestamp: DateTime<Utc>,
    /// Crate version
    pub version: String,
    /// Seconds since the server state was created
    pub uptime_secs: f64,
    /// What this instance can do
    pub capabilities: ServiceCapabilities,
}

/// Capability summary reported by GET /health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ServiceCapabilities {
    /// Default worker pool size
    pub max_workers: usize,
    /// Attempts per item, first one included
    pub max_attempts: u32,
    /// Whether transient failures are retried
    pub retry_logic: bool,
    /// Whether attempts carry their own timeout
    pub timeout_handling: bool,
    /// POST /download is available
    pub batch_downloads: bool,
    /// POST /download-single is available
    pub single_downloads: bool,
    /// Whether target paths keep the image extension from the URL
    pub file_extension_detection: bool,
    /// Accepted sources and their categories
    pub supported_sources: BTreeMap<String, Vec<String>>,
}
