//! Application state for the API server

use crate::{BatchDownloader, Config};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The batch downloader serving every request
    pub downloader: Arc<BatchDownloader>,

    /// Configuration (download root for catalog items, API settings)
    pub config: Arc<Config>,

    /// When the server state was created, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<BatchDownloader>, config: Arc<Config>) -> Self {
        Self {
            downloader,
            config,
            started_at: Instant::now(),
        }
    }
}
