//! # image-batch-dl
//!
//! Concurrent batch image downloader with retry, backoff and an on-disk cache.
//!
//! ## Design Philosophy
//!
//! image-batch-dl is designed to be:
//! - **Bounded** - A fixed worker pool caps in-flight fetches, whatever the batch size
//! - **Idempotent** - Files already on disk are reported as cached and never refetched
//! - **Honest** - Every request gets exactly one outcome, in submission order
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use image_batch_dl::{BatchDownloader, Config, DownloadRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = BatchDownloader::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = downloader
//!         .download_batch(vec![DownloadRequest::new(
//!             "lion",
//!             "https://upload.wikimedia.org/wikipedia/commons/7/73/Lion_waiting_in_Namibia.jpg",
//!             "downloads/lion.jpg",
//!         )])
//!         .await?;
//!
//!     println!(
//!         "{} succeeded, {} failed, {} cached",
//!         report.success_count(),
//!         report.failure_count(),
//!         report.skipped_count()
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// On-disk cache checks and atomic writes
pub mod cache;
/// Catalog items and their on-disk layout
pub mod catalog;
/// Configuration types
pub mod config;
/// Batch downloader (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Network transport
pub mod fetch;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Acceptance checks for fetched bodies
pub mod validate;

// Re-export commonly used types
pub use catalog::ImageItem;
pub use config::{BatchSettings, Config};
pub use downloader::BatchDownloader;
pub use error::{ApiError, Error, ErrorDetail, ItemError, Result, ToHttpStatus};
pub use fetch::{FetchedImage, HttpFetcher, ImageFetcher};
pub use types::{BatchReport, DownloadOutcome, DownloadRequest, Event, OutcomeStatus};
pub use validate::{ImageValidator, NonEmptyValidator, SniffingValidator};

/// Helper function to run the REST service with graceful signal handling.
///
/// Serves the API on the configured bind address until a termination signal
/// arrives, then lets in-flight requests finish.
///
/// On Unix either SIGTERM or SIGINT stops the server. Elsewhere Ctrl+C does.
///
/// # Example
///
/// ```no_run
/// use image_batch_dl::{BatchDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = BatchDownloader::new(Config::default())?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: BatchDownloader) -> Result<()> {
    let config = downloader.get_config();
    api::start_api_server(std::sync::Arc::new(downloader), config).await
}

/// Resolve once SIGTERM or SIGINT arrives
///
/// A signal whose handler cannot be installed is never awaited, so the other
/// one still ends the wait.
#[cfg(unix)]
pub(crate) async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    async fn once(kind: SignalKind, name: &'static str) -> &'static str {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(signal = name, error = %e, "Signal handler unavailable");
                std::future::pending::<()>().await;
            }
        }
        name
    }

    let name = tokio::select! {
        name = once(SignalKind::terminate(), "SIGTERM") => name,
        name = once(SignalKind::interrupt(), "SIGINT") => name,
    };
    tracing::info!(signal = name, "Shutdown signal received");
}

/// Resolve on Ctrl+C
#[cfg(not(unix))]
pub(crate) async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl+C handler unavailable, waiting forever");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
