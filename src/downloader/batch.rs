//! Batch orchestration: pre-dispatch checks, cache partition, report assembly.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::BatchDownloader;
use super::pool::{WorkerContext, run_pool};
use crate::cache;
use crate::config::BatchSettings;
use crate::error::{Error, Result};
use crate::types::{BatchReport, DownloadOutcome, DownloadRequest, Event};

/// Error recorded when a worker died without reporting
const LOST_OUTCOME_ERROR: &str = "worker terminated before reporting an outcome";

/// Run one batch call end to end
///
/// 1. Validate settings and reject duplicate identifiers/destinations
/// 2. Partition requests into cache hits and pending work
/// 3. Create destination directories for pending work
/// 4. Drain pending work through the worker pool
/// 5. Rebuild the report in submission order
pub(super) async fn run_batch(
    downloader: &BatchDownloader,
    requests: Vec<DownloadRequest>,
    settings: &BatchSettings,
) -> Result<BatchReport> {
    settings.validate()?;
    check_unique(&requests)?;

    let started = Instant::now();
    if requests.is_empty() {
        return Ok(BatchReport::new(Vec::new(), started.elapsed()));
    }

    let mut collected: HashMap<String, DownloadOutcome> = HashMap::with_capacity(requests.len());
    let mut pending = Vec::new();
    for request in &requests {
        match cache::cached_size(&request.destination_path).await {
            Some(size) => {
                collected.insert(
                    request.identifier.clone(),
                    DownloadOutcome::skipped(request, size),
                );
            }
            None => pending.push(request.clone()),
        }
    }

    let dirs: Vec<&Path> = pending
        .iter()
        .map(|r| r.destination_path.as_path())
        .collect();
    cache::ensure_parent_dirs(&dirs).await?;

    tracing::info!(
        total = requests.len(),
        cached = collected.len(),
        to_fetch = pending.len(),
        concurrency = settings.concurrency,
        "Starting batch download"
    );
    downloader.emit_event(Event::BatchStarted {
        total: requests.len(),
        to_fetch: pending.len(),
    });
    for request in &requests {
        if collected.contains_key(&request.identifier) {
            tracing::debug!(identifier = %request.identifier, "Destination already present, skipping");
            downloader.emit_event(Event::Skipped {
                identifier: request.identifier.clone(),
            });
        }
    }

    if !pending.is_empty() {
        let ctx = Arc::new(WorkerContext {
            fetcher: Arc::clone(&downloader.fetcher),
            validator: Arc::clone(&downloader.validator),
            settings: settings.clone(),
            event_tx: downloader.event_tx.clone(),
        });
        collected.extend(run_pool(ctx, pending, settings.concurrency).await);
    }

    let outcomes: Vec<DownloadOutcome> = requests
        .iter()
        .map(|request| {
            collected.remove(&request.identifier).unwrap_or_else(|| {
                tracing::error!(identifier = %request.identifier, "No outcome collected for request");
                DownloadOutcome::failed(request, 1, LOST_OUTCOME_ERROR, Duration::ZERO)
            })
        })
        .collect();

    let report = BatchReport::new(outcomes, started.elapsed());

    tracing::info!(
        succeeded = report.success_count(),
        failed = report.failure_count(),
        skipped = report.skipped_count(),
        elapsed_ms = report.elapsed().as_millis() as u64,
        "Batch download completed"
    );
    downloader.emit_event(Event::BatchFinished {
        succeeded: report.success_count(),
        failed: report.failure_count(),
        skipped: report.skipped_count(),
        elapsed_ms: report.elapsed().as_millis() as u64,
    });

    Ok(report)
}

/// Reject batches where two requests share an identifier or a destination
///
/// Either would let two workers race on one outcome slot or one file.
/// Destinations are compared after dropping `.` components and repeated
/// separators. `..` and symlinks are not resolved.
pub(super) fn check_unique(requests: &[DownloadRequest]) -> Result<()> {
    let mut identifiers = HashSet::with_capacity(requests.len());
    let mut destinations = HashMap::with_capacity(requests.len());

    for request in requests {
        if !identifiers.insert(request.identifier.as_str()) {
            return Err(Error::DuplicateIdentifier(request.identifier.clone()));
        }
        if let Some(first) = destinations.insert(
            normalized(&request.destination_path),
            request.identifier.as_str(),
        ) {
            return Err(Error::InvalidRequest(format!(
                "'{}' and '{}' share destination {}",
                first,
                request.identifier,
                request.destination_path.display()
            )));
        }
    }

    Ok(())
}

/// `path` without any `.` components, including a leading one
fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
