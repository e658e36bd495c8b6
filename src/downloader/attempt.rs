//! Per-request state machine: fetch with timeout, validate, retry, write.

use std::time::{Duration, Instant};

use super::pool::WorkerContext;
use crate::cache;
use crate::error::ItemError;
use crate::fetch::{FetchedImage, parse_image_url};
use crate::retry::{Attempted, IsRetryable, download_with_retry};
use crate::types::{DownloadOutcome, DownloadRequest, Event, OutcomeStatus};

/// Drive one request to a terminal outcome
///
/// Attempts run until one succeeds, a permanent error occurs, or
/// `max_attempts` is reached. Only a successful attempt touches the
/// filesystem; a failed write is terminal and not retried.
pub(super) async fn process_request(
    ctx: &WorkerContext,
    request: &DownloadRequest,
) -> DownloadOutcome {
    let started = Instant::now();
    let max_attempts = ctx.settings.retry.max_attempts;

    let Attempted { result, attempts } =
        download_with_retry(&ctx.settings.retry, move |attempt| async move {
            let result = fetch_once(ctx, &request.source_url).await;

            if let Err(e) = &result {
                let will_retry = e.is_retryable() && attempt < max_attempts;
                tracing::debug!(
                    identifier = %request.identifier,
                    attempt,
                    will_retry,
                    error = %e,
                    "Fetch attempt failed"
                );
                ctx.emit_event(Event::AttemptFailed {
                    identifier: request.identifier.clone(),
                    attempt,
                    error: e.to_string(),
                    will_retry,
                });
            }

            result
        })
        .await;

    let outcome = match result {
        Ok(image) => match cache::store(&request.destination_path, &image.bytes).await {
            Ok(file_size) => {
                DownloadOutcome::succeeded(request, attempts, file_size, started.elapsed())
            }
            Err(e) => {
                tracing::error!(
                    identifier = %request.identifier,
                    error = %e,
                    "Failed to write downloaded image"
                );
                DownloadOutcome::failed(request, attempts, e.to_string(), started.elapsed())
            }
        },
        Err(e) => DownloadOutcome::failed(request, attempts, e.to_string(), started.elapsed()),
    };

    report(ctx, &outcome);
    outcome
}

/// One attempt: URL check, fetch under the per-attempt timeout, validation
async fn fetch_once(ctx: &WorkerContext, url: &str) -> std::result::Result<FetchedImage, ItemError> {
    parse_image_url(url)?;

    let timeout: Duration = ctx.settings.per_attempt_timeout;
    let image = tokio::time::timeout(timeout, ctx.fetcher.fetch(url))
        .await
        .map_err(|_| ItemError::Timeout { after: timeout })??;

    ctx.validator.validate(&image)?;
    Ok(image)
}

fn report(ctx: &WorkerContext, outcome: &DownloadOutcome) {
    match outcome.status {
        OutcomeStatus::Succeeded => {
            let file_size = outcome.file_size.unwrap_or_default();
            tracing::info!(
                identifier = %outcome.identifier,
                path = %outcome.destination_path.display(),
                attempts = outcome.attempts,
                size = file_size,
                "Image downloaded"
            );
            ctx.emit_event(Event::Succeeded {
                identifier: outcome.identifier.clone(),
                attempts: outcome.attempts,
                file_size,
            });
        }
        OutcomeStatus::Failed => {
            let error = outcome.error.clone().unwrap_or_default();
            tracing::warn!(
                identifier = %outcome.identifier,
                attempts = outcome.attempts,
                error = %error,
                "Image download failed"
            );
            ctx.emit_event(Event::Failed {
                identifier: outcome.identifier.clone(),
                attempts: outcome.attempts,
                error,
            });
        }
        OutcomeStatus::SkippedCached => {}
    }
}
