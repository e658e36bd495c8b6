//! Download handlers: batch and single image downloads.

use super::{
    BatchDownloadRequest, BatchDownloadResponse, MAX_CONCURRENT_RANGE, TIMEOUT_SECONDS_RANGE,
};
use crate::api::AppState;
use crate::api::error_response::json_rejection;
use crate::catalog::ImageItem;
use crate::error::{ApiError, Error};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;

/// POST /download - Download a batch of images
#[utoipa::path(
    post,
    path = "/download",
    tag = "downloads",
    request_body = BatchDownloadRequest,
    responses(
        (status = 200, description = "Batch finished; per-item results inside", body = BatchDownloadResponse),
        (status = 400, description = "No downloads specified", body = ApiError),
        (status = 409, description = "Two items share a name", body = ApiError),
        (status = 422, description = "Invalid item or out-of-range limits", body = ApiError),
        (status = 500, description = "Destination directory could not be created", body = ApiError)
    )
)]
pub async fn download_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchDownloadRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection(rejection),
    };

    tracing::info!(
        count = request.downloads.len(),
        max_concurrent = request.max_concurrent,
        timeout_seconds = request.timeout_seconds,
        "Received batch download request"
    );

    if request.downloads.is_empty() {
        return ApiError::new("empty_batch", "No downloads specified")
            .with_status(StatusCode::BAD_REQUEST);
    }
    if !MAX_CONCURRENT_RANGE.contains(&request.max_concurrent) {
        return Error::InvalidRequest(format!(
            "max_concurrent must be between {} and {}, got {}",
            MAX_CONCURRENT_RANGE.start(),
            MAX_CONCURRENT_RANGE.end(),
            request.max_concurrent
        ))
        .into_response();
    }
    if !TIMEOUT_SECONDS_RANGE.contains(&request.timeout_seconds) {
        return Error::InvalidRequest(format!(
            "timeout_seconds must be between {} and {}, got {}",
            TIMEOUT_SECONDS_RANGE.start(),
            TIMEOUT_SECONDS_RANGE.end(),
            request.timeout_seconds
        ))
        .into_response();
    }
    if let Err(e) = request.downloads.iter().try_for_each(ImageItem::validate) {
        return e.into_response();
    }

    let root = &state.config.download.download_root;
    let requests = request
        .downloads
        .iter()
        .map(|item| item.to_request(root))
        .collect();
    let settings = state
        .downloader
        .settings()
        .with_concurrency(request.max_concurrent)
        .with_timeout(Duration::from_secs(request.timeout_seconds));

    match state.downloader.download_batch_with(requests, &settings).await {
        Ok(report) => (StatusCode::OK, Json(BatchDownloadResponse::from(report))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /download-single - Download one image
#[utoipa::path(
    post,
    path = "/download-single",
    tag = "downloads",
    request_body = ImageItem,
    responses(
        (status = 200, description = "Outcome of the download", body = crate::types::DownloadOutcome),
        (status = 422, description = "Invalid item", body = ApiError),
        (status = 500, description = "Destination directory could not be created", body = ApiError)
    )
)]
pub async fn download_single(
    State(state): State<AppState>,
    payload: Result<Json<ImageItem>, JsonRejection>,
) -> Response {
    let Json(item) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection(rejection),
    };

    tracing::info!(name = %item.name, "Received single download request");

    if let Err(e) = item.validate() {
        return e.into_response();
    }

    let request = item.to_request(&state.config.download.download_root);
    let settings = state
        .downloader
        .settings()
        .with_concurrency(1)
        .with_timeout(Duration::from_secs(super::default_timeout_seconds()));

    match state.downloader.download_one_with(request, &settings).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}
