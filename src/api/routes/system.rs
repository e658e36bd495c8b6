//! System handlers: service info, health, events, OpenAPI.

use super::{HealthResponse, ServiceCapabilities, ServiceInfo};
use crate::api::AppState;
use crate::catalog::SUPPORTED_SOURCES;
use crate::types::Event;
use axum::{
    Json,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use std::collections::BTreeMap;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// Service identifier reported by GET /health
pub const SERVICE_NAME: &str = "image-downloader";

/// GET / - Service information
#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses(
        (status = 200, description = "Service name, version and endpoints", body = ServiceInfo)
    )
)]
pub async fn service_info() -> impl IntoResponse {
    let endpoints = [
        ("download", "/download"),
        ("download-single", "/download-single"),
        ("health", "/health"),
        ("events", "/events"),
        ("openapi", "/openapi.json"),
    ]
    .into_iter()
    .map(|(name, path)| (name.to_string(), path.to_string()))
    .collect();

    Json(ServiceInfo {
        service: "Image Downloader Service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Concurrent image downloader with retry logic".to_string(),
        endpoints,
    })
}

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.downloader.get_config();
    let supported_sources: BTreeMap<String, Vec<String>> = SUPPORTED_SOURCES
        .iter()
        .map(|(source, categories)| {
            (
                source.to_string(),
                categories.iter().map(|c| c.to_string()).collect(),
            )
        })
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs_f64(),
        capabilities: ServiceCapabilities {
            max_workers: config.download.concurrency,
            max_attempts: config.retry.max_attempts,
            retry_logic: config.retry.max_attempts > 1,
            timeout_handling: true,
            batch_downloads: true,
            single_downloads: true,
            file_extension_detection: true,
            supported_sources,
        },
    })
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// GET /events - Server-sent events stream
#[utoipa::path(
    get,
    path = "/events",
    tag = "system",
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.downloader.subscribe();
    let stream = BroadcastStream::new(receiver);

    let sse_stream = stream.filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json_data) => Some(Ok(SseEvent::default()
                .event(event_name(&event))
                .data(json_data))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize event to JSON");
                None
            }
        },
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE client lagged, events dropped");
            Some(Ok(SseEvent::default().event("error").data(format!(
                r#"{{"error":"lagged","skipped":{}}}"#,
                skipped
            ))))
        }
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

/// SSE event name; matches the `type` tag of the JSON payload
pub fn event_name(event: &Event) -> &'static str {
    match event {
        Event::BatchStarted { .. } => "batch_started",
        Event::Skipped { .. } => "skipped",
        Event::AttemptFailed { .. } => "attempt_failed",
        Event::Succeeded { .. } => "succeeded",
        Event::Failed { .. } => "failed",
        Event::BatchFinished { .. } => "batch_finished",
    }
}
