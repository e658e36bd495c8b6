//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the image-batch-dl REST API using
//! utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the image-batch-dl REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "image-batch-dl REST API",
        version = "0.1.0",
        description = "Concurrent batch image downloads with retry, backoff and on-disk caching",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:9002", description = "Local development server")
    ),
    paths(
        // Downloads
        crate::api::routes::download_batch,
        crate::api::routes::download_single,

        // System
        crate::api::routes::service_info,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::DownloadRequest,
        crate::types::DownloadOutcome,
        crate::types::OutcomeStatus,
        crate::types::Event,

        // Catalog items
        crate::catalog::ImageItem,

        // API request/response types from routes
        crate::api::routes::BatchDownloadRequest,
        crate::api::routes::BatchDownloadResponse,
        crate::api::routes::ServiceInfo,
        crate::api::routes::HealthResponse,
        crate::api::routes::ServiceCapabilities,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Image downloads - Batch and single downloads with per-item outcomes"),
        (name = "system", description = "System endpoints - Service info, health checks, events, OpenAPI spec"),
    )
)]
pub struct ApiDoc;
