//! Error types for image-batch-dl
//!
//! Two layers of errors exist:
//! - [`Error`] - call-level failures that abort a whole batch (bad configuration,
//!   duplicate identifiers, a destination directory that cannot be created)
//! - [`ItemError`] - per-item failures that are captured into a
//!   [`DownloadOutcome`](crate::types::DownloadOutcome) and never escape a batch call
//!
//! API-facing helpers ([`ApiError`], [`ToHttpStatus`]) map call-level errors to
//! HTTP status codes and structured JSON bodies.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for image-batch-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for image-batch-dl
///
/// Returned only when a call fails as a whole. Individual download failures are
/// reported through [`ItemError`] inside the batch report instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// The same identifier appeared more than once in a single batch
    #[error("duplicate identifier in batch: {0}")]
    DuplicateIdentifier(String),

    /// A request was rejected before any work was dispatched
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error (e.g., a destination directory could not be created)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error outside of an individual download (e.g., client construction)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Failure of a single download attempt or of the final write
///
/// Each variant is classified as transient or permanent through
/// [`IsRetryable`](crate::retry::IsRetryable).
#[derive(Debug, Error)]
pub enum ItemError {
    /// The source URL could not be parsed or is not an HTTP(S) URL
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The URL as submitted
        url: String,
        /// Why the URL was rejected
        reason: String,
    },

    /// The attempt did not complete within the per-attempt timeout
    #[error("timed out after {}ms", after.as_millis())]
    Timeout {
        /// The timeout that elapsed
        after: Duration,
    },

    /// Could not establish a connection to the remote host
    #[error("connection failed: {0}")]
    Connect(String),

    /// The connection broke while sending the request or reading the body
    #[error("transport error: {0}")]
    Transport(String),

    /// Remote returned a 5xx status
    #[error("server error: HTTP {status}")]
    ServerStatus {
        /// HTTP status code
        status: u16,
    },

    /// Remote returned a 4xx status
    #[error("client error: HTTP {status}")]
    ClientStatus {
        /// HTTP status code
        status: u16,
    },

    /// Remote returned a status that is neither success nor an error class
    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
    },

    /// The response body was empty
    #[error("response body was empty")]
    EmptyBody,

    /// The response body is not a recognized image
    #[error("unsupported content type: {}", content_type.as_deref().unwrap_or("unknown"))]
    UnsupportedContent {
        /// Declared Content-Type header, if any
        content_type: Option<String>,
    },

    /// Writing the fetched bytes to the destination failed
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Destination path that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "duplicate_identifier",
///     "message": "duplicate identifier in batch: lion",
///     "details": {
///       "identifier": "lion"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::InvalidRequest(_) => 422,
            Error::DuplicateIdentifier(_) => 409,

            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            Error::Network(_) => 502,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidRequest(_) => "validation_error",
            Error::DuplicateIdentifier(_) => "duplicate_identifier",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::DuplicateIdentifier(identifier) => Some(serde_json::json!({
                "identifier": identifier,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
