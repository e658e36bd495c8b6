//! HTTP error response handling for the API
//!
//! Conversions from domain errors and request-body rejections to HTTP
//! responses with appropriate status codes and JSON error bodies.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, status = status_code.as_u16(), "Request rejected");
        }

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Errors with a known status go through Error::into_response or with_status
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

impl ApiError {
    /// Pair the error body with an explicit status code
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Render a rejected JSON body in the same error format as every other failure
///
/// Malformed JSON keeps axum's 400; well-formed bodies that do not match the
/// schema (missing fields, wrong types) keep axum's 422.
pub fn json_rejection(rejection: JsonRejection) -> Response {
    let status = rejection.status();
    tracing::warn!(status = status.as_u16(), error = %rejection.body_text(), "Rejected request body");
    ApiError::validation(rejection.body_text()).with_status(status)
}
