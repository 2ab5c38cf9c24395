//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coordinator::CoordinatorError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The change conflicts with the order's current state.
    Conflict(String),
    /// A downstream dependency is unreachable or its circuit is open.
    ServiceUnavailable(String),
    /// The payment gateway rejected the request.
    BadGateway(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Validation(_) | CoordinatorError::InsufficientInventory { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            CoordinatorError::NotFound(_) => ApiError::NotFound(err.to_string()),
            CoordinatorError::Conflict(_) => ApiError::Conflict(err.to_string()),
            CoordinatorError::ServiceUnavailable(_) => ApiError::ServiceUnavailable(err.to_string()),
            CoordinatorError::Payment(_) => ApiError::BadGateway(err.to_string()),
            CoordinatorError::Storage(_)
            | CoordinatorError::Bus(_)
            | CoordinatorError::Serialization(_) => ApiError::Internal(err.to_string()),
        }
    }
}
