//! API error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use asrq_queue::QueueError;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Invalid request.
    #[error("{0}")]
    BadRequest(String),

    /// Queue at capacity.
    #[error("Server busy, queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Internal failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::QueueFull { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::QueueFull { .. } => "queue_full",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::TaskNotFound(id) => ApiError::NotFound(format!("Task not found: {}", id)),
            QueueError::QueueFull { capacity } => ApiError::QueueFull { capacity },
            QueueError::Custom(message) => ApiError::BadRequest(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_error_mapping() {
        let err = ApiError::from(QueueError::QueueFull { capacity: 10 });
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let err = ApiError::from(QueueError::TaskNotFound("x".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = ApiError::from(QueueError::Database("locked".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(QueueError::Custom("bad filter".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_serialization_error_is_server_side() {
        let err = ApiError::from(QueueError::Serialization("key must be a string".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "internal_error");
        assert!(err.to_string().contains("key must be a string"));
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::NotFound("gone".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
