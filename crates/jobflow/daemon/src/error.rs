//! Error types for jobflow-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jobflow_types::{ObjectKey, TypesError};
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Cluster error
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Controller wiring error
    #[error("Controller error: {0}")]
    Controller(#[from] jobflow_controller::ControllerError),

    /// Manifest loading error
    #[error("Manifest error: {0}")]
    Manifest(#[from] TypesError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local cluster errors
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    /// Object not found
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    /// Object already exists or was modified concurrently
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Object failed validation
    #[error("Invalid object: {0}")]
    Invalid(String),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Cluster error
    #[error("{0}")]
    Cluster(#[from] ClusterError),
}

impl From<TypesError> for ApiError {
    fn from(e: TypesError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Cluster(ClusterError::NotFound { .. }) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Cluster(ClusterError::Conflict(_)) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Cluster(ClusterError::Invalid(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
