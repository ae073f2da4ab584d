//! API Error Types
//!
//! Errors raised before the first response byte is written. Once a
//! stream has started, failures travel inside the stream as error frames.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::search::SearchError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend refused or failed the request
    #[error("{0}")]
    Search(#[from] SearchError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Search(e) => match e {
                SearchError::ConfigInvalid { .. }
                | SearchError::UnknownBackend(_)
                | SearchError::OutsideHome { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_REQUEST")
                }
                SearchError::BackendStartFailed(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "BACKEND_UNAVAILABLE")
                }
                SearchError::TransportFailed(_) | SearchError::ProtocolStatusBad { .. } => {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR")
                }
                SearchError::InconsistentPath(..) | SearchError::InconsistentCatalog(..) => {
                    (StatusCode::CONFLICT, "INCONSISTENT_LISTING")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "SEARCH_ERROR"),
            },
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
