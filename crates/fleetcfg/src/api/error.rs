//! API error types

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

use fleetcfg_core::{CoreError, PolicyViolation};
use fleetcfg_playbook::PlaybookError;
use fleetcfg_store::StoreError;

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Error message
    pub message: String,
}

impl ApiError {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Wrapper for API errors with status codes
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: ApiError,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new("BAD_REQUEST", message),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new("NOT_FOUND", message),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: ApiError::new("INTERNAL_ERROR", message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, message = %self.error.message, "request failed");
        } else {
            warn!(status = %self.status, message = %self.error.message, "request rejected");
        }
        (self.status, Json(self.error)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::not_found(err.to_string()),
            StoreError::Parse(_) => Self::bad_request(err.to_string()),
            StoreError::Storage(_) | StoreError::Task(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<PolicyViolation> for AppError {
    fn from(err: PolicyViolation) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<PlaybookError> for AppError {
    fn from(err: PlaybookError) -> Self {
        match err {
            PlaybookError::UnknownStateValue { .. } => Self::bad_request(err.to_string()),
            PlaybookError::TemplateLoad { .. } => Self::internal(err.to_string()),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Store(e) => e.into(),
            CoreError::Policy(e) => e.into(),
            CoreError::Playbook(e) => e.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}
