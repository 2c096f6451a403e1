//! Error types for lsa-server
//!
//! Every failure reaching a client carries a stable machine-readable `code`
//! and a human message. Internal failures are logged and replaced with a
//! fixed message so no storage or upstream detail leaks.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid caller identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Training gate denied a start (403)
    #[error("Training incomplete: {completed}/{total} modules completed")]
    TrainingIncomplete { completed: i64, total: i64 },

    /// Resource missing or not owned by the caller (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Status-guarded write lost a race or precondition changed (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External collaborator failed or timed out (502)
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Anything unexpected (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::TrainingIncomplete { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::TrainingIncomplete { .. } => "TRAINING_INCOMPLETE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match self {
            ApiError::TrainingIncomplete { completed, total } => json!({
                "code": code,
                "message": "Complete the training modules before going live",
                "completed": completed,
                "total": total,
            }),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed with internal error");
                json!({
                    "code": code,
                    "message": "Internal server error",
                })
            }
            ApiError::UpstreamUnavailable(detail) => {
                tracing::warn!(error = %detail, "Upstream collaborator unavailable");
                json!({
                    "code": code,
                    "message": "Upstream service unavailable, nothing was changed",
                })
            }
            ApiError::Validation(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => json!({
                "code": code,
                "message": msg,
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // Unique indexes guard lifecycle invariants (one live per owner,
            // one report per session), so a violation is a lost race.
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict("Conflicting record already exists".to_string())
            }
            sqlx::Error::RowNotFound => ApiError::NotFound("Record not found".to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<lsa_common::Error> for ApiError {
    fn from(err: lsa_common::Error) -> Self {
        match err {
            lsa_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            lsa_common::Error::InvalidInput(msg) => ApiError::Validation(msg),
            lsa_common::Error::Database(db_err) => ApiError::from(db_err),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Result type for API handlers and services
pub type ApiResult<T> = Result<T, ApiError>;
