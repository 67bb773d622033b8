use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::auth::AuthError;
use crate::services::dashboard::StatusUpdateError;

/// Path the client should navigate to when a session is required.
pub const AUTH_REDIRECT: &str = "/auth";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("confirmation required before changing booking status")]
    ConfirmationRequired,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::Unauthorized,
            AuthError::EmailTaken => AppError::Conflict(err.to_string()),
            AuthError::InvalidInput(msg) => AppError::BadRequest(msg),
            AuthError::Storage(e) => AppError::Internal(e),
        }
    }
}

impl From<StatusUpdateError> for AppError {
    fn from(err: StatusUpdateError) -> Self {
        match err {
            StatusUpdateError::Forbidden => AppError::Forbidden(err.to_string()),
            StatusUpdateError::NotFound(id) => AppError::NotFound(format!("booking {id}")),
            StatusUpdateError::InvalidTransition { .. } => AppError::Unprocessable(err.to_string()),
            StatusUpdateError::Stale => AppError::Conflict(err.to_string()),
            StatusUpdateError::Storage(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConfirmationRequired => StatusCode::PRECONDITION_REQUIRED,
        };

        let body = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                serde_json::json!({ "error": "internal error" })
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                serde_json::json!({ "error": "internal error" })
            }
            AppError::Unauthorized => {
                serde_json::json!({ "error": self.to_string(), "redirect": AUTH_REDIRECT })
            }
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, axum::Json(body)).into_response()
    }
}
