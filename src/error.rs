use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Forbidden => 403,
            AppError::NotFound => 404,
            AppError::Conflict(_) => 409,
            AppError::Config(_) | AppError::StartServer(_) => 500,
            AppError::Database(_) | AppError::Internal => 500,
        }
    }

    /// Stable machine-readable kind, independent of the display message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation_error",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Config(_) | AppError::StartServer(_) => "server_error",
            AppError::Database(_) | AppError::Internal => "server_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Storage failures are logged server-side, never echoed to callers.
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error=%e, "database error");
                "internal server error".to_string()
            }
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.kind(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
