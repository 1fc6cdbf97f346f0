// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::models::question::Archetype;

/// Errors raised by the exam engine and its stores.
#[derive(Debug, Error)]
pub enum ExamError {
    #[error(
        "Not enough active {archetype} questions to start the mock exam (requires {required}, found {available})"
    )]
    InsufficientContent {
        archetype: Archetype,
        required: usize,
        available: usize,
    },

    #[error("SJT exam session not found")]
    SessionNotFound,

    #[error("SJT exam time is up")]
    SessionExpired,

    #[error("SJT exam session data is corrupted: {0}")]
    CorruptedSession(String),

    #[error("Question position {position} is out of range (exam has {total} questions)")]
    InvalidPosition { position: usize, total: usize },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for ExamError {
    fn from(err: sqlx::Error) -> Self {
        ExamError::Storage(err.to_string())
    }
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., not enough content to build an exam)
    Conflict(String),

    // 410 Gone (expired or discarded exam session)
    Gone(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Gone(msg) => (StatusCode::GONE, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Maps engine failures onto the HTTP contract.
/// Session problems are recoverable by restarting the exam, so none of them is a 500.
impl From<ExamError> for AppError {
    fn from(err: ExamError) -> Self {
        let msg = err.to_string();
        match err {
            ExamError::InsufficientContent { .. } => AppError::Conflict(msg),
            ExamError::SessionNotFound => AppError::NotFound(msg),
            ExamError::SessionExpired | ExamError::CorruptedSession(_) => AppError::Gone(msg),
            ExamError::InvalidPosition { .. } => AppError::BadRequest(msg),
            ExamError::Storage(_) => AppError::InternalServerError(msg),
        }
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
