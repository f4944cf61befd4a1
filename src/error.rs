//! Unified application error model and mapping helpers.
//! One taxonomy shared by the identity core and the HTTP surface, with a
//! single place that decides which failures reach the user verbatim and
//! which are recovered locally.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level error. `Auth` messages are shown to the user verbatim;
/// profile-lookup failures are recovered with a degraded role and never
/// surface as a blocking error; an expired session behaves exactly like an
/// explicit sign-out. Nothing here is fatal to the process.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    #[error("{message}")]
    Auth { message: String },
    #[error("session expired")]
    SessionExpired,
    #[error("profile lookup failed: {message}")]
    ProfileLookup { message: String },
    #[error("{message}")]
    UserInput { message: String },
    #[error("{message}")]
    NotFound { message: String },
    #[error("{message}")]
    Conflict { message: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        AppError::Auth { message: msg.into() }
    }
    pub fn profile<S: Into<String>>(msg: S) -> Self {
        AppError::ProfileLookup { message: msg.into() }
    }
    pub fn user<S: Into<String>>(msg: S) -> Self {
        AppError::UserInput { message: msg.into() }
    }
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        AppError::NotFound { message: msg.into() }
    }
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        AppError::Conflict { message: msg.into() }
    }
    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        AppError::Forbidden { message: msg.into() }
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        AppError::Internal { message: msg.into() }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::Auth { .. } => StatusCode::UNAUTHORIZED,
            AppError::SessionExpired => StatusCode::UNAUTHORIZED,
            AppError::ProfileLookup { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UserInput { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = serde_json::json!({
            "status": "error",
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { message: err.to_string() }
    }
}

/// Failure modes of the profile-role lookup. Callers downgrade both cases to
/// the default `User` role rather than failing resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileLookupError {
    #[error("profile not found")]
    NotFound,
    #[error("profile backend error: {0}")]
    Backend(String),
}
