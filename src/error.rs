// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Auth provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// PostgREST error code for a single-row request that matched nothing.
    pub const NO_ROWS_CODE: &'static str = "PGRST116";

    /// Fallback text shown in forms when an error has no usable message.
    pub const UNKNOWN_ERROR: &'static str = "An unknown error occurred";

    /// Whether this error is the provider reporting a missing row or user.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Whether this error means the caller's session is no longer usable.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, AppError::Unauthorized | AppError::InvalidToken)
    }

    /// Message suitable for showing inline next to a form.
    ///
    /// Provider and database messages are passed through as-is; everything
    /// else collapses to a generic message so internals do not leak.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Provider(msg) | AppError::Database(msg) | AppError::BadRequest(msg)
                if !msg.trim().is_empty() =>
            {
                msg.clone()
            }
            AppError::Unauthorized | AppError::InvalidToken => "Not authenticated".to_string(),
            _ => Self::UNKNOWN_ERROR.to_string(),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Provider(msg) => {
                tracing::warn!(error = %msg, "Auth provider error");
                (StatusCode::BAD_GATEWAY, "provider_error", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
