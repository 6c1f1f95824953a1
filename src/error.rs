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

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Identity API error: {0}")]
    IdentityApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Translate a Firebase Auth error message (e.g. `EMAIL_EXISTS` or
    /// `WEAK_PASSWORD : Password should be at least 6 characters`).
    pub fn from_identity_message(raw: &str) -> Self {
        let code = raw.split(':').next().unwrap_or(raw).trim();

        match code {
            "EMAIL_EXISTS" => {
                AppError::BadRequest("An account with this email already exists".to_string())
            }
            "INVALID_EMAIL" | "MISSING_EMAIL" => {
                AppError::BadRequest("Email address is invalid".to_string())
            }
            "WEAK_PASSWORD" => AppError::BadRequest(
                "Password should be at least 6 characters".to_string(),
            ),
            "MISSING_PASSWORD" => AppError::BadRequest("Password is required".to_string()),
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
                AppError::AuthFailed("Invalid email or password".to_string())
            }
            "USER_DISABLED" => AppError::AuthFailed("This account has been disabled".to_string()),
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
                AppError::AuthFailed("Session expired, please sign in again".to_string())
            }
            "TOO_MANY_ATTEMPTS_TRY_LATER" => {
                AppError::AuthFailed("Too many attempts, try again later".to_string())
            }
            _ => AppError::IdentityApi(raw.to_string()),
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
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::AuthFailed(msg) => {
                (StatusCode::UNAUTHORIZED, "auth_failed", Some(msg.clone()))
            }
            AppError::IdentityApi(msg) => {
                tracing::warn!(error = %msg, "Identity API error");
                (StatusCode::BAD_GATEWAY, "identity_error", None)
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

/// Result type alias for handlers and services
pub type Result<T> = std::result::Result<T, AppError>;
