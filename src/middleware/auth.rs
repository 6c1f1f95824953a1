// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID token authentication middleware.

use crate::services::token_verifier::{extract_bearer_token, TokenError};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie holding the ID token for browser sessions.
pub const SESSION_COOKIE: &str = "chat_session";

/// Authenticated user extracted from the ID token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

/// Middleware that requires a valid Firebase ID token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok());

            extract_bearer_token(auth_header)
                .map_err(|_| StatusCode::UNAUTHORIZED)?
                .to_string()
        }
    };

    let verified = state
        .token_verifier
        .verify(&token)
        .await
        .map_err(|err| match err {
            TokenError::Invalid(reason) => {
                tracing::debug!(reason = %reason, "Rejected ID token");
                StatusCode::UNAUTHORIZED
            }
            TokenError::Transient(reason) => {
                tracing::error!(reason = %reason, "ID token verification unavailable");
                StatusCode::SERVICE_UNAVAILABLE
            }
        })?;

    request.extensions_mut().insert(AuthUser {
        uid: verified.uid,
        email: verified.email,
    });

    Ok(next.run(request).await)
}
