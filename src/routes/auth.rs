// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication routes.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::SESSION_COOKIE;
use crate::services::AuthCredentials;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(length(min = 6, max = 4096, message = "password must be at least 6 characters"))]
    pub password: String,
}

impl SignUpRequest {
    /// Surrounding whitespace is not part of a name or address.
    fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, max = 4096, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
}

/// Reject a payload that fails its validation rules.
pub(crate) fn validated<T: Validate>(payload: T) -> Result<T> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(payload)
}

/// Create an account and start a session.
async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<SignUpRequest>,
) -> Result<(CookieJar, Json<AuthCredentials>)> {
    let payload = validated(payload.trimmed())?;

    let credentials = state
        .chat
        .sign_up(&payload.name, &payload.email, &payload.password)
        .await?;

    Ok((with_session(jar, &credentials), Json(credentials)))
}

/// Sign in with email and password.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<SignInRequest>,
) -> Result<(CookieJar, Json<AuthCredentials>)> {
    let payload = validated(payload)?;

    let credentials = state
        .chat
        .sign_in(&payload.email, &payload.password)
        .await?;

    Ok((with_session(jar, &credentials), Json(credentials)))
}

/// Exchange a refresh token for a new ID token.
async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<RefreshRequest>,
) -> Result<(CookieJar, Json<AuthCredentials>)> {
    let payload = validated(payload)?;

    let credentials = state.chat.refresh_session(&payload.refresh_token).await?;

    Ok((with_session(jar, &credentials), Json(credentials)))
}

/// Clear the session cookie. Bearer-token clients simply drop their tokens.
async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, StatusCode::NO_CONTENT)
}

fn with_session(jar: CookieJar, credentials: &AuthCredentials) -> CookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, credentials.id_token.clone()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(credentials.expires_in as i64));

    jar.add(cookie)
}
