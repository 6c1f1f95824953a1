// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Authentication REST client.
//!
//! Handles:
//! - Email/password account creation
//! - Email/password sign-in
//! - ID token refresh

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const IDENTITY_HOST: &str = "https://identitytoolkit.googleapis.com";
const SECURE_TOKEN_HOST: &str = "https://securetoken.googleapis.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Tokens and identity of a signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthCredentials {
    pub uid: String,
    pub email: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    /// ID token lifetime in seconds
    pub expires_in: u64,
}

/// Firebase Auth REST client.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    identity_base: String,
    token_base: String,
    api_key: String,
}

impl IdentityClient {
    /// Create a client for the production endpoints, or for the Auth emulator
    /// when `emulator_host` (`host:port`) is given.
    pub fn new(api_key: impl Into<String>, emulator_host: Option<&str>) -> Self {
        let (identity_host, token_host) = match emulator_host {
            Some(host) => (
                format!("http://{}/identitytoolkit.googleapis.com", host),
                format!("http://{}/securetoken.googleapis.com", host),
            ),
            None => (IDENTITY_HOST.to_string(), SECURE_TOKEN_HOST.to_string()),
        };

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            identity_base: format!("{}/v1", identity_host),
            token_base: format!("{}/v1", token_host),
            api_key: api_key.into(),
        }
    }

    /// Create an email/password account.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthCredentials, AppError> {
        let url = format!("{}/accounts:signUp", self.identity_base);
        let response: PasswordAuthResponse = self.post_json(&url, &password_body(email, password)).await?;
        tracing::info!(uid = %response.local_id, "Account created");
        response.into_credentials()
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthCredentials, AppError> {
        let url = format!("{}/accounts:signInWithPassword", self.identity_base);
        let response: PasswordAuthResponse = self.post_json(&url, &password_body(email, password)).await?;
        tracing::info!(uid = %response.local_id, "User signed in");
        response.into_credentials()
    }

    /// Exchange a refresh token for a fresh ID token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthCredentials, AppError> {
        let url = format!("{}/token", self.token_base);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::IdentityApi(format!("Token refresh request failed: {}", e)))?;

        let refreshed: RefreshResponse = check_response_json(response).await?;
        tracing::debug!(uid = %refreshed.user_id, "ID token refreshed");

        Ok(AuthCredentials {
            uid: refreshed.user_id,
            email: None,
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_in: parse_expires_in(&refreshed.expires_in)?,
        })
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::IdentityApi(e.to_string()))?;

        check_response_json(response).await
    }
}

fn password_body<'a>(email: &'a str, password: &'a str) -> PasswordAuthRequest<'a> {
    PasswordAuthRequest {
        email,
        password,
        return_secure_token: true,
    }
}

/// Check response status and parse the JSON body, translating Firebase
/// error payloads into `AppError`.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();

    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| AppError::IdentityApi(format!("Invalid response JSON: {}", e)));
    }

    let body = response.text().await.unwrap_or_default();

    if status.is_server_error() {
        return Err(AppError::IdentityApi(format!("HTTP {}: {}", status, body)));
    }

    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => Err(AppError::from_identity_message(&envelope.error.message)),
        Err(_) => Err(AppError::IdentityApi(format!("HTTP {}: {}", status, body))),
    }
}

fn parse_expires_in(raw: &str) -> Result<u64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::IdentityApi(format!("Invalid expiresIn value: {}", raw)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordAuthRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

/// Response of `accounts:signUp` and `accounts:signInWithPassword`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordAuthResponse {
    local_id: String,
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

impl PasswordAuthResponse {
    fn into_credentials(self) -> Result<AuthCredentials, AppError> {
        Ok(AuthCredentials {
            expires_in: parse_expires_in(&self.expires_in)?,
            uid: self.local_id,
            email: self.email,
            id_token: self.id_token,
            refresh_token: self.refresh_token,
        })
    }
}

/// Response of the secure token endpoint (snake_case, unlike the others).
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
