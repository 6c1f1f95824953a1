// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID token verification for API requests.

use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Identity extracted from a valid Firebase ID token.
#[derive(Debug, Clone)]
pub struct VerifiedUser {
    pub uid: String,
    pub email: Option<String>,
}

/// Verification error categories.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    /// The token is missing/invalid or claims do not match expectations.
    #[error("invalid token: {0}")]
    Invalid(String),
    /// Signing keys could not be fetched.
    #[error("token verification unavailable: {0}")]
    Transient(String),
}

#[derive(Clone)]
enum VerifierMode {
    Google,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for ID tokens issued by Firebase Authentication.
pub struct FirebaseTokenVerifier {
    http_client: reqwest::Client,
    project_id: String,
    issuer: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl FirebaseTokenVerifier {
    /// Create a production verifier that fetches and caches Google's signing keys.
    pub fn new(project_id: &str) -> anyhow::Result<Self> {
        let verifier = Self::with_mode(project_id, VerifierMode::Google)?;

        tracing::info!(
            project = %verifier.project_id,
            issuer = %verifier.issuer,
            "Initialized Firebase ID token verifier"
        );

        Ok(verifier)
    }

    /// Create a verifier with a static RSA public key.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        project_id: &str,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static key kid must not be empty");
        }

        Self::with_mode(
            project_id,
            VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
        )
    }

    fn with_mode(project_id: &str, mode: VerifierMode) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building JWKS HTTP client")?;

        Ok(Self {
            http_client,
            project_id: project_id.to_string(),
            issuer: format!("https://securetoken.google.com/{}", project_id),
            mode,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify a Firebase ID token.
    pub async fn verify(&self, token: &str) -> Result<VerifiedUser, TokenError> {
        let header = decode_header(token)
            .map_err(|e| TokenError::Invalid(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(TokenError::Invalid(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| TokenError::Invalid("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<FirebaseIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| TokenError::Invalid(format!("JWT validation failed: {e}")))?
            .claims;

        if claims.sub.is_empty() {
            return Err(TokenError::Invalid("empty sub claim".to_string()));
        }

        validate_not_future(claims.iat, "iat")?;
        validate_not_future(claims.auth_time, "auth_time")?;

        tracing::debug!(uid = %claims.sub, "ID token verified");

        Ok(VerifiedUser {
            uid: claims.sub,
            email: claims.email,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, TokenError> {
        if let VerifierMode::StaticKey {
            kid: static_kid,
            decoding_key,
        } = &self.mode
        {
            if kid == static_kid {
                return Ok(decoding_key.clone());
            }

            return Err(TokenError::Invalid(format!(
                "unknown JWT kid for static verifier: {kid}"
            )));
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        // Keys rotate; a miss on a fresh cache forces one more fetch.
        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(TokenError::Invalid(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), TokenError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_uri = JWKS_URL, "Refreshing Firebase JWKS cache");

        let response = self
            .http_client
            .get(JWKS_URL)
            .send()
            .await
            .map_err(|e| TokenError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TokenError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| TokenError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid = usable_keys(jwks);

        if keys_by_kid.is_empty() {
            return Err(TokenError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Firebase JWKS cache refreshed");
        Ok(())
    }
}

fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        if jwk.use_.as_deref().is_some_and(|u| u != "sig") {
            continue;
        }

        match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirebaseIdTokenClaims {
    sub: String,
    iat: Option<u64>,
    auth_time: Option<u64>,
    email: Option<String>,
}

/// Pull the token out of an `Authorization: Bearer ...` header value.
pub fn extract_bearer_token(auth_header: Option<&str>) -> Result<&str, TokenError> {
    let value =
        auth_header.ok_or_else(|| TokenError::Invalid("missing Authorization header".to_string()))?;

    let token = value.strip_prefix("Bearer ").ok_or_else(|| {
        TokenError::Invalid("Authorization header must be Bearer token".to_string())
    })?;

    if token.trim().is_empty() {
        return Err(TokenError::Invalid("Bearer token is empty".to_string()));
    }

    Ok(token.trim())
}

fn validate_not_future(value: Option<u64>, claim: &str) -> Result<(), TokenError> {
    let Some(value) = value else {
        return Err(TokenError::Invalid(format!("missing {claim} claim")));
    };

    if value > now_unix_secs() + CLOCK_SKEW_SECS {
        return Err(TokenError::Invalid(format!("{claim} claim is in the future")));
    }

    Ok(())
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|raw| raw.trim_matches('"').parse::<u64>().ok())
    })
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=19437, must-revalidate, no-transform"),
            Some(19437)
        );
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn extract_bearer_token_errors() {
        assert!(matches!(
            extract_bearer_token(None),
            Err(TokenError::Invalid(_))
        ));
        assert!(matches!(
            extract_bearer_token(Some("Basic abc")),
            Err(TokenError::Invalid(_))
        ));
        assert!(matches!(
            extract_bearer_token(Some("Bearer ")),
            Err(TokenError::Invalid(_))
        ));
        assert_eq!(extract_bearer_token(Some("Bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn future_claims_are_rejected() {
        let later = now_unix_secs() + 3600;
        assert!(validate_not_future(Some(later), "iat").is_err());
        assert!(validate_not_future(None, "auth_time").is_err());
        assert!(validate_not_future(Some(now_unix_secs()), "iat").is_ok());
    }

    #[test]
    fn non_rsa_and_non_signing_keys_are_skipped() {
        let jwks: Jwks = serde_json::from_value(serde_json::json!({
            "keys": [
                { "kid": "ec", "kty": "EC", "n": "", "e": "" },
                { "kid": "enc", "kty": "RSA", "use": "enc", "n": "AQAB", "e": "AQAB" },
                { "kid": "", "kty": "RSA", "n": "AQAB", "e": "AQAB" }
            ]
        }))
        .unwrap();

        assert!(usable_keys(jwks).is_empty());
    }
}
