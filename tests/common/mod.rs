// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chat_backend::config::Config;
use chat_backend::db::FirestoreDb;
use chat_backend::routes::create_router;
use chat_backend::services::{ChatService, FirebaseTokenVerifier, IdentityClient};
use chat_backend::AppState;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const TEST_KID: &str = "test-key-1";
const PRIVATE_KEY_PEM: &[u8] = include_bytes!("../fixtures/test_signing_key.pem");
const PUBLIC_KEY_PEM: &[u8] = include_bytes!("../fixtures/test_signing_key.pub.pem");

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Verifier that trusts the fixture key instead of Google's JWKS.
#[allow(dead_code)]
pub fn test_verifier(config: &Config) -> FirebaseTokenVerifier {
    let key = DecodingKey::from_rsa_pem(PUBLIC_KEY_PEM).expect("valid test public key");
    FirebaseTokenVerifier::new_with_static_key(&config.gcp_project_id, TEST_KID, key)
        .expect("static verifier")
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    // Unroutable emulator address: identity calls fail fast instead of leaving the machine.
    let identity = IdentityClient::new(config.firebase_api_key.clone(), Some("127.0.0.1:1"));

    let state = Arc::new(AppState {
        token_verifier: Arc::new(test_verifier(&config)),
        chat: ChatService::new(test_db_offline(), identity),
        config,
    });

    (create_router(state.clone()), state)
}

#[derive(Serialize)]
struct TestClaims<'a> {
    iss: String,
    aud: &'a str,
    sub: &'a str,
    iat: u64,
    exp: u64,
    auth_time: u64,
    email: String,
}

/// Sign an ID token the way Firebase Auth would for `project_id`.
#[allow(dead_code)]
pub fn create_test_id_token(uid: &str, project_id: &str) -> String {
    create_test_id_token_with(uid, project_id, TEST_KID, 3600)
}

#[allow(dead_code)]
pub fn create_test_id_token_with(uid: &str, project_id: &str, kid: &str, ttl_secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let claims = TestClaims {
        iss: format!("https://securetoken.google.com/{}", project_id),
        aud: project_id,
        sub: uid,
        iat: now - 10,
        exp: (now as i64 + ttl_secs) as u64,
        auth_time: now - 10,
        email: format!("{}@example.com", uid),
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());

    encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM).expect("valid test private key"),
    )
    .unwrap()
}
