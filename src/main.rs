// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat Backend API Server
//!
//! Serves accounts, contacts, chats and messages for the chat web app,
//! backed by Firebase Authentication and Cloud Firestore.

use anyhow::Context;
use chat_backend::{
    config::Config,
    db::FirestoreDb,
    services::{ChatService, FirebaseTokenVerifier, IdentityClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting chat backend");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .context("Failed to connect to Firestore")?;

    let identity = IdentityClient::new(
        config.firebase_api_key.clone(),
        config.auth_emulator_host.as_deref(),
    );
    if let Some(host) = &config.auth_emulator_host {
        tracing::info!(host = %host, "Using Firebase Auth emulator");
    }

    let token_verifier = Arc::new(
        FirebaseTokenVerifier::new(&config.gcp_project_id)
            .context("Failed to initialize ID token verifier")?,
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        chat: ChatService::new(db, identity),
        token_verifier,
    });

    // Build router
    let app = chat_backend::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chat_backend=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
