// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat backend: data access for a chat-with-contacts web application.
//!
//! Accounts live in Firebase Authentication; users, chats and messages live
//! in Cloud Firestore. This crate wraps both behind [`services::ChatService`]
//! and exposes it over a small HTTP API.

pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::{ChatService, FirebaseTokenVerifier};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub chat: ChatService,
    pub token_verifier: Arc<FirebaseTokenVerifier>,
}
