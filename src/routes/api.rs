// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ChatSummary, Message, User};
use crate::routes::auth::validated;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/users/lookup", get(lookup_user))
        .route("/api/users/search", get(search_users))
        .route("/api/users/{id}", get(get_user))
        .route("/api/contacts", get(get_contacts).post(add_contact))
        .route("/api/contacts/{id}", delete(remove_contact))
        .route("/api/chats", get(get_chats).post(create_chat))
        .route(
            "/api/chats/{id}/messages",
            get(get_messages).post(send_message),
        )
        .route("/api/chats/{id}/read", post(mark_read))
}

// ─── Users ───────────────────────────────────────────────────

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>> {
    let profile = state
        .chat
        .get_user(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.uid)))?;

    Ok(Json(profile))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    let profile = state
        .chat
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

    Ok(Json(profile))
}

#[derive(Deserialize, Validate)]
struct LookupQuery {
    #[validate(email(message = "email is invalid"))]
    email: String,
}

async fn lookup_user(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<User>> {
    let query = validated(query)?;

    let profile = state
        .chat
        .get_user_by_email(&query.email)
        .await?
        .ok_or_else(|| AppError::NotFound("No user with that email".to_string()))?;

    Ok(Json(profile))
}

#[derive(Deserialize, Validate)]
struct SearchQuery {
    #[validate(length(max = 254, message = "search term too long"))]
    q: String,
}

async fn search_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>> {
    let query = validated(query)?;
    Ok(Json(state.chat.search_users(&query.q).await?))
}

// ─── Contacts ────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct ContactRequest {
    #[validate(length(min = 1, max = 128, message = "contact_id is required"))]
    contact_id: String,
}

async fn get_contacts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.chat.get_contacts(&user.uid).await?))
}

async fn add_contact(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ContactRequest>,
) -> Result<StatusCode> {
    let payload = validated(payload)?;
    state.chat.add_contact(&user.uid, &payload.contact_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_contact(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(contact_id): Path<String>,
) -> Result<StatusCode> {
    state.chat.remove_contact(&user.uid, &contact_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Chats ───────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateChatResponse {
    pub chat_id: String,
}

async fn get_chats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<ChatSummary>>> {
    Ok(Json(state.chat.get_chats(&user.uid).await?))
}

async fn create_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ContactRequest>,
) -> Result<Json<CreateChatResponse>> {
    let payload = validated(payload)?;
    let chat_id = state.chat.create_chat(&user.uid, &payload.contact_id).await?;
    Ok(Json(CreateChatResponse { chat_id }))
}

// ─── Messages ────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "text must be 1-4000 characters"))]
    text: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MarkReadResponse {
    pub updated: usize,
}

async fn get_messages(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<Message>>> {
    state.chat.get_chat_for(&chat_id, &user.uid).await?;
    Ok(Json(state.chat.get_messages(&chat_id).await?))
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    let payload = validated(payload)?;
    let message = state
        .chat
        .send_message(&chat_id, &user.uid, &payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> Result<Json<MarkReadResponse>> {
    state.chat.get_chat_for(&chat_id, &user.uid).await?;
    let updated = state.chat.mark_chat_read(&chat_id, &user.uid).await?;
    Ok(Json(MarkReadResponse { updated }))
}
