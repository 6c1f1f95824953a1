// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-Sent Event streams for real-time chat updates.
//!
//! Each event carries the complete current list, so a client that misses
//! an event only needs the next one. The backing subscription lives as long
//! as the response stream; a client disconnect drops it.

use crate::db::Subscription;
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Router,
};
use futures_util::Stream;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::{wrappers::WatchStream, StreamExt};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/chats/stream", get(stream_chats))
        .route("/api/chats/{id}/messages/stream", get(stream_messages))
}

async fn stream_messages(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    state.chat.get_chat_for(&chat_id, &user.uid).await?;

    let (tx, rx) = watch::channel(None);
    let subscription = state
        .chat
        .subscribe_to_messages(&chat_id, move |messages| {
            tx.send_replace(Some(messages));
        })
        .await?;

    tracing::info!(uid = %user.uid, chat_id = %chat_id, "Message stream opened");
    Ok(sse("messages", rx, subscription))
}

async fn stream_chats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let (tx, rx) = watch::channel(None);
    let subscription = state
        .chat
        .subscribe_to_chats(&user.uid, move |chats| {
            tx.send_replace(Some(chats));
        })
        .await?;

    tracing::info!(uid = %user.uid, "Chat stream opened");
    Ok(sse("chats", rx, subscription))
}

/// Turn the latest-snapshot channel into an event stream that owns the
/// subscription.
fn sse<T>(
    name: &'static str,
    rx: watch::Receiver<Option<T>>,
    subscription: Subscription,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    let stream = WatchStream::new(rx)
        .filter_map(|snapshot| snapshot)
        .map(move |snapshot| {
            let _alive = &subscription;
            Event::default().event(name).json_data(snapshot)
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
