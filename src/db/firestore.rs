// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profiles, contact lists, chat lists)
//! - Chats (one-to-one conversations)
//! - Messages (chat history and real-time feeds)

use crate::db::collections;
use crate::db::listen::{
    feed_event, DocumentFeed, FeedAction, FeedDocument, QueryListener, Subscription,
};
use crate::error::AppError;
use crate::models::{Chat, Message, User};
use firestore::errors::FirestoreError;
use firestore::{
    FirestoreListenerTarget, FirestoreMemListenStateStorage, FirestoreResult,
    FirestoreTransformServerValue, FirestoreWritePrecondition,
};
use futures_util::{stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

const MAX_CONCURRENT_DB_OPS: usize = 20;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;
const SEARCH_LIMIT: u32 = 20;
// Highest code point in the BMP private use area; appended to a prefix to
// build the upper bound of a prefix range query.
const PREFIX_RANGE_END: char = '\u{f8ff}';
const LISTEN_TARGET_ID: u32 = 1;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastMessageUpdate {
    last_message: String,
}

#[derive(Serialize, Deserialize)]
struct ReadUpdate {
    read: bool,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user profile by uid.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Resolve many user ids, keeping their order and skipping missing ones.
    pub async fn get_users(&self, user_ids: &[String]) -> Result<Vec<User>, AppError> {
        self.get_many(collections::USERS, user_ids).await
    }

    /// Write a new user profile; `createdAt` is stamped by the server.
    pub async fn create_user_profile(&self, user: &User) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .transforms(|t| {
                t.fields([t
                    .field("createdAt")
                    .server_value(FirestoreTransformServerValue::RequestTime)])
            })
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(user_id = %user.id, "User profile created");
        Ok(())
    }

    /// First user whose email matches exactly.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field("email").eq(email)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().next())
    }

    /// Users whose email starts with `prefix`.
    pub async fn search_users_by_email_prefix(&self, prefix: &str) -> Result<Vec<User>, AppError> {
        let upper = format!("{}{}", prefix, PREFIX_RANGE_END);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| {
                q.for_all([
                    q.field("email").greater_than_or_equal(prefix),
                    q.field("email").less_than_or_equal(upper.as_str()),
                ])
            })
            .order_by([("email", firestore::FirestoreQueryDirection::Ascending)])
            .limit(SEARCH_LIMIT)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Add `contact_id` to the user's contact list (no duplicates).
    pub async fn add_contact(&self, user_id: &str, contact_id: &str) -> Result<(), AppError> {
        self.transform_user_array(user_id, "contacts", contact_id, ArrayOp::Union)
            .await
    }

    /// Remove `contact_id` from the user's contact list.
    pub async fn remove_contact(&self, user_id: &str, contact_id: &str) -> Result<(), AppError> {
        self.transform_user_array(user_id, "contacts", contact_id, ArrayOp::Remove)
            .await
    }

    async fn transform_user_array(
        &self,
        user_id: &str,
        field: &str,
        value: &str,
        op: ArrayOp,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(user_id)
            .transforms(|t| {
                let target = t.field(field);
                t.fields([match op {
                    ArrayOp::Union => target.append_missing_elements([value]),
                    ArrayOp::Remove => target.remove_all_from_array([value]),
                }])
            })
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add {} update to transaction: {}", field, e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| commit_error(e, || format!("User {} not found", user_id)))?;

        tracing::debug!(user_id, field, value, ?op, "User array updated");
        Ok(())
    }

    // ─── Chat Operations ─────────────────────────────────────────

    pub async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CHATS)
            .obj()
            .one(chat_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Resolve many chat ids, keeping their order and skipping missing ones.
    pub async fn get_chats(&self, chat_ids: &[String]) -> Result<Vec<Chat>, AppError> {
        self.get_many(collections::CHATS, chat_ids).await
    }

    /// Every chat the user takes part in.
    pub async fn get_chats_with_participant(&self, user_id: &str) -> Result<Vec<Chat>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CHATS)
            .filter(|q| q.for_all([q.field("participants").array_contains(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Existing chat that has both users as participants.
    pub async fn find_chat_between(
        &self,
        user_id: &str,
        contact_id: &str,
    ) -> Result<Option<Chat>, AppError> {
        let chats = self.get_chats_with_participant(user_id).await?;
        Ok(chats.into_iter().find(|chat| chat.has_participant(contact_id)))
    }

    /// Atomically create a chat and link it into both participants' chat lists.
    pub async fn create_chat(&self, chat: &Chat) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::CHATS)
            .document_id(&chat.id)
            .object(chat)
            .transforms(|t| {
                t.fields([t
                    .field("createdAt")
                    .server_value(FirestoreTransformServerValue::RequestTime)])
            })
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add chat to transaction: {}", e)))?;

        for participant in &chat.participants {
            client
                .fluent()
                .update()
                .in_col(collections::USERS)
                .precondition(FirestoreWritePrecondition::Exists(true))
                .document_id(participant)
                .transforms(|t| {
                    t.fields([t.field("chats").append_missing_elements([chat.id.as_str()])])
                })
                .only_transform()
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!(
                        "Failed to add chat link to transaction: {}",
                        e
                    ))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| commit_error(e, || "Chat participant not found".to_string()))?;

        tracing::info!(
            chat_id = %chat.id,
            participants = ?chat.participants,
            "Chat created"
        );
        Ok(())
    }

    // ─── Message Operations ──────────────────────────────────────

    /// Atomically store a message and record it as the chat's last message.
    pub async fn insert_message(&self, message: &Message) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::MESSAGES)
            .document_id(&message.id)
            .object(message)
            .transforms(|t| {
                t.fields([t
                    .field("timestamp")
                    .server_value(FirestoreTransformServerValue::RequestTime)])
            })
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add message to transaction: {}", e))
            })?;

        let last = LastMessageUpdate {
            last_message: message.text.clone(),
        };

        client
            .fluent()
            .update()
            .fields(["lastMessage"])
            .in_col(collections::CHATS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&message.chat_id)
            .object(&last)
            .transforms(|t| {
                t.fields([t
                    .field("lastMessageTime")
                    .server_value(FirestoreTransformServerValue::RequestTime)])
            })
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add chat update to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| commit_error(e, || format!("Chat {} not found", message.chat_id)))?;

        tracing::debug!(
            chat_id = %message.chat_id,
            message_id = %message.id,
            "Message stored"
        );
        Ok(())
    }

    /// All messages of a chat, oldest first.
    pub async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, AppError> {
        let mut messages: Vec<Message> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::MESSAGES)
            .filter(|q| q.for_all([q.field("chatId").eq(chat_id)]))
            .order_by([("timestamp", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Same-instant messages come back in index order; make it deterministic.
        messages.sort_by(Message::chronological);
        Ok(messages)
    }

    /// Mark every unread message in the chat not sent by `reader_id` as read.
    ///
    /// Returns the number of messages updated.
    pub async fn mark_messages_read(&self, chat_id: &str, reader_id: &str) -> Result<usize, AppError> {
        let client = self.get_client()?;

        let unread: Vec<Message> = client
            .fluent()
            .select()
            .from(collections::MESSAGES)
            .filter(|q| {
                q.for_all([
                    q.field("chatId").eq(chat_id),
                    q.field("read").eq(false),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let incoming: Vec<&Message> = unread.iter().filter(|m| m.sender_id != reader_id).collect();
        let flag = ReadUpdate { read: true };

        for chunk in incoming.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for message in chunk {
                client
                    .fluent()
                    .update()
                    .fields(["read"])
                    .in_col(collections::MESSAGES)
                    .document_id(&message.id)
                    .object(&flag)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add read flag to transaction: {}",
                            e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit read flags: {}", e))
            })?;
        }

        tracing::debug!(chat_id, reader_id, count = incoming.len(), "Messages marked read");
        Ok(incoming.len())
    }

    // ─── Listeners ───────────────────────────────────────────────

    /// Listen to a chat's messages; `on_snapshot` gets the full list, oldest first.
    ///
    /// The current messages are delivered before this returns.
    pub async fn listen_messages<F, Fut>(
        &self,
        chat_id: &str,
        on_snapshot: F,
    ) -> Result<Subscription, AppError>
    where
        F: Fn(Vec<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let db = self.clone();
        let load_id = chat_id.to_string();
        let target_id = chat_id.to_string();

        self.listen(
            "messages",
            move || {
                let db = db.clone();
                let chat_id = load_id.clone();
                async move { db.get_messages(&chat_id).await }
            },
            move |client, listener| {
                client
                    .fluent()
                    .select()
                    .from(collections::MESSAGES)
                    .filter(move |q| q.for_all([q.field("chatId").eq(target_id.as_str())]))
                    .listen()
                    .add_target(FirestoreListenerTarget::new(LISTEN_TARGET_ID), listener)
            },
            Message::chronological,
            on_snapshot,
        )
        .await
    }

    /// Listen to the chats a user takes part in; most recent first.
    ///
    /// The current chats are delivered before this returns.
    pub async fn listen_chats<F, Fut>(
        &self,
        user_id: &str,
        on_snapshot: F,
    ) -> Result<Subscription, AppError>
    where
        F: Fn(Vec<Chat>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let db = self.clone();
        let load_id = user_id.to_string();
        let target_id = user_id.to_string();

        self.listen(
            "chats",
            move || {
                let db = db.clone();
                let user_id = load_id.clone();
                async move { db.get_chats_with_participant(&user_id).await }
            },
            move |client, listener| {
                client
                    .fluent()
                    .select()
                    .from(collections::CHATS)
                    .filter(move |q| {
                        q.for_all([q.field("participants").array_contains(target_id.as_str())])
                    })
                    .listen()
                    .add_target(FirestoreListenerTarget::new(LISTEN_TARGET_ID), listener)
            },
            Chat::most_recent_first,
            on_snapshot,
        )
        .await
    }

    /// Deliver the results of `load`, then keep them current from a Listen
    /// stream. `load` runs again whenever the stream says the local results
    /// are stale.
    async fn listen<T, L, LFut, B, F, Fut>(
        &self,
        kind: &'static str,
        load: L,
        add_target: B,
        compare: fn(&T, &T) -> Ordering,
        on_snapshot: F,
    ) -> Result<Subscription, AppError>
    where
        T: FeedDocument,
        L: Fn() -> LFut + Send + Sync + 'static,
        LFut: Future<Output = Result<Vec<T>, AppError>> + Send + 'static,
        B: FnOnce(&firestore::FirestoreDb, &mut QueryListener) -> FirestoreResult<()>,
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let client = self.get_client()?;

        let feed = Arc::new(Mutex::new(DocumentFeed::<T>::new()));
        let initial = load().await?;
        let snapshot = {
            let mut feed = lock_feed(&feed);
            feed.seed(initial);
            feed.snapshot(compare)
        };
        tracing::trace!(kind, count = snapshot.len(), "Delivering initial snapshot");
        on_snapshot(snapshot).await;

        let mut listener = client
            .create_listener(FirestoreMemListenStateStorage::new())
            .await
            .map_err(|e| AppError::Database(format!("Failed to create listener: {}", e)))?;

        add_target(client, &mut listener)
            .map_err(|e| AppError::Database(format!("Failed to add listen target: {}", e)))?;

        let load = Arc::new(load);
        let on_snapshot = Arc::new(on_snapshot);

        listener
            .start(move |event| {
                let feed = feed.clone();
                let load = load.clone();
                let on_snapshot = on_snapshot.clone();
                async move {
                    let action = match feed_event::<T>(&event) {
                        Some(event) => lock_feed(&feed).apply(event),
                        None => FeedAction::Idle,
                    };

                    let snapshot = match action {
                        FeedAction::Idle => None,
                        FeedAction::Deliver => {
                            let docs = lock_feed(&feed).snapshot(compare);
                            Some(docs)
                        }
                        FeedAction::Resync => match load().await {
                            Ok(docs) => {
                                tracing::debug!(kind, "Subscription results reloaded");
                                let mut feed = lock_feed(&feed);
                                feed.seed(docs).then(|| feed.snapshot(compare))
                            }
                            Err(e) => {
                                tracing::warn!(kind, error = %e, "Failed to reload subscription results");
                                None
                            }
                        },
                    };

                    if let Some(docs) = snapshot {
                        tracing::trace!(kind, count = docs.len(), "Delivering snapshot");
                        on_snapshot(docs).await;
                    }

                    Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
                }
            })
            .await
            .map_err(|e| AppError::Database(format!("Failed to start listener: {}", e)))?;

        tracing::debug!(kind, "Subscription started");
        Ok(Subscription::new(listener, kind))
    }

    // ─── Helper Methods ──────────────────────────────────────────

    async fn get_many<T>(&self, collection: &str, ids: &[String]) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        let client = self.get_client()?;

        let found: Vec<Option<T>> = stream::iter(ids.to_vec())
            .map(|id| async move {
                client
                    .fluent()
                    .select()
                    .by_id_in(collection)
                    .obj::<T>()
                    .one(&id)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .try_collect()
            .await?;

        Ok(found.into_iter().flatten().collect())
    }
}

fn lock_feed<T>(feed: &Mutex<DocumentFeed<T>>) -> MutexGuard<'_, DocumentFeed<T>> {
    feed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Map a failed commit; a write whose target must exist reports `NOT_FOUND`.
fn commit_error(e: FirestoreError, not_found: impl FnOnce() -> String) -> AppError {
    match e {
        FirestoreError::DataNotFoundError(_) => AppError::NotFound(not_found()),
        e => AppError::Database(format!("Transaction commit failed: {}", e)),
    }
}

#[derive(Debug, Clone, Copy)]
enum ArrayOp {
    Union,
    Remove,
}
