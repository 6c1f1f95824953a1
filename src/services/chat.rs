// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat service: the single entry point for accounts, contacts, chats and
//! messages.
//!
//! Every operation either succeeds or returns an [`AppError`]. Reads report
//! missing documents as `None` or an empty list.

use crate::db::{FirestoreDb, Subscription};
use crate::error::AppError;
use crate::ids::new_document_id;
use crate::models::chat::sort_summaries;
use crate::models::{Chat, ChatSummary, Message, User};
use crate::services::identity::{AuthCredentials, IdentityClient};
use futures_util::{stream, StreamExt, TryStreamExt};
use std::sync::Arc;

const MAX_CONCURRENT_LOOKUPS: usize = 20;

/// Facade over the hosted database and authentication service.
#[derive(Clone)]
pub struct ChatService {
    db: FirestoreDb,
    identity: IdentityClient,
}

impl ChatService {
    pub fn new(db: FirestoreDb, identity: IdentityClient) -> Self {
        Self { db, identity }
    }

    pub fn db(&self) -> &FirestoreDb {
        &self.db
    }

    // ─── Accounts ────────────────────────────────────────────────

    /// Create an auth account and its user profile.
    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthCredentials, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Name is required".to_string()));
        }

        let credentials = self.identity.sign_up(email, password).await?;

        let profile = User::new(&credentials.uid, name, email);
        if let Err(e) = self.db.create_user_profile(&profile).await {
            tracing::error!(uid = %credentials.uid, error = %e, "Profile creation failed after sign-up");
            return Err(e);
        }

        Ok(credentials)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthCredentials, AppError> {
        self.identity.sign_in(email, password).await
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthCredentials, AppError> {
        self.identity.refresh(refresh_token).await
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.db.get_user(user_id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.db.find_user_by_email(email.trim()).await
    }

    /// Users whose email starts with `term`. A blank term matches nobody.
    pub async fn search_users(&self, term: &str) -> Result<Vec<User>, AppError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        self.db.search_users_by_email_prefix(term).await
    }

    // ─── Contacts ────────────────────────────────────────────────

    /// Add `contact_id` to the user's contacts.
    pub async fn add_contact(&self, user_id: &str, contact_id: &str) -> Result<(), AppError> {
        if user_id == contact_id {
            return Err(AppError::BadRequest(
                "Cannot add yourself as a contact".to_string(),
            ));
        }
        self.require_user(contact_id).await?;

        self.db.add_contact(user_id, contact_id).await?;
        tracing::info!(user_id, contact_id, "Contact added");
        Ok(())
    }

    pub async fn remove_contact(&self, user_id: &str, contact_id: &str) -> Result<(), AppError> {
        self.db.remove_contact(user_id, contact_id).await?;
        tracing::info!(user_id, contact_id, "Contact removed");
        Ok(())
    }

    /// Profiles of the user's contacts, in contact-list order.
    pub async fn get_contacts(&self, user_id: &str) -> Result<Vec<User>, AppError> {
        match self.db.get_user(user_id).await? {
            Some(user) if !user.contacts.is_empty() => self.db.get_users(&user.contacts).await,
            _ => Ok(Vec::new()),
        }
    }

    // ─── Chats ───────────────────────────────────────────────────

    /// Return the chat between the two users, creating it if needed.
    pub async fn create_chat(&self, user_id: &str, contact_id: &str) -> Result<String, AppError> {
        if user_id == contact_id {
            return Err(AppError::BadRequest(
                "A chat needs two different participants".to_string(),
            ));
        }

        if let Some(existing) = self.db.find_chat_between(user_id, contact_id).await? {
            tracing::debug!(chat_id = %existing.id, "Reusing existing chat");
            return Ok(existing.id);
        }

        self.require_user(user_id).await?;
        self.require_user(contact_id).await?;

        let chat = Chat::new(new_document_id()?, user_id, contact_id);
        self.db.create_chat(&chat).await?;
        Ok(chat.id)
    }

    /// The user's chats with the other participant resolved, most recent first.
    pub async fn get_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>, AppError> {
        let chats = match self.db.get_user(user_id).await? {
            Some(user) if !user.chats.is_empty() => self.db.get_chats(&user.chats).await?,
            _ => return Ok(Vec::new()),
        };

        summarize(&self.db, user_id, chats).await
    }

    /// Load a chat the caller takes part in.
    pub async fn get_chat_for(&self, chat_id: &str, user_id: &str) -> Result<Chat, AppError> {
        let chat = self
            .db
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Chat {} not found", chat_id)))?;

        if !chat.has_participant(user_id) {
            return Err(AppError::Forbidden(format!(
                "Not a participant of chat {}",
                chat_id
            )));
        }

        Ok(chat)
    }

    // ─── Messages ────────────────────────────────────────────────

    /// Post a message and make it the chat's last message.
    pub async fn send_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::BadRequest("Message text is empty".to_string()));
        }

        self.get_chat_for(chat_id, sender_id).await?;

        let message = Message {
            id: new_document_id()?,
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            timestamp: None,
            read: false,
        };

        self.db.insert_message(&message).await?;
        Ok(message)
    }

    pub async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, AppError> {
        self.db.get_messages(chat_id).await
    }

    /// Mark the other participant's messages as read. Returns how many changed.
    pub async fn mark_chat_read(&self, chat_id: &str, reader_id: &str) -> Result<usize, AppError> {
        self.db.mark_messages_read(chat_id, reader_id).await
    }

    // ─── Subscriptions ───────────────────────────────────────────

    /// Deliver the chat's full message list, oldest first, on every change.
    pub async fn subscribe_to_messages<F>(
        &self,
        chat_id: &str,
        callback: F,
    ) -> Result<Subscription, AppError>
    where
        F: Fn(Vec<Message>) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        self.db
            .listen_messages(chat_id, move |messages| {
                let callback = callback.clone();
                async move { callback(messages) }
            })
            .await
    }

    /// Deliver the user's chat summaries, most recent first, on every change.
    pub async fn subscribe_to_chats<F>(
        &self,
        user_id: &str,
        callback: F,
    ) -> Result<Subscription, AppError>
    where
        F: Fn(Vec<ChatSummary>) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let db = self.db.clone();
        let owner = user_id.to_string();

        self.db
            .listen_chats(user_id, move |chats| {
                let callback = callback.clone();
                let db = db.clone();
                let owner = owner.clone();
                async move {
                    match summarize(&db, &owner, chats).await {
                        Ok(summaries) => callback(summaries),
                        Err(e) => {
                            tracing::warn!(user_id = %owner, error = %e, "Failed to resolve chat list")
                        }
                    }
                }
            })
            .await
    }

    async fn require_user(&self, user_id: &str) -> Result<User, AppError> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }
}

/// Attach the other participant's profile to each chat and sort the list.
async fn summarize(
    db: &FirestoreDb,
    user_id: &str,
    chats: Vec<Chat>,
) -> Result<Vec<ChatSummary>, AppError> {
    let mut summaries: Vec<ChatSummary> = stream::iter(chats)
        .map(|chat| async move {
            let other_user = match chat.other_participant(user_id) {
                Some(other) => db.get_user(other).await?,
                None => None,
            };
            Ok::<_, AppError>(ChatSummary { chat, other_user })
        })
        .buffered(MAX_CONCURRENT_LOOKUPS)
        .try_collect()
        .await?;

    sort_summaries(&mut summaries);
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_service() -> ChatService {
        ChatService::new(
            FirestoreDb::new_mock(),
            IdentityClient::new("test_api_key", Some("127.0.0.1:1")),
        )
    }

    #[tokio::test]
    async fn self_contact_is_rejected_before_any_io() {
        let service = offline_service();
        let err = service.add_contact("alice", "alice").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn self_chat_is_rejected_before_any_io() {
        let service = offline_service();
        let err = service.create_chat("alice", "alice").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn blank_message_is_rejected_before_any_io() {
        let service = offline_service();
        let err = service.send_message("c1", "alice", "  \n").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn blank_name_is_rejected_before_any_io() {
        let service = offline_service();
        let err = service
            .sign_up("   ", "ada@example.com", "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn blank_search_matches_nobody() {
        let service = offline_service();
        assert!(service.search_users("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summarize_nothing_is_empty() {
        let db = FirestoreDb::new_mock();
        assert!(summarize(&db, "alice", Vec::new()).await.unwrap().is_empty());
    }
}
