// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Start one with `gcloud emulators firestore start` and export
//! FIRESTORE_EMULATOR_HOST before running them.
//!
//! Every test works with freshly generated ids, so runs don't interfere.

use chat_backend::error::AppError;
use chat_backend::models::User;
use chat_backend::services::{ChatService, IdentityClient};
use std::time::Duration;
use tokio::sync::mpsc;

mod common;
use common::test_db;

/// Generate a unique id for test isolation.
fn unique_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

async fn test_service() -> ChatService {
    let identity = IdentityClient::new("test-api-key".to_string(), Some("127.0.0.1:1"));
    ChatService::new(test_db().await, identity)
}

/// Create a profile directly, skipping the identity service.
async fn create_user(service: &ChatService, name: &str) -> User {
    let id = unique_id(name);
    let user = User::new(&id, name, format!("{}@example.com", id.to_lowercase()));
    service.db().create_user_profile(&user).await.unwrap();
    user
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_profile_creation() {
    require_emulator!();

    let service = test_service().await;
    let missing = service.get_user(&unique_id("ghost")).await.unwrap();
    assert!(missing.is_none(), "User should not exist before creation");

    let user = create_user(&service, "ada").await;

    let fetched = service.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, user.id);
    assert_eq!(fetched.name, "ada");
    assert_eq!(fetched.email, user.email);
    assert!(fetched.contacts.is_empty());
    assert!(fetched.chats.is_empty());
    assert!(fetched.created_at.is_some(), "createdAt is set by the server");
}

#[tokio::test]
async fn test_user_lookup_by_email() {
    require_emulator!();

    let service = test_service().await;
    let user = create_user(&service, "grace").await;

    let found = service.get_user_by_email(&user.email).await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id));

    let none = service
        .get_user_by_email("nobody-at-all@example.com")
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_search_users_by_prefix() {
    require_emulator!();

    let service = test_service().await;
    let user = create_user(&service, "searchable").await;

    let prefix = &user.email[..user.email.len() - "@example.com".len()];
    let results = service.search_users(prefix).await.unwrap();
    assert!(results.iter().any(|u| u.id == user.id));
    assert!(results.iter().all(|u| u.email.starts_with(prefix)));

    assert!(service.search_users("   ").await.unwrap().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// CONTACT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_add_and_remove_contact() {
    require_emulator!();

    let service = test_service().await;
    let alice = create_user(&service, "alice").await;
    let bob = create_user(&service, "bob").await;

    service.add_contact(&alice.id, &bob.id).await.unwrap();
    // Adding twice keeps a single entry.
    service.add_contact(&alice.id, &bob.id).await.unwrap();

    let contacts = service.get_contacts(&alice.id).await.unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].id, bob.id);

    // Contacts are one-directional.
    assert!(service.get_contacts(&bob.id).await.unwrap().is_empty());

    service.remove_contact(&alice.id, &bob.id).await.unwrap();
    assert!(service.get_contacts(&alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_unknown_contact_fails() {
    require_emulator!();

    let service = test_service().await;
    let alice = create_user(&service, "alice").await;

    let result = service.add_contact(&alice.id, &unique_id("ghost")).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_contact_writes_require_existing_owner() {
    require_emulator!();

    let service = test_service().await;
    let bob = create_user(&service, "bob").await;

    let ghost = unique_id("ghost");
    let result = service.add_contact(&ghost, &bob.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(
        service.get_user(&ghost).await.unwrap().is_none(),
        "A failed contact write must not create a stub profile"
    );

    let ghost = unique_id("ghost");
    let result = service.remove_contact(&ghost, &bob.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(service.get_user(&ghost).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_user_has_no_contacts_or_chats() {
    require_emulator!();

    let service = test_service().await;
    let ghost = unique_id("ghost");

    assert!(service.get_contacts(&ghost).await.unwrap().is_empty());
    assert!(service.get_chats(&ghost).await.unwrap().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// CHAT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_chat_links_both_users() {
    require_emulator!();

    let service = test_service().await;
    let alice = create_user(&service, "alice").await;
    let bob = create_user(&service, "bob").await;

    let chat_id = service.create_chat(&alice.id, &bob.id).await.unwrap();
    assert_eq!(chat_id.len(), 20);

    let alice_after = service.get_user(&alice.id).await.unwrap().unwrap();
    let bob_after = service.get_user(&bob.id).await.unwrap().unwrap();
    assert_eq!(alice_after.chats, vec![chat_id.clone()]);
    assert_eq!(bob_after.chats, vec![chat_id.clone()]);

    let chat = service.get_chat_for(&chat_id, &bob.id).await.unwrap();
    assert!(chat.has_participant(&alice.id));
    assert!(chat.has_participant(&bob.id));
    assert!(chat.created_at.is_some());
    assert!(chat.last_message.is_none());
}

#[tokio::test]
async fn test_create_chat_reuses_existing() {
    require_emulator!();

    let service = test_service().await;
    let alice = create_user(&service, "alice").await;
    let bob = create_user(&service, "bob").await;

    let first = service.create_chat(&alice.id, &bob.id).await.unwrap();
    let second = service.create_chat(&bob.id, &alice.id).await.unwrap();
    assert_eq!(first, second, "Either side should find the same chat");

    let alice_after = service.get_user(&alice.id).await.unwrap().unwrap();
    assert_eq!(alice_after.chats.len(), 1);
}

#[tokio::test]
async fn test_chat_access_limited_to_participants() {
    require_emulator!();

    let service = test_service().await;
    let alice = create_user(&service, "alice").await;
    let bob = create_user(&service, "bob").await;
    let eve = create_user(&service, "eve").await;

    let chat_id = service.create_chat(&alice.id, &bob.id).await.unwrap();

    let result = service.get_chat_for(&chat_id, &eve.id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = service.send_message(&chat_id, &eve.id, "hi").await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = service.get_chat_for(&unique_id("nochat"), &alice.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_get_chats_skips_missing_chat_ids() {
    require_emulator!();

    let service = test_service().await;
    let bob = create_user(&service, "bob").await;

    let id = unique_id("alice");
    let mut alice = User::new(&id, "alice", format!("{}@example.com", id));
    alice.chats = vec![unique_id("deleted-chat")];
    service.db().create_user_profile(&alice).await.unwrap();

    let chat_id = service.create_chat(&alice.id, &bob.id).await.unwrap();

    let summaries = service.get_chats(&alice.id).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].chat.id, chat_id);
}

#[tokio::test]
async fn test_get_chats_puts_silent_chats_last() {
    require_emulator!();

    let service = test_service().await;
    let alice = create_user(&service, "alice").await;
    let bob = create_user(&service, "bob").await;
    let carol = create_user(&service, "carol").await;

    let with_message = service.create_chat(&alice.id, &bob.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let silent = service.create_chat(&alice.id, &carol.id).await.unwrap();

    service
        .send_message(&with_message, &bob.id, "anyone there?")
        .await
        .unwrap();

    let summaries = service.get_chats(&alice.id).await.unwrap();
    let order: Vec<_> = summaries.iter().map(|s| s.chat.id.as_str()).collect();
    assert_eq!(order, vec![with_message.as_str(), silent.as_str()]);
}

// ═══════════════════════════════════════════════════════════════════════════
// MESSAGE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_send_message_updates_chat() {
    require_emulator!();

    let service = test_service().await;
    let alice = create_user(&service, "alice").await;
    let bob = create_user(&service, "bob").await;
    let chat_id = service.create_chat(&alice.id, &bob.id).await.unwrap();

    service
        .send_message(&chat_id, &alice.id, "hello bob")
        .await
        .unwrap();

    let chat = service.get_chat_for(&chat_id, &alice.id).await.unwrap();
    assert_eq!(chat.last_message.as_deref(), Some("hello bob"));
    assert!(chat.last_message_time.is_some());

    let summaries = service.get_chats(&bob.id).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].chat.id, chat_id);
    assert_eq!(
        summaries[0].other_user.as_ref().map(|u| u.id.as_str()),
        Some(alice.id.as_str())
    );
}

#[tokio::test]
async fn test_messages_returned_in_order() {
    require_emulator!();

    let service = test_service().await;
    let alice = create_user(&service, "alice").await;
    let bob = create_user(&service, "bob").await;
    let chat_id = service.create_chat(&alice.id, &bob.id).await.unwrap();

    for text in ["one", "two", "three"] {
        service.send_message(&chat_id, &alice.id, text).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let messages = service.get_messages(&chat_id).await.unwrap();
    let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
    assert!(messages.iter().all(|m| m.timestamp.is_some()));
    assert!(messages.iter().all(|m| !m.read));
}

#[tokio::test]
async fn test_mark_chat_read_only_touches_incoming() {
    require_emulator!();

    let service = test_service().await;
    let alice = create_user(&service, "alice").await;
    let bob = create_user(&service, "bob").await;
    let chat_id = service.create_chat(&alice.id, &bob.id).await.unwrap();

    service.send_message(&chat_id, &alice.id, "ping").await.unwrap();
    service.send_message(&chat_id, &bob.id, "pong").await.unwrap();

    let updated = service.mark_chat_read(&chat_id, &bob.id).await.unwrap();
    assert_eq!(updated, 1);

    let messages = service.get_messages(&chat_id).await.unwrap();
    for message in &messages {
        assert_eq!(message.read, message.sender_id == alice.id);
    }

    // Nothing left to mark.
    assert_eq!(service.mark_chat_read(&chat_id, &bob.id).await.unwrap(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// SUBSCRIPTION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_message_subscription_receives_new_messages() {
    require_emulator!();

    let service = test_service().await;
    let alice = create_user(&service, "alice").await;
    let bob = create_user(&service, "bob").await;
    let chat_id = service.create_chat(&alice.id, &bob.id).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = service
        .subscribe_to_messages(&chat_id, move |messages| {
            let _ = tx.send(messages);
        })
        .await
        .unwrap();

    // Initial snapshot of an empty chat.
    let initial = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("initial snapshot")
        .unwrap();
    assert!(initial.is_empty());

    service
        .send_message(&chat_id, &bob.id, "live update")
        .await
        .unwrap();

    let snapshot = loop {
        let next = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("snapshot after send")
            .unwrap();
        if !next.is_empty() {
            break next;
        }
    };
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].text, "live update");

    subscription.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_chat_subscription_lists_new_chat() {
    require_emulator!();

    let service = test_service().await;
    let alice = create_user(&service, "alice").await;
    let bob = create_user(&service, "bob").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = service
        .subscribe_to_chats(&alice.id, move |chats| {
            let _ = tx.send(chats);
        })
        .await
        .unwrap();

    let chat_id = service.create_chat(&alice.id, &bob.id).await.unwrap();

    let summaries = loop {
        let next = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("chat snapshot")
            .unwrap();
        if !next.is_empty() {
            break next;
        }
    };
    assert_eq!(summaries[0].chat.id, chat_id);
    assert_eq!(
        summaries[0].other_user.as_ref().map(|u| u.name.as_str()),
        Some("bob")
    );

    subscription.unsubscribe().await.unwrap();
}
