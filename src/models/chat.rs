// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-to-one chat model.

use super::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Chat between exactly two users, stored under `chats/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Chat {
    pub id: String,
    /// The two participant uids, creator first
    pub participants: Vec<String>,
    #[serde(default, with = "firestore::serialize_as_optional_timestamp")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
    /// Text of the most recent message
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default, with = "firestore::serialize_as_optional_timestamp")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub last_message_time: Option<DateTime<Utc>>,
}

impl Chat {
    pub fn new(id: impl Into<String>, user_id: &str, contact_id: &str) -> Self {
        Self {
            id: id.into(),
            participants: vec![user_id.to_string(), contact_id.to_string()],
            created_at: None,
            last_message: None,
            last_message_time: None,
        }
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .map(String::as_str)
            .find(|p| *p != user_id)
    }

    /// Most recently active first; chats without messages go last.
    pub fn most_recent_first(a: &Chat, b: &Chat) -> Ordering {
        // `None < Some(_)`, so reversing the comparison puts untimed chats last.
        b.last_message_time
            .cmp(&a.last_message_time)
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// A chat as shown in a user's chat list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChatSummary {
    #[serde(flatten)]
    #[cfg_attr(feature = "binding-generation", ts(flatten))]
    pub chat: Chat,
    /// Profile of the other participant, if it still exists
    pub other_user: Option<User>,
}

/// Sort chat summaries for display.
pub fn sort_summaries(summaries: &mut [ChatSummary]) {
    summaries.sort_by(|a, b| Chat::most_recent_first(&a.chat, &b.chat));
}
