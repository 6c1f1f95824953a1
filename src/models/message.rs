// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Message stored in the `messages` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Message {
    pub id: String,
    /// Owning chat
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    /// Server time of the write; `None` until the write is committed
    #[serde(default, with = "firestore::serialize_as_optional_timestamp")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// Oldest first, ties broken by id.
    pub fn chronological(a: &Message, b: &Message) -> Ordering {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.id.cmp(&b.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn msg(id: &str, secs: Option<i64>) -> Message {
        Message {
            id: id.to_string(),
            chat_id: "c1".to_string(),
            sender_id: "u1".to_string(),
            text: "hi".to_string(),
            timestamp: secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            read: false,
        }
    }

    #[test]
    fn chronological_orders_by_time_then_id() {
        let mut messages = vec![msg("b", Some(20)), msg("c", Some(10)), msg("a", Some(20))];
        messages.sort_by(Message::chronological);

        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }
}
