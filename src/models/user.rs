// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User profile stored in Firestore under `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    /// Firebase Auth uid (also used as document ID)
    pub id: String,
    /// Display name
    pub name: String,
    /// Email address used to sign in
    pub email: String,
    /// Set by the server when the profile is created
    #[serde(default, with = "firestore::serialize_as_optional_timestamp")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
    /// Uids of this user's contacts
    #[serde(default)]
    pub contacts: Vec<String>,
    /// Ids of the chats this user takes part in
    #[serde(default)]
    pub chats: Vec<String>,
}

impl User {
    /// A fresh profile with no contacts or chats.
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            created_at: None,
            contacts: Vec::new(),
            chats: Vec::new(),
        }
    }
}
