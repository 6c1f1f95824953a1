// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod chat;
pub mod message;
pub mod user;

pub use chat::{Chat, ChatSummary};
pub use message::Message;
pub use user::User;
