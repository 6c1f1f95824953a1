// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod chat;
pub mod identity;
pub mod session;
pub mod token_verifier;

pub use chat::ChatService;
pub use identity::{AuthCredentials, IdentityClient};
pub use session::{AuthListener, AuthSession};
pub use token_verifier::{FirebaseTokenVerifier, TokenError, VerifiedUser};
