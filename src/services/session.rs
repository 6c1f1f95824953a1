// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side authentication state.
//!
//! `AuthSession` remembers who is signed in and notifies registered
//! listeners whenever that changes.

use crate::error::AppError;
use anyhow::Context;
use crate::services::chat::ChatService;
use crate::services::identity::AuthCredentials;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Current sign-in state plus auth-change listeners.
pub struct AuthSession {
    state: watch::Sender<Option<AuthCredentials>>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<AuthCredentials> {
        self.state.borrow().clone()
    }

    /// Create an account and profile, then make it the current user.
    pub async fn sign_up(
        &self,
        service: &ChatService,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthCredentials, AppError> {
        let credentials = service.sign_up(name, email, password).await?;
        self.restore(credentials.clone());
        Ok(credentials)
    }

    /// Sign in and make the account the current user.
    pub async fn sign_in(
        &self,
        service: &ChatService,
        email: &str,
        password: &str,
    ) -> Result<AuthCredentials, AppError> {
        let credentials = service.sign_in(email, password).await?;
        self.restore(credentials.clone());
        Ok(credentials)
    }

    /// Install previously obtained credentials (e.g. a persisted session).
    pub fn restore(&self, credentials: AuthCredentials) {
        tracing::debug!(uid = %credentials.uid, "Session started");
        self.state.send_replace(Some(credentials));
    }

    /// Sign out the current user.
    pub fn logout(&self) {
        if let Some(previous) = self.state.send_replace(None) {
            tracing::debug!(uid = %previous.uid, "Session ended");
        }
    }

    /// Call `callback` with the current user now and after every change.
    ///
    /// Rapid successive changes may be coalesced into the latest state. The
    /// listener runs as a task on the current Tokio runtime; calling this
    /// outside one is an error.
    pub fn on_auth_change<F>(&self, callback: F) -> Result<AuthListener, AppError>
    where
        F: Fn(Option<AuthCredentials>) + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .context("Auth listeners need a Tokio runtime")?;
        let mut rx = self.state.subscribe();

        let handle = runtime.spawn(async move {
            loop {
                let user = rx.borrow_and_update().clone();
                callback(user);
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });

        Ok(AuthListener { handle })
    }
}

/// Registration of an auth-change callback; unregisters on drop.
pub struct AuthListener {
    handle: JoinHandle<()>,
}

impl AuthListener {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for AuthListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
