// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Real-time query listeners.
//!
//! A subscription starts from a one-shot query of the current results, then
//! folds the Listen stream's document changes into that set. The `firestore`
//! crate consumes target changes that carry a resume token (`CURRENT`,
//! `NO_CHANGE`), so snapshots are driven by document changes alone.

use crate::error::AppError;
use crate::models::{Chat, Message};
use firestore::{FirestoreListenEvent, FirestoreListener, FirestoreMemListenStateStorage};
use gcloud_sdk::google::firestore::v1::target_change::TargetChangeType;
use serde::de::DeserializeOwned;
use std::cmp::Ordering;
use std::collections::HashMap;

/// A document type that can back a subscription.
pub trait FeedDocument: DeserializeOwned + Clone + PartialEq + Send + Sync + 'static {
    /// Firestore document id.
    fn key(&self) -> &str;
}

impl FeedDocument for Message {
    fn key(&self) -> &str {
        &self.id
    }
}

impl FeedDocument for Chat {
    fn key(&self) -> &str {
        &self.id
    }
}

/// A listener event reduced to what the result set cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent<T> {
    /// Document added to or changed within the query results.
    Upsert { id: String, doc: T },
    /// Document deleted or no longer matching the query.
    Remove { id: String },
    /// The server dropped its state for the target.
    Reset,
    /// Number of documents the server holds for the target.
    ExpectCount(usize),
}

/// What the subscriber should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedAction {
    Idle,
    /// The results changed; hand out a new snapshot.
    Deliver,
    /// The local results can't be trusted; reload them with a query.
    Resync,
}

/// Local copy of a listened query's results.
#[derive(Debug)]
pub struct DocumentFeed<T> {
    docs: HashMap<String, T>,
}

impl<T> Default for DocumentFeed<T> {
    fn default() -> Self {
        Self {
            docs: HashMap::new(),
        }
    }
}

impl<T: FeedDocument> DocumentFeed<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the results with a freshly queried set. Returns `true` if
    /// that changed anything.
    pub fn seed(&mut self, docs: Vec<T>) -> bool {
        let docs: HashMap<String, T> = docs
            .into_iter()
            .map(|doc| (doc.key().to_string(), doc))
            .collect();
        let changed = docs != self.docs;
        self.docs = docs;
        changed
    }

    pub fn apply(&mut self, event: FeedEvent<T>) -> FeedAction {
        match event {
            FeedEvent::Upsert { id, doc } => {
                if self.docs.get(&id) == Some(&doc) {
                    return FeedAction::Idle;
                }
                self.docs.insert(id, doc);
                FeedAction::Deliver
            }
            FeedEvent::Remove { id } => match self.docs.remove(&id) {
                Some(_) => FeedAction::Deliver,
                None => FeedAction::Idle,
            },
            FeedEvent::Reset => FeedAction::Resync,
            FeedEvent::ExpectCount(count) if count != self.docs.len() => FeedAction::Resync,
            FeedEvent::ExpectCount(_) => FeedAction::Idle,
        }
    }

    /// Current results in the given order.
    pub fn snapshot(&self, compare: impl FnMut(&T, &T) -> Ordering) -> Vec<T> {
        let mut docs: Vec<T> = self.docs.values().cloned().collect();
        docs.sort_by(compare);
        docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Last path segment of a full document name
/// (`projects/p/databases/(default)/documents/messages/abc` -> `abc`).
pub fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Convert a raw listener event into a [`FeedEvent`].
pub fn feed_event<T: DeserializeOwned>(event: &FirestoreListenEvent) -> Option<FeedEvent<T>> {
    match event {
        FirestoreListenEvent::DocumentChange(change) => {
            let doc = change.document.as_ref()?;
            let id = document_id(&doc.name).to_string();

            if change.target_ids.is_empty() && !change.removed_target_ids.is_empty() {
                return Some(FeedEvent::Remove { id });
            }

            match firestore::FirestoreDb::deserialize_doc_to::<T>(doc) {
                Ok(doc) => Some(FeedEvent::Upsert { id, doc }),
                Err(e) => {
                    tracing::warn!(doc = %doc.name, error = %e, "Skipping undecodable document");
                    None
                }
            }
        }
        FirestoreListenEvent::DocumentDelete(delete) => Some(FeedEvent::Remove {
            id: document_id(&delete.document).to_string(),
        }),
        FirestoreListenEvent::DocumentRemove(remove) => Some(FeedEvent::Remove {
            id: document_id(&remove.document).to_string(),
        }),
        FirestoreListenEvent::TargetChange(change) => match change.target_change_type() {
            TargetChangeType::Reset => Some(FeedEvent::Reset),
            _ => None,
        },
        FirestoreListenEvent::Filter(filter) => {
            Some(FeedEvent::ExpectCount(filter.count.max(0) as usize))
        }
    }
}

pub(crate) type QueryListener = FirestoreListener<firestore::FirestoreDb, FirestoreMemListenStateStorage>;

/// Handle for a running subscription.
///
/// Call [`Subscription::unsubscribe`] to stop it; dropping the handle stops
/// it in the background.
pub struct Subscription {
    listener: Option<QueryListener>,
    kind: &'static str,
}

impl Subscription {
    pub(crate) fn new(listener: QueryListener, kind: &'static str) -> Self {
        Self {
            listener: Some(listener),
            kind,
        }
    }

    /// Stop delivering snapshots and close the listen stream.
    pub async fn unsubscribe(mut self) -> Result<(), AppError> {
        if let Some(mut listener) = self.listener.take() {
            listener
                .shutdown()
                .await
                .map_err(|e| AppError::Database(format!("Listener shutdown failed: {}", e)))?;
            tracing::debug!(kind = self.kind, "Subscription closed");
        }
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(mut listener) = self.listener.take() else {
            return;
        };
        let kind = self.kind;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = listener.shutdown().await {
                        tracing::warn!(kind, error = %e, "Listener shutdown failed");
                    } else {
                        tracing::debug!(kind, "Subscription dropped");
                    }
                });
            }
            Err(_) => tracing::warn!(kind, "Subscription dropped outside a runtime"),
        }
    }
}
