//! Database layer (Firestore).

pub mod firestore;
pub mod listen;

pub use firestore::FirestoreDb;
pub use listen::{DocumentFeed, FeedAction, FeedDocument, FeedEvent, Subscription};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const CHATS: &str = "chats";
    pub const MESSAGES: &str = "messages";
}
