//! Persistence of conversations and messages.

pub mod conversation_store;
pub mod types;

pub use conversation_store::{ConversationStore, SqliteConversationStore, StoreFuture};
pub use types::{Conversation, StoredMessage};
