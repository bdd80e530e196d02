//! Stored records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ConversationId, MessageId};
use crate::domain::sender::Sender;

/// A named thread of chat turns.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Identifier assigned on insert.
    pub id: ConversationId,
    /// Topic given at creation; never edited afterwards.
    pub topic: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// One sender-tagged utterance inside a conversation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Identifier assigned on insert.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Write time, used for ordering.
    pub created_at: DateTime<Utc>,
    /// Author.
    pub sender: Sender,
    /// Message text.
    pub body: String,
}
