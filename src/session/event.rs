//! Discrete user actions and their results.

use serde::{Deserialize, Serialize};

use crate::domain::ids::ConversationId;
use crate::storage::types::Conversation;

/// How a delete request names its target.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRef {
    /// By id.
    Id(ConversationId),
    /// By topic, as picked from the sidebar selector.
    Topic(String),
}

/// A user action on the session.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Create a conversation and make it active.
    StartConversation {
        /// Topic for the new conversation.
        topic: String,
    },
    /// Delete a conversation and its messages.
    DeleteConversation {
        /// Conversation to delete.
        target: ConversationRef,
    },
    /// Make a stored conversation active.
    LoadConversation {
        /// Conversation to load.
        id: ConversationId,
    },
    /// Send a message in the active conversation.
    SendMessage {
        /// Message text.
        text: String,
    },
}

/// What a successfully processed event did.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// A conversation was created and selected.
    Started {
        /// The new conversation.
        conversation: Conversation,
    },
    /// A conversation was deleted.
    Deleted {
        /// Deleted conversation.
        conversation: Conversation,
        /// Whether the session was showing it (and has been cleared).
        was_active: bool,
    },
    /// The delete target did not exist.
    NothingToDelete,
    /// A stored conversation was selected.
    Loaded {
        /// The loaded conversation.
        conversation: Conversation,
        /// Number of messages rehydrated.
        message_count: usize,
    },
    /// The responder answered and the exchange was stored.
    Replied {
        /// Conversation the exchange belongs to.
        conversation_id: ConversationId,
        /// The bot reply.
        reply: String,
    },
}

impl Outcome {
    /// Human-readable summary for the notice area.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Started { conversation } => {
                format!("Started conversation \"{}\"", conversation.topic)
            }
            Self::Deleted { conversation, .. } => {
                format!("Deleted conversation \"{}\"", conversation.topic)
            }
            Self::NothingToDelete => "No matching conversation to delete".to_string(),
            Self::Loaded {
                conversation,
                message_count,
            } => format!(
                "Loaded \"{}\" ({message_count} messages)",
                conversation.topic
            ),
            Self::Replied { .. } => "Reply received".to_string(),
        }
    }
}
