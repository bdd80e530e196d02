//! Per-conversation conditioning context.
//!
//! Each conversation owns its own transcript. It is rebuilt from storage when
//! the conversation is loaded and passed explicitly to every responder call,
//! so switching conversations never leaks turns from one into another.

use crate::domain::ids::ConversationId;
use crate::domain::sender::Sender;
use crate::storage::types::StoredMessage;

/// One turn of a transcript.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Turn {
    /// Author of the turn.
    pub sender: Sender,
    /// Turn text.
    pub body: String,
}

impl Turn {
    /// Build a turn.
    #[must_use]
    pub fn new(sender: Sender, body: impl Into<String>) -> Self {
        Self {
            sender,
            body: body.into(),
        }
    }

    /// Approximate rendered size: body plus a role prefix and newline.
    #[must_use]
    pub fn estimate_len(&self) -> usize {
        self.body.len() + 8
    }
}

/// Transcript of a single conversation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConversationContext {
    conversation_id: ConversationId,
    turns: Vec<Turn>,
}

impl ConversationContext {
    /// An empty context for a freshly created conversation.
    #[must_use]
    pub const fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            turns: Vec::new(),
        }
    }

    /// Rebuild a context from stored messages (already in timestamp order).
    #[must_use]
    pub fn from_messages(conversation_id: ConversationId, messages: &[StoredMessage]) -> Self {
        let turns = messages
            .iter()
            .map(|m| Turn::new(m.sender, m.body.clone()))
            .collect();
        Self {
            conversation_id,
            turns,
        }
    }

    /// Conversation this context belongs to.
    #[must_use]
    pub const fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// All turns, oldest first.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Record a stored user/bot exchange.
    pub fn push_exchange(&mut self, user_body: impl Into<String>, bot_body: impl Into<String>) {
        self.turns.push(Turn::new(Sender::User, user_body));
        self.turns.push(Turn::new(Sender::Bot, bot_body));
    }

    /// The most recent turns whose combined size fits `max_chars`.
    ///
    /// Oldest turns are dropped first; the result is always a suffix.
    #[must_use]
    pub fn window(&self, max_chars: usize) -> &[Turn] {
        let mut used = 0_usize;
        let mut start = self.turns.len();
        for (idx, turn) in self.turns.iter().enumerate().rev() {
            let next = used + turn.estimate_len();
            if next > max_chars {
                break;
            }
            used = next;
            start = idx;
        }
        &self.turns[start..]
    }
}
