//! Ephemeral per-session state.

use serde::Serialize;

use crate::domain::ids::ConversationId;
use crate::domain::sender::Sender;
use crate::storage::types::{Conversation, StoredMessage};

/// The conversation currently shown in the main panel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ActiveConversation {
    /// Conversation id.
    pub id: ConversationId,
    /// Topic label.
    pub topic: String,
}

/// A `(sender, body)` pair in the displayed history.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DisplayedMessage {
    /// Author.
    pub sender: Sender,
    /// Message text.
    pub body: String,
}

impl DisplayedMessage {
    /// Build a displayed message.
    #[must_use]
    pub fn new(sender: Sender, body: impl Into<String>) -> Self {
        Self {
            sender,
            body: body.into(),
        }
    }
}

impl From<&StoredMessage> for DisplayedMessage {
    fn from(message: &StoredMessage) -> Self {
        Self::new(message.sender, message.body.clone())
    }
}

/// View cache of the selected conversation plus any turns added since load.
///
/// Never persisted. The initial value has no active conversation and an
/// empty history.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SessionState {
    /// Selected conversation, if any.
    pub active: Option<ActiveConversation>,
    /// History shown for the selected conversation.
    pub displayed_messages: Vec<DisplayedMessage>,
}

impl SessionState {
    /// Select a conversation and replace the displayed history.
    pub fn activate(&mut self, conversation: &Conversation, messages: Vec<DisplayedMessage>) {
        self.active = Some(ActiveConversation {
            id: conversation.id,
            topic: conversation.topic.clone(),
        });
        self.displayed_messages = messages;
    }

    /// Drop the selection and its history.
    pub fn clear(&mut self) {
        self.active = None;
        self.displayed_messages.clear();
    }

    /// Whether `id` is the selected conversation.
    #[must_use]
    pub fn is_active(&self, id: ConversationId) -> bool {
        self.active.as_ref().is_some_and(|active| active.id == id)
    }

    /// Append a stored exchange to the displayed history.
    pub fn push_exchange(&mut self, user_body: &str, bot_body: &str) {
        self.displayed_messages
            .push(DisplayedMessage::new(Sender::User, user_body));
        self.displayed_messages
            .push(DisplayedMessage::new(Sender::Bot, bot_body));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_activate_and_clear() {
        let conversation = Conversation {
            id: ConversationId(4),
            topic: "Trip Planning".to_string(),
            created_at: Utc::now(),
        };
        let mut state = SessionState::default();
        assert!(!state.is_active(conversation.id));

        state.activate(
            &conversation,
            vec![DisplayedMessage::new(Sender::User, "hi")],
        );
        assert!(state.is_active(conversation.id));
        state.push_exchange("where?", "Portugal");
        assert_eq!(state.displayed_messages.len(), 3);

        state.clear();
        assert_eq!(state, SessionState::default());
    }
}
