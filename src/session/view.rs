//! Pure projection of session state into what the page displays.

use serde::Serialize;

use crate::domain::ids::ConversationId;
use crate::session::state::{DisplayedMessage, SessionState};
use crate::storage::types::Conversation;

/// Page title.
pub const PAGE_TITLE: &str = "Chatbot UI";
/// Sidebar header.
pub const SIDEBAR_HEADER: &str = "Conversation History";
/// Main panel text while nothing is selected.
pub const IDLE_PROMPT: &str =
    "Start a new conversation or select an existing one from the sidebar.";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Severity of a notice.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// A failed action.
    Error,
}

/// Non-fatal message shown above the main panel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text.
    pub text: String,
}

impl Notice {
    /// Informational notice.
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    /// Error notice.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Sidebar row for a stored conversation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ConversationEntry {
    /// Conversation id, used by the load and delete actions.
    pub id: ConversationId,
    /// Topic label.
    pub topic: String,
    /// Creation time, formatted for display.
    pub created_at: String,
    /// Label of the load button.
    pub load_label: String,
    /// Whether this row is the active conversation.
    pub active: bool,
}

/// Sidebar contents.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Sidebar {
    /// Header text.
    pub header: &'static str,
    /// Stored conversations, newest first.
    pub conversations: Vec<ConversationEntry>,
}

/// Main panel contents.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MainPanel {
    /// No active conversation.
    Idle {
        /// Prompt to start or select one.
        prompt: &'static str,
    },
    /// A conversation is selected.
    Active {
        /// Active conversation id.
        conversation_id: ConversationId,
        /// Header line.
        header: String,
        /// History, oldest first.
        messages: Vec<DisplayedMessage>,
        /// Whether the send control is enabled.
        can_send: bool,
    },
}

/// Everything the page needs to draw itself.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ViewModel {
    /// Page title.
    pub title: &'static str,
    /// Sidebar.
    pub sidebar: Sidebar,
    /// Main panel.
    pub main: MainPanel,
    /// A reply is pending.
    pub busy: bool,
    /// Result of the last action, if any.
    pub notice: Option<Notice>,
}

/// Render the view for the given state and stored conversation list.
#[must_use]
pub fn render(
    state: &SessionState,
    conversations: &[Conversation],
    busy: bool,
    notice: Option<Notice>,
) -> ViewModel {
    let entries = conversations
        .iter()
        .map(|conversation| ConversationEntry {
            id: conversation.id,
            topic: conversation.topic.clone(),
            created_at: conversation.created_at.format(TIMESTAMP_FORMAT).to_string(),
            load_label: format!("Load {}", conversation.topic),
            active: state.is_active(conversation.id),
        })
        .collect();

    let main = match &state.active {
        None => MainPanel::Idle {
            prompt: IDLE_PROMPT,
        },
        Some(active) => MainPanel::Active {
            conversation_id: active.id,
            header: format!("Topic: {}", active.topic),
            messages: state.displayed_messages.clone(),
            can_send: !busy,
        },
    };

    ViewModel {
        title: PAGE_TITLE,
        sidebar: Sidebar {
            header: SIDEBAR_HEADER,
            conversations: entries,
        },
        main,
        busy,
        notice,
    }
}
