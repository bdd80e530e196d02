//! Presentation session: state, events, the state machine and its view.

pub mod chat_session;
pub mod context_cache;
pub mod event;
pub mod state;
pub mod view;

pub use chat_session::ChatSession;
pub use context_cache::ContextCache;
pub use event::{ConversationRef, Outcome, SessionEvent};
pub use state::{ActiveConversation, DisplayedMessage, SessionState};
pub use view::{MainPanel, Notice, NoticeLevel, ViewModel, render};
