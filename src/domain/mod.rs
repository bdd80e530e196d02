//! Shared building blocks: identifiers, sender tags, errors and configuration.

pub mod config;
pub mod errors;
pub mod ids;
pub mod sender;

pub use config::{
    AppConfig, LlmConfig, LlmProvider, ServerConfig, SessionConfig, StorageConfig,
};
pub use errors::{
    ChatError, ChatResult, ConfigError, ResponderError, StoreError, StoreResult,
};
pub use ids::{ConversationId, MessageId};
pub use sender::Sender;
