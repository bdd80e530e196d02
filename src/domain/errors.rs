//! Error types for the chat desk.

use thiserror::Error;

use crate::domain::ids::ConversationId;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid or unsupported values.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Conversation storage error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` storage error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    /// The referenced conversation does not exist.
    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),
    /// The caller passed a value the store refuses to persist.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A stored row could not be decoded.
    #[error("invalid stored row: {0}")]
    InvalidRow(String),
}

/// Convenience result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced while asking the language model for a reply.
#[derive(Debug, Error)]
pub enum ResponderError {
    /// The endpoint could not be reached.
    #[error("network error: {0}")]
    Network(String),
    /// The endpoint rejected the credential.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The endpoint is throttling requests.
    #[error("rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited {
        /// Seconds to wait before retrying, when the endpoint says so.
        retry_after_secs: Option<u64>,
    },
    /// Any other non-success HTTP status.
    #[error("endpoint returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the body.
        message: String,
    },
    /// Error reported by the provider client library.
    #[error("provider error: {0}")]
    Provider(String),
    /// The reply could not be decoded or carried no content.
    #[error("malformed reply: {0}")]
    MalformedReply(String),
    /// The model produced only whitespace.
    #[error("the model returned an empty reply")]
    EmptyReply,
    /// No reply arrived within the configured bound.
    #[error("timed out waiting for the model")]
    Timeout,
    /// The client could not be constructed.
    #[error("client configuration error: {0}")]
    Client(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs.map_or_else(String::new, |secs| format!(", retry after {secs}s"))
}

impl From<reqwest::Error> for ResponderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::MalformedReply(err.to_string())
        } else if err.is_builder() {
            Self::Client(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors surfaced by session actions. None of them is fatal to the process.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Empty topic or empty message.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A message was sent while no conversation is selected.
    #[error("no active conversation; start or load one first")]
    NoActiveConversation,
    /// A reply is still pending for this session.
    #[error("a reply is already being generated")]
    Busy,
    /// The requested conversation does not exist.
    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),
    /// Persistence failure.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    /// Responder failure.
    #[error("responder error: {0}")]
    Responder(#[from] ResponderError),
}

impl ChatError {
    /// Short machine-readable tag for the error class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NoActiveConversation => "no_active_conversation",
            Self::Busy => "busy",
            Self::ConversationNotFound(_) => "not_found",
            Self::Store(_) => "storage",
            Self::Responder(ResponderError::Timeout) => "responder_timeout",
            Self::Responder(_) => "responder",
        }
    }
}

/// Convenience result alias for session actions.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_message() {
        let err = ResponderError::RateLimited {
            retry_after_secs: Some(12),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 12s");

        let err = ResponderError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn test_chat_error_kind() {
        assert_eq!(ChatError::Busy.kind(), "busy");
        assert_eq!(
            ChatError::from(ResponderError::Timeout).kind(),
            "responder_timeout"
        );
        assert_eq!(
            ChatError::from(StoreError::ConversationNotFound(ConversationId(3))).kind(),
            "storage"
        );
    }
}
