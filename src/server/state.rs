//! Application state shared across all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::domain::config::AppConfig;
use crate::llm::build_responder;
use crate::session::ChatSession;
use crate::storage::{ConversationStore, SqliteConversationStore};

/// Shared application state.
pub struct AppState {
    /// The chat session driven by UI events.
    pub session: Arc<ChatSession>,
    /// Directory holding the static page.
    pub static_dir: PathBuf,
}

impl AppState {
    /// Wrap an existing session.
    #[must_use]
    pub fn new(session: Arc<ChatSession>, static_dir: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            session,
            static_dir: static_dir.into(),
        })
    }

    /// Open the store, build the responder and create the session.
    ///
    /// # Errors
    /// Returns an error if any component cannot be created.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Arc<Self>> {
        let store = SqliteConversationStore::open(&config.storage.sqlite_path)
            .await
            .with_context(|| {
                format!(
                    "failed to open conversation store at {}",
                    config.storage.sqlite_path.display()
                )
            })?;
        let store: Arc<dyn ConversationStore> = Arc::new(store);

        let responder = build_responder(&config.llm, &config.session)
            .context("failed to create responder")?;

        let session = ChatSession::new(store, responder, &config.session)
            .context("failed to create chat session")?;

        Ok(Self::new(Arc::new(session), config.server.static_dir.clone()))
    }
}
