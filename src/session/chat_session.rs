//! Session state machine driven by discrete user events.
//!
//! Each event is processed to completion (storage writes and the responder
//! call included) before its result is returned. Failed actions leave both
//! storage and session state as they were.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::config::SessionConfig;
use crate::domain::errors::{ChatError, ChatResult, ConfigError, ResponderError};
use crate::domain::ids::ConversationId;
use crate::llm::context::ConversationContext;
use crate::llm::responder::Responder;
use crate::session::context_cache::ContextCache;
use crate::session::event::{ConversationRef, Outcome, SessionEvent};
use crate::session::state::{DisplayedMessage, SessionState};
use crate::session::view::{Notice, ViewModel, render};
use crate::storage::conversation_store::ConversationStore;

/// Clears the in-flight flag when a send finishes, however it finishes.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// One user's chat session over the shared store and responder.
pub struct ChatSession {
    store: Arc<dyn ConversationStore>,
    responder: Arc<dyn Responder>,
    contexts: ContextCache,
    state: RwLock<SessionState>,
    in_flight: AtomicBool,
    reply_timeout: Duration,
}

impl ChatSession {
    /// Create a session in the initial (idle) state.
    ///
    /// # Errors
    /// Returns an error if the context cache capacity is zero.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        responder: Arc<dyn Responder>,
        config: &SessionConfig,
    ) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(config.context_cache_capacity).ok_or_else(|| {
            ConfigError::Invalid("session.context_cache_capacity must be > 0".to_string())
        })?;

        Ok(Self {
            store,
            responder,
            contexts: ContextCache::new(capacity),
            state: RwLock::new(SessionState::default()),
            in_flight: AtomicBool::new(false),
            reply_timeout: config.reply_timeout,
        })
    }

    /// Process one user action.
    ///
    /// # Errors
    /// Returns the action's error; state is left unchanged on failure.
    pub async fn dispatch(&self, event: SessionEvent) -> ChatResult<Outcome> {
        let result = match event {
            SessionEvent::StartConversation { topic } => self.start_conversation(&topic).await,
            SessionEvent::DeleteConversation { target } => self.delete_conversation(target).await,
            SessionEvent::LoadConversation { id } => self.load_conversation(id).await,
            SessionEvent::SendMessage { text } => self.send_message(&text).await,
        };

        if let Err(err) = &result {
            warn!(kind = err.kind(), "Session action failed: {err}");
        }
        result
    }

    /// Create a conversation, select it and clear the displayed history.
    ///
    /// # Errors
    /// Returns [`ChatError::InvalidInput`] for a blank topic, or a storage error.
    pub async fn start_conversation(&self, topic: &str) -> ChatResult<Outcome> {
        if topic.trim().is_empty() {
            return Err(ChatError::InvalidInput("topic must not be empty".to_string()));
        }

        let conversation = self.store.create_conversation(topic).await?;
        self.contexts
            .insert(ConversationContext::new(conversation.id))
            .await;
        self.state.write().await.activate(&conversation, Vec::new());

        info!(
            "Created conversation {}: {}",
            conversation.id, conversation.topic
        );
        Ok(Outcome::Started { conversation })
    }

    /// Delete a conversation with its messages.
    ///
    /// If the deleted conversation is the active one, the session is cleared
    /// right away. An unknown target is a no-op.
    ///
    /// # Errors
    /// Returns [`ChatError::InvalidInput`] for a blank topic, or a storage error.
    pub async fn delete_conversation(&self, target: ConversationRef) -> ChatResult<Outcome> {
        let found = match target {
            ConversationRef::Id(id) => self.store.get_conversation(id).await?,
            ConversationRef::Topic(topic) => {
                if topic.trim().is_empty() {
                    return Err(ChatError::InvalidInput(
                        "select a conversation to delete".to_string(),
                    ));
                }
                self.store.find_by_topic(&topic).await?
            }
        };

        let Some(conversation) = found else {
            debug!("Delete target not found, nothing to do");
            return Ok(Outcome::NothingToDelete);
        };

        self.store.delete_conversation(conversation.id).await?;
        self.contexts.remove(conversation.id).await;

        let was_active = {
            let mut state = self.state.write().await;
            let active = state.is_active(conversation.id);
            if active {
                state.clear();
            }
            active
        };

        info!(
            "Deleted conversation {}: {}",
            conversation.id, conversation.topic
        );
        Ok(Outcome::Deleted {
            conversation,
            was_active,
        })
    }

    /// Select a stored conversation and rehydrate its history from storage.
    ///
    /// # Errors
    /// Returns [`ChatError::ConversationNotFound`] for an unknown id, or a storage error.
    pub async fn load_conversation(&self, id: ConversationId) -> ChatResult<Outcome> {
        let conversation = self
            .store
            .get_conversation(id)
            .await?
            .ok_or(ChatError::ConversationNotFound(id))?;

        // Held across the read so a concurrent send cannot commit an exchange
        // between the read and the cache refresh.
        let mut state = self.state.write().await;
        let messages = self.store.list_messages(id).await?;
        self.contexts
            .insert(ConversationContext::from_messages(id, &messages))
            .await;
        let displayed = messages.iter().map(DisplayedMessage::from).collect();
        state.activate(&conversation, displayed);
        drop(state);

        debug!("Loaded conversation {} with {} messages", id, messages.len());
        Ok(Outcome::Loaded {
            conversation,
            message_count: messages.len(),
        })
    }

    /// Ask the responder for a reply in the active conversation and store the
    /// exchange.
    ///
    /// Nothing is written unless a reply arrived; the user message and the
    /// reply are stored together or not at all.
    ///
    /// # Errors
    /// Returns [`ChatError::InvalidInput`] for blank text,
    /// [`ChatError::NoActiveConversation`], [`ChatError::Busy`] while another
    /// send is pending, a responder error (including timeout), or a storage error.
    pub async fn send_message(&self, text: &str) -> ChatResult<Outcome> {
        if text.trim().is_empty() {
            return Err(ChatError::InvalidInput("message must not be empty".to_string()));
        }

        let active = self
            .state
            .read()
            .await
            .active
            .clone()
            .ok_or(ChatError::NoActiveConversation)?;

        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(ChatError::Busy)?;

        let context = self.context_for(active.id).await?;
        debug!(
            responder = self.responder.name(),
            conversation = %active.id,
            turns = context.turns().len(),
            "Requesting reply"
        );

        let reply = tokio::time::timeout(self.reply_timeout, self.responder.respond(&context, text))
            .await
            .map_err(|_| ResponderError::Timeout)??;

        {
            // Commit and cache update happen under one lock; loads take the same lock.
            let mut state = self.state.write().await;
            self.store.append_exchange(active.id, text, &reply).await?;
            self.contexts.push_exchange(active.id, text, &reply).await;
            if state.is_active(active.id) {
                state.push_exchange(text, &reply);
            }
        }

        debug!("Stored exchange in conversation {}", active.id);
        Ok(Outcome::Replied {
            conversation_id: active.id,
            reply,
        })
    }

    /// Copy of the current session state.
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Whether a reply is pending.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Render the current view with an optional notice.
    ///
    /// # Errors
    /// Returns a storage error if the conversation list cannot be read.
    pub async fn view(&self, notice: Option<Notice>) -> ChatResult<ViewModel> {
        let state = self.snapshot().await;
        let conversations = self.store.list_conversations().await?;
        Ok(render(&state, &conversations, self.is_busy(), notice))
    }

    async fn context_for(&self, id: ConversationId) -> ChatResult<ConversationContext> {
        if let Some(context) = self.contexts.get(id).await {
            return Ok(context);
        }
        let messages = self.store.list_messages(id).await?;
        let context = ConversationContext::from_messages(id, &messages);
        self.contexts.insert(context.clone()).await;
        Ok(context)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::errors::StoreError;
    use crate::domain::sender::Sender;
    use crate::llm::responder::scripted::{ScriptedResponder, Step};
    use crate::session::view::MainPanel;
    use crate::storage::conversation_store::{SqliteConversationStore, StoreFuture};
    use crate::storage::types::{Conversation, StoredMessage};
    use crate::domain::errors::StoreResult;

    /// SQLite store that lingers after committing an exchange.
    struct SlowCommitStore {
        inner: SqliteConversationStore,
        linger: Duration,
    }

    impl ConversationStore for SlowCommitStore {
        fn create_conversation(&self, topic: &str) -> StoreFuture<'_, StoreResult<Conversation>> {
            self.inner.create_conversation(topic)
        }

        fn append_message(
            &self,
            conversation_id: ConversationId,
            sender: Sender,
            body: &str,
        ) -> StoreFuture<'_, StoreResult<StoredMessage>> {
            self.inner.append_message(conversation_id, sender, body)
        }

        fn append_exchange(
            &self,
            conversation_id: ConversationId,
            user_body: &str,
            bot_body: &str,
        ) -> StoreFuture<'_, StoreResult<()>> {
            let write = self.inner.append_exchange(conversation_id, user_body, bot_body);
            Box::pin(async move {
                write.await?;
                tokio::time::sleep(self.linger).await;
                Ok(())
            })
        }

        fn delete_conversation(
            &self,
            conversation_id: ConversationId,
        ) -> StoreFuture<'_, StoreResult<bool>> {
            self.inner.delete_conversation(conversation_id)
        }

        fn list_conversations(&self) -> StoreFuture<'_, StoreResult<Vec<Conversation>>> {
            self.inner.list_conversations()
        }

        fn list_messages(
            &self,
            conversation_id: ConversationId,
        ) -> StoreFuture<'_, StoreResult<Vec<StoredMessage>>> {
            self.inner.list_messages(conversation_id)
        }

        fn get_conversation(
            &self,
            conversation_id: ConversationId,
        ) -> StoreFuture<'_, StoreResult<Option<Conversation>>> {
            self.inner.get_conversation(conversation_id)
        }

        fn find_by_topic(&self, topic: &str) -> StoreFuture<'_, StoreResult<Option<Conversation>>> {
            self.inner.find_by_topic(topic)
        }
    }

    async fn setup(responder: ScriptedResponder) -> (ChatSession, Arc<dyn ConversationStore>, Arc<ScriptedResponder>) {
        setup_with(responder, SessionConfig::default()).await
    }

    async fn setup_with(
        responder: ScriptedResponder,
        config: SessionConfig,
    ) -> (ChatSession, Arc<dyn ConversationStore>, Arc<ScriptedResponder>) {
        let store: Arc<dyn ConversationStore> =
            Arc::new(SqliteConversationStore::open_in_memory().await.unwrap());
        let responder = Arc::new(responder);
        let session = ChatSession::new(store.clone(), responder.clone(), &config).unwrap();
        (session, store, responder)
    }

    fn pairs(state: &SessionState) -> Vec<(Sender, String)> {
        state
            .displayed_messages
            .iter()
            .map(|m| (m.sender, m.body.clone()))
            .collect()
    }

    async fn stored_pairs(store: &Arc<dyn ConversationStore>, id: ConversationId) -> Vec<(Sender, String)> {
        store
            .list_messages(id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| (m.sender, m.body))
            .collect()
    }

    fn started_id(outcome: &Outcome) -> ConversationId {
        match outcome {
            Outcome::Started { conversation } => conversation.id,
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let (session, _, _) = setup(ScriptedResponder::default()).await;
        assert_eq!(session.snapshot().await, SessionState::default());
        assert!(!session.is_busy());

        let view = session.view(None).await.unwrap();
        assert!(matches!(view.main, MainPanel::Idle { .. }));
    }

    #[tokio::test]
    async fn test_trip_planning_scenario() {
        let (session, store, _) = setup(ScriptedResponder::replies(&["Try Portugal."])).await;

        let started = session
            .dispatch(SessionEvent::StartConversation {
                topic: "Trip Planning".to_string(),
            })
            .await
            .unwrap();
        let id = started_id(&started);

        let replied = session
            .dispatch(SessionEvent::SendMessage {
                text: "Where should I go in April?".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(
            replied,
            Outcome::Replied {
                conversation_id: id,
                reply: "Try Portugal.".to_string()
            }
        );

        let expected = vec![
            (Sender::User, "Where should I go in April?".to_string()),
            (Sender::Bot, "Try Portugal.".to_string()),
        ];
        assert_eq!(stored_pairs(&store, id).await, expected);
        assert_eq!(pairs(&session.snapshot().await), expected);

        session
            .dispatch(SessionEvent::DeleteConversation {
                target: ConversationRef::Topic("Trip Planning".to_string()),
            })
            .await
            .unwrap();
        let topics: Vec<_> = store
            .list_conversations()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.topic)
            .collect();
        assert!(!topics.contains(&"Trip Planning".to_string()));
        assert!(stored_pairs(&store, id).await.is_empty());
    }

    #[tokio::test]
    async fn test_start_clears_displayed_messages() {
        let (session, _, _) = setup(ScriptedResponder::replies(&["one"])).await;
        session.start_conversation("first").await.unwrap();
        session.send_message("hello").await.unwrap();
        assert_eq!(session.snapshot().await.displayed_messages.len(), 2);

        session.start_conversation("second").await.unwrap();
        let state = session.snapshot().await;
        assert!(state.displayed_messages.is_empty());
        assert_eq!(state.active.map(|a| a.topic), Some("second".to_string()));
    }

    #[tokio::test]
    async fn test_input_validation_leaves_state_alone() {
        let (session, store, responder) = setup(ScriptedResponder::default()).await;

        let blank_topic = session.start_conversation("  ").await;
        assert!(matches!(blank_topic, Err(ChatError::InvalidInput(_))));
        assert!(store.list_conversations().await.unwrap().is_empty());

        let no_active = session.send_message("hello").await;
        assert!(matches!(no_active, Err(ChatError::NoActiveConversation)));

        session.start_conversation("topic").await.unwrap();
        let blank_message = session.send_message("   ").await;
        assert!(matches!(blank_message, Err(ChatError::InvalidInput(_))));
        assert!(responder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_load_rehydrates_from_storage() {
        let (session, store, _) = setup(ScriptedResponder::default()).await;
        let c = store.create_conversation("history").await.unwrap();
        store.append_message(c.id, Sender::User, "hi").await.unwrap();
        store.append_message(c.id, Sender::Bot, "hello").await.unwrap();

        let outcome = session.load_conversation(c.id).await.unwrap();
        assert!(matches!(outcome, Outcome::Loaded { message_count: 2, .. }));

        let state = session.snapshot().await;
        assert!(state.is_active(c.id));
        assert_eq!(
            pairs(&state),
            vec![
                (Sender::User, "hi".to_string()),
                (Sender::Bot, "hello".to_string())
            ]
        );

        let missing = session.load_conversation(ConversationId(404)).await;
        assert!(matches!(missing, Err(ChatError::ConversationNotFound(_))));
        assert!(session.snapshot().await.is_active(c.id));
    }

    #[tokio::test]
    async fn test_responder_failure_writes_nothing() {
        let (session, store, _) = setup(ScriptedResponder::new(vec![
            Step::Fail(ResponderError::RateLimited {
                retry_after_secs: Some(3),
            }),
            Step::Reply("second try".to_string()),
        ]))
        .await;
        session.start_conversation("flaky").await.unwrap();
        let id = session.snapshot().await.active.map(|a| a.id).unwrap();

        let failed = session.send_message("hello?").await;
        assert!(matches!(
            failed,
            Err(ChatError::Responder(ResponderError::RateLimited { .. }))
        ));
        assert!(stored_pairs(&store, id).await.is_empty());
        assert!(session.snapshot().await.displayed_messages.is_empty());
        assert!(!session.is_busy());

        // User may retry.
        session.send_message("hello?").await.unwrap();
        assert_eq!(stored_pairs(&store, id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_reply_timeout() {
        let config = SessionConfig {
            reply_timeout: Duration::from_millis(20),
            ..SessionConfig::default()
        };
        let (session, store, _) = setup_with(
            ScriptedResponder::new(vec![Step::Delayed(
                Duration::from_secs(5),
                "too late".to_string(),
            )]),
            config,
        )
        .await;
        session.start_conversation("slow").await.unwrap();
        let id = session.snapshot().await.active.map(|a| a.id).unwrap();

        let result = session.send_message("anyone?").await;
        assert!(matches!(
            result,
            Err(ChatError::Responder(ResponderError::Timeout))
        ));
        assert!(stored_pairs(&store, id).await.is_empty());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_overlapping_send_is_rejected() {
        let (session, store, _) = setup(ScriptedResponder::new(vec![Step::Delayed(
            Duration::from_millis(200),
            "done".to_string(),
        )]))
        .await;
        let session = Arc::new(session);
        session.start_conversation("busy").await.unwrap();
        let id = session.snapshot().await.active.map(|a| a.id).unwrap();

        let background = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send_message("first").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(session.is_busy());
        assert!(session.view(None).await.unwrap().busy);

        let second = session.send_message("second").await;
        assert!(matches!(second, Err(ChatError::Busy)));

        background.await.unwrap().unwrap();
        assert!(!session.is_busy());
        assert_eq!(stored_pairs(&store, id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_active_clears_session() {
        let (session, store, _) = setup(ScriptedResponder::default()).await;
        let other = store.create_conversation("other").await.unwrap();
        store.append_exchange(other.id, "x", "y").await.unwrap();
        session.start_conversation("active").await.unwrap();
        let id = session.snapshot().await.active.map(|a| a.id).unwrap();

        let outcome = session
            .delete_conversation(ConversationRef::Id(id))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Deleted { was_active: true, .. }));
        assert_eq!(session.snapshot().await, SessionState::default());
        assert_eq!(stored_pairs(&store, other.id).await.len(), 2);

        let again = session
            .delete_conversation(ConversationRef::Id(id))
            .await
            .unwrap();
        assert_eq!(again, Outcome::NothingToDelete);
    }

    #[tokio::test]
    async fn test_delete_other_keeps_session() {
        let (session, store, _) = setup(ScriptedResponder::default()).await;
        let other = store.create_conversation("other").await.unwrap();
        session.start_conversation("mine").await.unwrap();

        let outcome = session
            .delete_conversation(ConversationRef::Topic("other".to_string()))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Deleted { was_active: false, .. }));
        assert!(store.get_conversation(other.id).await.unwrap().is_none());
        assert!(session.snapshot().await.active.is_some());
    }

    #[tokio::test]
    async fn test_contexts_do_not_leak_between_conversations() {
        let (session, _, responder) =
            setup(ScriptedResponder::replies(&["a1", "b1", "a2"])).await;

        session.start_conversation("A").await.unwrap();
        let a = session.snapshot().await.active.map(|x| x.id).unwrap();
        session.send_message("to A").await.unwrap();

        session.start_conversation("B").await.unwrap();
        let b = session.snapshot().await.active.map(|x| x.id).unwrap();
        session.send_message("to B").await.unwrap();

        session.load_conversation(a).await.unwrap();
        session.send_message("back to A").await.unwrap();

        assert_eq!(
            responder.calls(),
            vec![
                (a.get(), 0, "to A".to_string()),
                (b.get(), 0, "to B".to_string()),
                (a.get(), 2, "back to A".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_after_external_delete_reports_storage_error() {
        let (session, store, _) = setup(ScriptedResponder::replies(&["orphan"])).await;
        session.start_conversation("gone").await.unwrap();
        let id = session.snapshot().await.active.map(|a| a.id).unwrap();
        store.delete_conversation(id).await.unwrap();

        let result = session.send_message("hello").await;
        assert!(matches!(
            result,
            Err(ChatError::Store(StoreError::ConversationNotFound(_)))
        ));
        assert!(session.snapshot().await.displayed_messages.is_empty());
    }

    #[tokio::test]
    async fn test_load_during_commit_keeps_history_in_sync() {
        let store: Arc<dyn ConversationStore> = Arc::new(SlowCommitStore {
            inner: SqliteConversationStore::open_in_memory().await.unwrap(),
            linger: Duration::from_millis(200),
        });
        let responder = Arc::new(ScriptedResponder::replies(&["pong", "again"]));
        let session = Arc::new(
            ChatSession::new(store.clone(), responder.clone(), &SessionConfig::default()).unwrap(),
        );
        session.start_conversation("race").await.unwrap();
        let id = session.snapshot().await.active.map(|a| a.id).unwrap();

        let pending = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send_message("ping").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.load_conversation(id).await.unwrap();
        pending.await.unwrap().unwrap();

        let stored = stored_pairs(&store, id).await;
        assert_eq!(stored.len(), 2);
        assert_eq!(pairs(&session.snapshot().await), stored);

        session.send_message("next").await.unwrap();
        assert_eq!(responder.calls()[1], (id.get(), 2, "next".to_string()));
    }
}
