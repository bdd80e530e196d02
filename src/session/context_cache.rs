//! Bounded cache of conversation contexts keyed by conversation id.

use std::num::NonZeroUsize;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::domain::ids::ConversationId;
use crate::llm::context::ConversationContext;

/// LRU cache of per-conversation transcripts.
///
/// An evicted context is rebuilt from storage on next use, so eviction never
/// loses turns.
pub struct ContextCache {
    inner: Mutex<LruCache<ConversationId, ConversationContext>>,
}

impl ContextCache {
    /// Create a cache holding at most `capacity` contexts.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Insert or replace a context.
    pub async fn insert(&self, context: ConversationContext) {
        let mut cache = self.inner.lock().await;
        cache.put(context.conversation_id(), context);
    }

    /// Clone the context of a conversation, if cached.
    pub async fn get(&self, id: ConversationId) -> Option<ConversationContext> {
        let mut cache = self.inner.lock().await;
        cache.get(&id).cloned()
    }

    /// Extend a cached context with a stored exchange. No-op when not cached.
    pub async fn push_exchange(&self, id: ConversationId, user_body: &str, bot_body: &str) {
        let mut cache = self.inner.lock().await;
        if let Some(context) = cache.get_mut(&id) {
            context.push_exchange(user_body, bot_body);
        }
    }

    /// Forget a conversation.
    pub async fn remove(&self, id: ConversationId) {
        let mut cache = self.inner.lock().await;
        cache.pop(&id);
    }

    /// Number of cached contexts.
    #[cfg(test)]
    pub async fn cached_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}
