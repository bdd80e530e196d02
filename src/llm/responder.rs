//! Responder abstraction over hosted completion models.

use std::future::Future;
use std::pin::Pin;

use crate::domain::errors::ResponderError;
use crate::llm::context::ConversationContext;

/// Boxed future type for responder operations.
pub type ResponderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Produces a reply to a user utterance given the conversation so far.
///
/// Implementations must not keep their own transcript: the context passed in
/// is the whole conditioning history for this call.
pub trait Responder: Send + Sync {
    /// Generate a reply.
    ///
    /// # Errors
    /// Returns an error on network, authentication, rate-limit or reply
    /// decoding failures, or when the model produced nothing.
    fn respond<'a>(
        &'a self,
        context: &'a ConversationContext,
        utterance: &'a str,
    ) -> ResponderFuture<'a, Result<String, ResponderError>>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

/// Reject blank replies, otherwise return the trimmed text.
pub(crate) fn non_empty_reply(text: &str) -> Result<String, ResponderError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(ResponderError::EmptyReply)
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    //! Deterministic responder used by session and server tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::{Responder, ResponderFuture};
    use crate::domain::errors::ResponderError;
    use crate::llm::context::ConversationContext;

    /// Scripted reply step.
    pub enum Step {
        /// Reply with text.
        Reply(String),
        /// Fail with an error.
        Fail(ResponderError),
        /// Sleep, then reply.
        Delayed(Duration, String),
    }

    /// Observed call: conversation id, number of context turns, utterance.
    pub type Call = (i64, usize, String);

    /// Responder that plays back a script and records what it saw.
    #[derive(Default)]
    pub struct ScriptedResponder {
        steps: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedResponder {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn replies(replies: &[&str]) -> Self {
            Self::new(
                replies
                    .iter()
                    .map(|r| Step::Reply((*r).to_string()))
                    .collect(),
            )
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    impl Responder for ScriptedResponder {
        fn respond<'a>(
            &'a self,
            context: &'a ConversationContext,
            utterance: &'a str,
        ) -> ResponderFuture<'a, Result<String, ResponderError>> {
            Box::pin(async move {
                if let Ok(mut calls) = self.calls.lock() {
                    calls.push((
                        context.conversation_id().get(),
                        context.turns().len(),
                        utterance.to_string(),
                    ));
                }
                let step = self.steps.lock().ok().and_then(|mut s| s.pop_front());
                match step {
                    Some(Step::Reply(text)) => Ok(text),
                    Some(Step::Fail(err)) => Err(err),
                    Some(Step::Delayed(delay, text)) => {
                        tokio::time::sleep(delay).await;
                        Ok(text)
                    }
                    None => Err(ResponderError::Provider("script exhausted".to_string())),
                }
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
