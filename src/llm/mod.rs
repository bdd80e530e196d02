//! Language-model responders and the transcripts they are conditioned on.

pub mod context;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod responder;

use std::sync::Arc;

use tracing::info;

pub use context::{ConversationContext, Turn};
pub use ollama::OllamaResponder;
pub use openai::OpenAiResponder;
pub use prompt::render_prompt;
pub use responder::{Responder, ResponderFuture};

use crate::domain::config::{LlmConfig, LlmProvider, SessionConfig};
use crate::domain::errors::ResponderError;

/// Build the responder selected by the configuration.
///
/// # Errors
/// Returns an error if the provider client cannot be constructed.
pub fn build_responder(
    config: &LlmConfig,
    session: &SessionConfig,
) -> Result<Arc<dyn Responder>, ResponderError> {
    let responder: Arc<dyn Responder> = match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiResponder::new(config, session)?),
        LlmProvider::Ollama => Arc::new(OllamaResponder::new(config, session)?),
    };
    info!(
        provider = responder.name(),
        model = %config.model,
        "Responder ready"
    );
    Ok(responder)
}
