//! Ollama responder through the Rig provider.

use reqwest::Client as ReqwestClient;
use rig::client::{CompletionClient, Nothing};
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rig::providers::ollama;
use tracing::debug;

use crate::domain::config::{LlmConfig, SessionConfig};
use crate::domain::errors::ResponderError;
use crate::llm::context::ConversationContext;
use crate::llm::prompt::render_prompt;
use crate::llm::responder::{Responder, ResponderFuture, non_empty_reply};

/// Responder that renders the transcript into a single prompt for Ollama.
pub struct OllamaResponder {
    model: ollama::CompletionModel,
    model_name: String,
    preamble: String,
    temperature: f64,
    max_tokens: Option<u64>,
    max_history_chars: usize,
}

impl OllamaResponder {
    /// Create a new Ollama responder.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be built.
    pub fn new(config: &LlmConfig, session: &SessionConfig) -> Result<Self, ResponderError> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder
            .build()
            .map_err(|err| ResponderError::Client(err.to_string()))?;
        let model = client.completion_model(config.model.clone());

        Ok(Self {
            model,
            model_name: config.model.clone(),
            preamble: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_history_chars: session.max_history_chars,
        })
    }
}

impl Responder for OllamaResponder {
    fn respond<'a>(
        &'a self,
        context: &'a ConversationContext,
        utterance: &'a str,
    ) -> ResponderFuture<'a, Result<String, ResponderError>> {
        Box::pin(async move {
            let prompt = render_prompt(context, utterance, self.max_history_chars);
            debug!(
                model = %self.model_name,
                conversation = %context.conversation_id(),
                prompt_chars = prompt.len(),
                "Sending Ollama completion request"
            );

            let request = self
                .model
                .completion_request(prompt)
                .preamble(self.preamble.clone())
                .temperature(self.temperature)
                .max_tokens_opt(self.max_tokens)
                .build();

            let response = self
                .model
                .completion(request)
                .await
                .map_err(|err| ResponderError::Provider(err.to_string()))?;
            non_empty_reply(&extract_text(&response.choice))
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}
