//! OpenAI-compatible chat-completions responder.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::config::{LlmConfig, SessionConfig};
use crate::domain::errors::ResponderError;
use crate::domain::sender::Sender;
use crate::llm::context::ConversationContext;
use crate::llm::responder::{Responder, ResponderFuture, non_empty_reply};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connect timeout for the HTTP client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Responder backed by a hosted `/chat/completions` endpoint.
pub struct OpenAiResponder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: Option<u64>,
    system_prompt: String,
    max_history_chars: usize,
}

impl OpenAiResponder {
    /// Create a responder from config.
    ///
    /// # Errors
    /// Returns an error if no credential is configured or the HTTP client
    /// cannot be built.
    pub fn new(config: &LlmConfig, session: &SessionConfig) -> Result<Self, ResponderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ResponderError::Client("missing api key".to_string()))?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(session.reply_timeout)
            .build()?;
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');

        Ok(Self {
            client,
            endpoint: format!("{base_url}/chat/completions"),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
            max_history_chars: session.max_history_chars,
        })
    }

    async fn send_request(&self, body: &ChatCompletionRequest<'_>) -> Result<String, ResponderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = parse_retry_after(response.headers());
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text, retry_after_secs));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        extract_text_response(parsed)
    }
}

impl Responder for OpenAiResponder {
    fn respond<'a>(
        &'a self,
        context: &'a ConversationContext,
        utterance: &'a str,
    ) -> ResponderFuture<'a, Result<String, ResponderError>> {
        Box::pin(async move {
            let messages = build_messages(
                &self.system_prompt,
                context,
                utterance,
                self.max_history_chars,
            );
            debug!(
                model = %self.model,
                conversation = %context.conversation_id(),
                turns = messages.len(),
                "Sending chat completion request"
            );
            let request = ChatCompletionRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };
            self.send_request(&request).await
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn build_messages<'a>(
    system_prompt: &'a str,
    context: &'a ConversationContext,
    utterance: &'a str,
    max_history_chars: usize,
) -> Vec<ChatMessage<'a>> {
    let turns = context.window(max_history_chars.saturating_sub(utterance.len()));
    let mut messages = Vec::with_capacity(turns.len() + 2);
    if !system_prompt.is_empty() {
        messages.push(ChatMessage {
            role: "system",
            content: system_prompt,
        });
    }
    for turn in turns {
        let role = match turn.sender {
            Sender::User => "user",
            Sender::Bot => "assistant",
        };
        messages.push(ChatMessage {
            role,
            content: &turn.body,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: utterance,
    });
    messages
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String, ResponderError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ResponderError::MalformedReply("no content in the response".to_string()))?;
    non_empty_reply(&content)
}

fn map_http_error(status: StatusCode, body: &str, retry_after_secs: Option<u64>) -> ResponderError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ResponderError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => ResponderError::RateLimited { retry_after_secs },
        _ => ResponderError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
}
