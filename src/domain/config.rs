//! Configuration for the chat desk.
//!
//! Every value can be overridden from the environment (`CHATDESK_*`); the
//! model credential is read from `OPENAI_API_KEY` and never stored.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::errors::ConfigError;

/// Environment variable for the `SQLite` database path.
pub const DB_PATH_ENV: &str = "CHATDESK_DB_PATH";
/// Environment variable selecting the model provider.
pub const LLM_PROVIDER_ENV: &str = "CHATDESK_LLM_PROVIDER";
/// Environment variable for the model name.
pub const LLM_MODEL_ENV: &str = "CHATDESK_LLM_MODEL";
/// Environment variable for a custom provider base URL.
pub const LLM_BASE_URL_ENV: &str = "CHATDESK_LLM_BASE_URL";
/// Environment variable for the sampling temperature.
pub const LLM_TEMPERATURE_ENV: &str = "CHATDESK_LLM_TEMPERATURE";
/// Environment variable for the reply token cap.
pub const LLM_MAX_TOKENS_ENV: &str = "CHATDESK_LLM_MAX_TOKENS";
/// Environment variable holding the hosted model credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable for the reply timeout in seconds.
pub const REPLY_TIMEOUT_ENV: &str = "CHATDESK_REPLY_TIMEOUT_SECS";
/// Environment variable for the history budget in characters.
pub const MAX_HISTORY_CHARS_ENV: &str = "CHATDESK_MAX_HISTORY_CHARS";
/// Environment variable for the context cache capacity.
pub const CONTEXT_CACHE_ENV: &str = "CHATDESK_CONTEXT_CACHE";
/// Environment variable for the HTTP port.
pub const PORT_ENV: &str = "CHATDESK_PORT";
/// Environment variable for the static asset directory.
pub const STATIC_DIR_ENV: &str = "CHATDESK_STATIC_DIR";

/// Default system prompt, the framing of a plain conversation chain.
pub const DEFAULT_SYSTEM_PROMPT: &str = "The following is a friendly conversation between a human and an AI. \
The AI is talkative and provides lots of specific details from its context. \
If the AI does not know the answer to a question, it truthfully says it does not know.";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Model settings.
    pub llm: LlmConfig,
    /// Session settings.
    pub session: SessionConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unparseable value or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns an error if a value is unparseable or the configuration is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(DB_PATH_ENV) {
            config.storage.sqlite_path = PathBuf::from(path);
        }

        if let Some(provider) = lookup(LLM_PROVIDER_ENV) {
            config.llm.provider = provider.parse()?;
            if config.llm.provider == LlmProvider::Ollama {
                config.llm.model = DEFAULT_OLLAMA_MODEL.to_string();
            }
        }
        if let Some(model) = lookup(LLM_MODEL_ENV) {
            config.llm.model = model;
        }
        config.llm.base_url = lookup(LLM_BASE_URL_ENV);
        config.llm.api_key = lookup(API_KEY_ENV).filter(|key| !key.trim().is_empty());
        if let Some(temperature) = parse_var(&lookup, LLM_TEMPERATURE_ENV)? {
            config.llm.temperature = temperature;
        }
        if let Some(max_tokens) = parse_var(&lookup, LLM_MAX_TOKENS_ENV)? {
            config.llm.max_tokens = Some(max_tokens);
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, REPLY_TIMEOUT_ENV)? {
            config.session.reply_timeout = Duration::from_secs(secs);
        }
        if let Some(chars) = parse_var(&lookup, MAX_HISTORY_CHARS_ENV)? {
            config.session.max_history_chars = chars;
        }
        if let Some(capacity) = parse_var(&lookup, CONTEXT_CACHE_ENV)? {
            config.session.context_cache_capacity = capacity;
        }

        if let Some(port) = parse_var(&lookup, PORT_ENV)? {
            config.server.port = port;
        }
        if let Some(dir) = lookup(STATIC_DIR_ENV) {
            config.server.static_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.reply_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "session.reply_timeout must be > 0".to_string(),
            ));
        }

        if self.session.max_history_chars == 0 {
            return Err(ConfigError::Invalid(
                "session.max_history_chars must be > 0".to_string(),
            ));
        }

        if self.session.context_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "session.context_cache_capacity must be > 0".to_string(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must not be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(
                "llm.temperature must be within 0.0..=2.0".to_string(),
            ));
        }

        if let Some(base_url) = &self.llm.base_url {
            Url::parse(base_url)?;
        }

        if self.llm.provider == LlmProvider::OpenAi && self.llm.api_key.is_none() {
            return Err(ConfigError::Invalid(format!(
                "{API_KEY_ENV} must be set for the openai provider"
            )));
        }

        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid(format!("{key}={raw} is not a valid value")))
        })
        .transpose()
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("conversations.db"),
        }
    }
}

/// Which hosted completion API to talk to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// OpenAI-compatible `/chat/completions` endpoint.
    #[default]
    OpenAi,
    /// Ollama server through Rig.
    Ollama,
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Invalid(format!("unknown llm provider: {other}"))),
        }
    }
}

/// Default model for the OpenAI provider.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
/// Default model for the Ollama provider.
pub const DEFAULT_OLLAMA_MODEL: &str = "mistral:7b-instruct-q8_0";

/// Completion model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider selection.
    pub provider: LlmProvider,
    /// Model name.
    pub model: String,
    /// Optional custom base URL.
    pub base_url: Option<String>,
    /// Credential for hosted providers.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Temperature for generation.
    pub temperature: f64,
    /// Optional max tokens.
    pub max_tokens: Option<u64>,
    /// Framing sent ahead of the transcript.
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.7,
            max_tokens: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on a single responder call.
    pub reply_timeout: Duration,
    /// Maximum transcript size sent to the model, in characters.
    pub max_history_chars: usize,
    /// Number of conversation contexts kept in memory.
    pub context_cache_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(60),
            max_history_chars: 12_000,
            context_cache_capacity: 64,
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Directory holding the single-page UI.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: PathBuf::from("static"),
        }
    }
}
