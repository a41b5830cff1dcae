//! OpenAI-compatible chat completions backend.
//!
//! Serves OpenAI itself and every provider exposing the same
//! `POST {base_url}/chat/completions` contract: Groq, OpenRouter and
//! Gemini's OpenAI endpoint. Requests are non-streaming.
//!
//! # Example
//!
//! ```no_run
//! use searchflow::llm::{CompletionBackend, OpenAiCompatBackend, OpenAiCompatConfig, ProviderKind, RequestOptions};
//!
//! # async fn example() -> Result<(), searchflow::llm::LlmError> {
//! let config = OpenAiCompatConfig::new(ProviderKind::Groq, "gsk-...", "llama-3.3-70b-versatile");
//! let backend = OpenAiCompatBackend::new(config)?;
//! let text = backend.complete("Say hi", &RequestOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::backend::{CompletionBackend, map_http_error, map_transport_error};
use super::error::LlmError;
use super::types::{ProviderKind, RequestOptions};

/// Configuration for an OpenAI-compatible backend.
#[derive(Clone)]
pub struct OpenAiCompatConfig {
    /// Which provider this endpoint belongs to (used for names and defaults).
    pub provider: ProviderKind,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL including the version segment, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// The model to use.
    pub model: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl OpenAiCompatConfig {
    /// Create a config with the provider's default base URL.
    pub fn new(provider: ProviderKind, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: provider.default_base_url().into(),
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for OpenAiCompatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Build the JSON request body for a chat completion.
pub fn build_chat_request(model: &str, prompt: &str, options: &RequestOptions) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "stream": false,
    });
    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temperature) = options.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    body
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's text out of a chat completion body.
///
/// # Errors
///
/// Returns [`LlmError::MalformedOutput`] if the body is not a chat
/// completion or carries no text.
pub fn parse_chat_response(body: &str) -> Result<String, LlmError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::MalformedOutput(format!("invalid chat completion JSON: {e}")))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::MalformedOutput("chat completion has no content".into()))
}

/// OpenAI-compatible backend.
pub struct OpenAiCompatBackend {
    config: OpenAiCompatConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatBackend")
            .field("provider", &self.config.provider)
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl OpenAiCompatBackend {
    /// Create a backend with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] if the API key is empty or the HTTP
    /// client cannot be built.
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config(format!(
                "{} requires an API key",
                config.provider
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        self.config.provider.as_str()
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str, options: &RequestOptions) -> Result<String, LlmError> {
        let provider = self.config.provider.as_str();
        let body = build_chat_request(&self.config.model, prompt, options);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(provider, &e))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| map_transport_error(provider, &e))?;
        if !status.is_success() {
            return Err(map_http_error(provider, status, &body_text));
        }

        let text = parse_chat_response(&body_text)?;
        tracing::debug!(provider, model = %self.config.model, chars = text.len(), "completion received");
        Ok(text)
    }
}
