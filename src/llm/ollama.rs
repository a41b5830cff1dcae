//! Local Ollama backend (`POST /api/generate`, non-streaming).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::backend::{CompletionBackend, map_http_error, map_transport_error};
use super::error::LlmError;
use super::types::{ProviderKind, RequestOptions};

/// Configuration for the Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server URL, e.g. `http://localhost:11434`.
    pub base_url: String,
    /// Model tag, e.g. `llama3.2`.
    pub model: String,
    /// Per-request HTTP timeout. Local models can be slow to load.
    pub timeout: Duration,
}

impl OllamaConfig {
    /// Create a config pointing at the default local server.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: ProviderKind::Ollama.default_base_url().into(),
            model: model.into(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Set a custom server URL.
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

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Ollama backend.
#[derive(Debug)]
pub struct OllamaBackend {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a backend with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] if the HTTP client cannot be built.
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str, options: &RequestOptions) -> Result<String, LlmError> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error("ollama", &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error("ollama", &e))?;
        if !status.is_success() {
            return Err(map_http_error("ollama", status, &body));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::MalformedOutput(format!("invalid Ollama JSON: {e}")))?;
        parsed
            .response
            .ok_or_else(|| LlmError::MalformedOutput("Ollama response has no text".into()))
    }
}
