//! Provider-agnostic language-model access.
//!
//! The rest of the crate depends only on [`CompletionBackend`]. Which
//! concrete backend sits behind it is decided once, by [`build_backend`],
//! from the `[llm]` configuration section.

pub mod backend;
pub mod error;
pub mod ollama;
pub mod openai;
pub mod types;

use std::sync::Arc;

pub use backend::CompletionBackend;
pub use error::LlmError;
pub use ollama::{OllamaBackend, OllamaConfig};
pub use openai::{OpenAiCompatBackend, OpenAiCompatConfig};
pub use types::{ProviderKind, RequestOptions};

use crate::config::LlmConfig;

/// Construct the backend described by `config`.
///
/// Hosted providers read their API key from the configured environment
/// variable here, once; the key is never logged.
///
/// # Errors
///
/// Returns [`LlmError::Config`] if a hosted provider's key is missing or
/// the HTTP client cannot be built.
pub fn build_backend(config: &LlmConfig) -> Result<Arc<dyn CompletionBackend>, LlmError> {
    let model = config.resolved_model().to_owned();
    let base_url = config.resolved_base_url().to_owned();

    tracing::info!(provider = %config.provider, %model, "creating LLM backend");

    match config.provider {
        ProviderKind::Ollama => {
            let backend = OllamaBackend::new(
                OllamaConfig::new(model)
                    .with_base_url(base_url)
                    .with_timeout(config.timeout()),
            )?;
            Ok(Arc::new(backend))
        }
        kind @ (ProviderKind::OpenAi
        | ProviderKind::Groq
        | ProviderKind::OpenRouter
        | ProviderKind::Gemini) => {
            let api_key = read_api_key(config)?;
            let backend = OpenAiCompatBackend::new(
                OpenAiCompatConfig::new(kind, api_key, model)
                    .with_base_url(base_url)
                    .with_timeout(config.timeout()),
            )?;
            Ok(Arc::new(backend))
        }
    }
}

fn read_api_key(config: &LlmConfig) -> Result<String, LlmError> {
    let var = config.api_key_env_name().ok_or_else(|| {
        LlmError::Config(format!("{} requires an API key variable", config.provider))
    })?;
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(LlmError::Config(format!("{var} not set in environment"))),
    }
}
