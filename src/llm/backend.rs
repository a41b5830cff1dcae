//! The completion capability every language-model backend provides.
//!
//! The pipeline only ever needs "complete this prompt into text". Concrete
//! providers implement [`CompletionBackend`] and are selected once, at
//! construction, by [`build_backend`](super::build_backend).

use async_trait::async_trait;

use super::error::LlmError;
use super::types::RequestOptions;

/// A language model that turns a prompt into text.
///
/// Object safe; held as `Arc<dyn CompletionBackend>` and passed explicitly
/// into each stage that needs it, so concurrent requests using different
/// models never share ambient state.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Provider name (e.g. `"openai"`, `"ollama"`).
    fn name(&self) -> &str;

    /// Model identifier reported in results.
    fn model(&self) -> &str;

    /// Complete `prompt` and return the generated text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] on transport failure, authentication or rate
    /// limit rejection, provider errors and malformed responses.
    async fn complete(&self, prompt: &str, options: &RequestOptions) -> Result<String, LlmError>;
}

/// Map an HTTP error status from a provider to the appropriate [`LlmError`].
pub(crate) fn map_http_error(provider: &str, status: reqwest::StatusCode, body: &str) -> LlmError {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => LlmError::Auth(format!("{provider} authentication failed: {message}")),
        429 => LlmError::RateLimited(format!("{provider} rate limited: {message}")),
        code => LlmError::Provider(format!("{provider} HTTP {code}: {message}")),
    }
}

/// Map a transport error from reqwest.
pub(crate) fn map_transport_error(provider: &str, err: &reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(format!("{provider} request timed out"))
    } else {
        LlmError::Request(format!("{provider} request failed: {err}"))
    }
}

/// Extract an error message from a provider error body.
///
/// Understands `{"error": {"message": ...}}` (OpenAI family) and
/// `{"error": "..."}` (Ollama); anything else is returned trimmed.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
