//! Error types for language-model backends.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`LlmError::code()`].

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Invalid or missing configuration (unknown provider, missing key).
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Authentication failed (invalid/missing API key, 401/403).
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    /// Provider refused the request because of rate limits or quota (429).
    pub const RATE_LIMITED: &str = "RATE_LIMITED";

    /// The request could not be sent or the connection failed.
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";

    /// The call did not complete within its time budget.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";

    /// Provider answered with an error status not covered above.
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";

    /// The response body did not have the expected shape.
    pub const MALFORMED_OUTPUT: &str = "MALFORMED_OUTPUT";
}

/// Errors produced by a [`CompletionBackend`](super::CompletionBackend).
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// Authentication failed.
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    Auth(String),

    /// Rate limit or quota exhausted.
    #[error("[{}] {}", error_codes::RATE_LIMITED, .0)]
    RateLimited(String),

    /// Transport-level failure.
    #[error("[{}] {}", error_codes::REQUEST_FAILED, .0)]
    Request(String),

    /// Timed out.
    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    Timeout(String),

    /// Other provider-side failure.
    #[error("[{}] {}", error_codes::PROVIDER_ERROR, .0)]
    Provider(String),

    /// Response could not be interpreted.
    #[error("[{}] {}", error_codes::MALFORMED_OUTPUT, .0)]
    MalformedOutput(String),
}

impl LlmError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Auth(_) => error_codes::AUTH_FAILED,
            Self::RateLimited(_) => error_codes::RATE_LIMITED,
            Self::Request(_) => error_codes::REQUEST_FAILED,
            Self::Timeout(_) => error_codes::TIMEOUT_ERROR,
            Self::Provider(_) => error_codes::PROVIDER_ERROR,
            Self::MalformedOutput(_) => error_codes::MALFORMED_OUTPUT,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::Auth(m)
            | Self::RateLimited(m)
            | Self::Request(m)
            | Self::Timeout(m)
            | Self::Provider(m)
            | Self::MalformedOutput(m) => m,
        }
    }

    /// Returns true if this error represents a transient failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Auth(_) | Self::MalformedOutput(_) => false,
            Self::RateLimited(_) | Self::Request(_) | Self::Timeout(_) | Self::Provider(_) => true,
        }
    }

    /// Short user-facing explanation, free of provider response bodies.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Config(_) => "the language model is not configured correctly",
            Self::Auth(_) => "the language model provider rejected the credentials",
            Self::RateLimited(_) => "the language model provider's rate limit was exceeded",
            Self::Request(_) => "the language model provider could not be reached",
            Self::Timeout(_) => "the language model did not answer in time",
            Self::Provider(_) => "the language model provider returned an error",
            Self::MalformedOutput(_) => "the language model returned an unreadable response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(LlmError::Config("x".into()).code(), "CONFIG_INVALID");
        assert_eq!(LlmError::Auth("x".into()).code(), "AUTH_FAILED");
        assert_eq!(LlmError::RateLimited("x".into()).code(), "RATE_LIMITED");
        assert_eq!(LlmError::Request("x".into()).code(), "REQUEST_FAILED");
        assert_eq!(LlmError::Timeout("x".into()).code(), "TIMEOUT_ERROR");
        assert_eq!(LlmError::Provider("x".into()).code(), "PROVIDER_ERROR");
        assert_eq!(LlmError::MalformedOutput("x".into()).code(), "MALFORMED_OUTPUT");
    }

    #[test]
    fn display_includes_code_prefix() {
        let err = LlmError::Auth("invalid key".into());
        let display = err.to_string();
        assert!(display.starts_with("[AUTH_FAILED]"));
        assert!(display.contains("invalid key"));
        assert_eq!(err.message(), "invalid key");
    }

    #[test]
    fn retryable_classification() {
        assert!(!LlmError::Auth("x".into()).is_retryable());
        assert!(!LlmError::Config("x".into()).is_retryable());
        assert!(!LlmError::MalformedOutput("x".into()).is_retryable());
        assert!(LlmError::RateLimited("x".into()).is_retryable());
        assert!(LlmError::Timeout("x".into()).is_retryable());
    }

    #[test]
    fn user_message_hides_details() {
        let err = LlmError::Provider("HTTP 500: stack trace here".into());
        assert!(!err.user_message().contains("stack trace"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmError>();
    }
}
