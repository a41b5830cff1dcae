//! Error types for the searchflow-search crate.
//!
//! Messages are stable strings suitable for logs and for display. Queries
//! are never embedded in error messages.

/// Errors that can occur while talking to the metasearch provider.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request did not complete within the configured timeout.
    #[error("search timed out: {0}")]
    Timeout(String),

    /// The HTTP request could not be sent or the connection failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered with a non-success status code.
    #[error("provider returned HTTP {status}")]
    Status {
        /// The HTTP status code returned.
        status: u16,
    },

    /// The provider's response body could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SearchError {
    /// Whether a single bounded retry is worthwhile for this failure.
    ///
    /// Timeouts, connection failures and 5xx responses are transient;
    /// 4xx responses, parse failures and configuration errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Http(_) => true,
            Self::Status { status } => *status >= 500,
            Self::Parse(_) | Self::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Convenience type alias for searchflow-search results.
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_timeout() {
        let err = SearchError::Timeout("exceeded 8s limit".into());
        assert_eq!(err.to_string(), "search timed out: exceeded 8s limit");
    }

    #[test]
    fn display_http() {
        let err = SearchError::Http("connection refused".into());
        assert_eq!(err.to_string(), "HTTP error: connection refused");
    }

    #[test]
    fn display_status() {
        let err = SearchError::Status { status: 503 };
        assert_eq!(err.to_string(), "provider returned HTTP 503");
    }

    #[test]
    fn display_parse() {
        let err = SearchError::Parse("missing results array".into());
        assert_eq!(err.to_string(), "parse error: missing results array");
    }

    #[test]
    fn display_config() {
        let err = SearchError::Config("max_results must be > 0".into());
        assert_eq!(err.to_string(), "config error: max_results must be > 0");
    }

    #[test]
    fn transient_classification() {
        assert!(SearchError::Timeout("t".into()).is_transient());
        assert!(SearchError::Http("h".into()).is_transient());
        assert!(SearchError::Status { status: 502 }.is_transient());
        assert!(!SearchError::Status { status: 403 }.is_transient());
        assert!(!SearchError::Parse("p".into()).is_transient());
        assert!(!SearchError::Config("c".into()).is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SearchError>();
    }
}
