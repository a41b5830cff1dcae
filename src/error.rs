//! Error types for the searchflow pipeline.
//!
//! Only input and setup problems surface as [`PipelineError`]. Upstream
//! failures during a query are absorbed by the pipeline stages and turned
//! into degraded or empty [`PipelineResult`](crate::response::PipelineResult)s.

/// Top-level error type for the search-and-answer pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The query was empty or malformed and was rejected before retrieval.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Metasearch setup error (client construction, search config).
    #[error("search error: {0}")]
    Search(#[from] searchflow_search::SearchError),

    /// Language-model backend setup error.
    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    /// Output rendering error.
    #[error("output error: {0}")]
    Output(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
