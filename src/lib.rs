//! searchflow: grounded answers from live web search.
//!
//! This crate turns a question into a cited answer:
//! Metasearch → Credibility → Rerank → Synthesis → Response
//!
//! # Architecture
//!
//! - **Retrieval**: SearXNG metasearch via the `searchflow-search` crate,
//!   with URL-normalised dedup and one bounded retry
//! - **Credibility**: static domain and TLD table scoring every source
//! - **Rerank**: language-model ranking, falling back to credibility order
//! - **Synthesis**: grounded prompt over a budgeted, numbered context, with
//!   confidence parsed from the reply
//! - **Response**: citations, status and a cacheable [`PipelineResult`]
//!
//! Language models are reached through the [`llm::CompletionBackend`]
//! trait; OpenAI-compatible hosted providers and a local Ollama server are
//! built in.

pub mod cache;
pub mod config;
pub mod credibility;
pub mod decompose;
pub mod error;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod rerank;
pub mod response;
pub mod synthesis;

pub use cache::{MemoryCache, NoopCache, ResultCache};
pub use config::AppConfig;
pub use credibility::{CredibilityCategory, EnrichedSource};
pub use error::{PipelineError, Result};
pub use pipeline::{HealthReport, HealthStatus, PipelineEvent, QueryOptions, SearchPipeline};
pub use response::{AnswerStatus, PipelineResult};
