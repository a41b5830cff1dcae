//! Configuration types for searchflow.
//!
//! One TOML file with a section per concern:
//!
//! ```toml
//! [search]
//! searxng_url = "http://localhost:8888"
//!
//! [llm]
//! provider = "groq"
//! model = "llama-3.3-70b-versatile"
//!
//! [pipeline]
//! top_k = 5
//!
//! [cache]
//! ttl_seconds = 3600
//! ```
//!
//! Every struct is `#[serde(default)]`, so any subset of keys is valid.

use std::path::PathBuf;
use std::time::Duration;

use searchflow_search::SearchConfig;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::llm::{ProviderKind, RequestOptions};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Metasearch retrieval.
    pub search: SearchConfig,
    /// Language-model backend.
    pub llm: LlmConfig,
    /// Ranking and synthesis tunables.
    pub pipeline: PipelineConfig,
    /// Result cache.
    pub cache: CacheConfig,
}

/// Language-model backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which provider to talk to.
    pub provider: ProviderKind,
    /// Model identifier. Empty means the provider's default model.
    pub model: String,
    /// Override for the provider's base URL.
    pub base_url: Option<String>,
    /// Environment variable holding the API key. Unset means the provider's
    /// conventional variable (e.g. `OPENAI_API_KEY`).
    pub api_key_env: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Maximum tokens per completion.
    pub max_tokens: usize,
    /// Sampling temperature.
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: String::new(),
            base_url: None,
            api_key_env: None,
            timeout_seconds: 60,
            max_tokens: 1024,
            temperature: 0.2,
        }
    }
}

impl LlmConfig {
    /// The model to use, falling back to the provider default.
    pub fn resolved_model(&self) -> &str {
        if self.model.trim().is_empty() {
            self.provider.default_model()
        } else {
            self.model.trim()
        }
    }

    /// The base URL to use, falling back to the provider default.
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Name of the environment variable that holds the API key, if any.
    pub fn api_key_env_name(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.provider.default_api_key_env())
    }

    /// HTTP timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Generation options derived from this config.
    pub fn request_options(&self) -> RequestOptions {
        RequestOptions::new()
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }
}

/// Ranking and synthesis tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Passages selected for synthesis.
    pub top_k: usize,
    /// Ask the language model to rank passages before falling back to
    /// credibility order.
    pub rank_with_llm: bool,
    /// Characters of each passage shown in the ranking prompt.
    pub passage_preview_chars: usize,
    /// Character budget of the numbered synthesis context.
    pub context_char_budget: usize,
    /// Character budget used for decomposed (complex) questions.
    pub complex_context_char_budget: usize,
    /// Confidence used when the model's confidence cannot be parsed.
    pub default_confidence: f64,
    /// Time budget for a single synthesis call, in seconds.
    pub synthesis_timeout_seconds: u64,
    /// Longest accepted question, in characters.
    pub max_query_chars: usize,
    /// Decompose comparison and multi-part questions into sub-queries.
    pub decompose_complex: bool,
    /// Most sub-queries a decomposition may produce.
    pub max_sub_queries: usize,
    /// Cap on merged results across sub-queries.
    pub complex_result_cap: usize,
    /// Characters of passage text kept per context entry in exported documents.
    pub source_text_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            rank_with_llm: true,
            passage_preview_chars: 180,
            context_char_budget: 3000,
            complex_context_char_budget: 3500,
            default_confidence: 0.7,
            synthesis_timeout_seconds: 60,
            max_query_chars: 1000,
            decompose_complex: true,
            max_sub_queries: 4,
            complex_result_cap: 15,
            source_text_chars: 500,
        }
    }
}

impl PipelineConfig {
    /// Synthesis time budget as a [`Duration`].
    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_seconds)
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the in-memory cache. When false every query runs the pipeline.
    pub enabled: bool,
    /// Lifetime of a cached answer, in seconds.
    pub ttl_seconds: u64,
    /// Maximum number of cached answers.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 3600,
            max_entries: 1000,
        }
    }
}

impl CacheConfig {
    /// Entry lifetime as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/searchflow/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("searchflow").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("searchflow")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/searchflow-config/config.toml")
        }
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.search
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let p = &self.pipeline;
        if p.top_k == 0 {
            return Err(PipelineError::Config("pipeline.top_k must be greater than 0".into()));
        }
        if p.context_char_budget == 0 || p.complex_context_char_budget == 0 {
            return Err(PipelineError::Config(
                "pipeline context budgets must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&p.default_confidence) {
            return Err(PipelineError::Config(
                "pipeline.default_confidence must be within [0, 1]".into(),
            ));
        }
        if p.synthesis_timeout_seconds == 0 {
            return Err(PipelineError::Config(
                "pipeline.synthesis_timeout_seconds must be greater than 0".into(),
            ));
        }
        if p.max_query_chars == 0 {
            return Err(PipelineError::Config(
                "pipeline.max_query_chars must be greater than 0".into(),
            ));
        }
        if p.max_sub_queries < 2 {
            return Err(PipelineError::Config(
                "pipeline.max_sub_queries must be at least 2".into(),
            ));
        }

        if self.llm.timeout_seconds == 0 {
            return Err(PipelineError::Config(
                "llm.timeout_seconds must be greater than 0".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(PipelineError::Config(
                "llm.temperature must be within [0, 2]".into(),
            ));
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(PipelineError::Config(
                "cache.max_entries must be greater than 0 when the cache is enabled".into(),
            ));
        }
        Ok(())
    }
}
