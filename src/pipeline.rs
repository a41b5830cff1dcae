//! The search-and-answer pipeline.
//!
//! ```text
//! RECEIVED -> (cache hit) -> BUILT
//!          -> RETRIEVING -> (empty) -> NO_RESULTS
//!          -> ENRICHING -> RERANKING -> SYNTHESIZING -> (failure) -> DEGRADED
//!                                                    -> BUILT
//! ```
//!
//! Every terminal state yields a [`PipelineResult`]. Only invalid input is
//! reported as an error, and it is rejected before any network call.

use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use searchflow_search::orchestrator::retrieve::{retrieve, retrieve_many, try_retrieve};
use searchflow_search::{MetasearchBackend, SearchConfig, SearxngClient};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheStats, MemoryCache, NoopCache, ResultCache, fingerprint};
use crate::config::{AppConfig, PipelineConfig};
use crate::credibility::{EnrichedSource, enrich_all};
use crate::decompose::{decompose, is_complex};
use crate::error::{PipelineError, Result};
use crate::llm::{CompletionBackend, RequestOptions, build_backend};
use crate::rerank::{RankedSelection, RerankOptions, rerank, truncate_chars};
use crate::response::{self, PipelineResult};
use crate::synthesis::{SynthesisOptions, synthesize};

/// Snippet characters kept per entry by [`SearchPipeline::sources`].
pub const SOURCE_SNIPPET_CHARS: usize = 300;

/// Most research queries explored for one topic.
pub const MAX_RESEARCH_DEPTH: usize = 5;

/// Most unique source URLs listed in a research report.
pub const MAX_RESEARCH_SOURCES: usize = 10;

/// Query sent by [`SearchPipeline::health`].
const HEALTH_QUERY: &str = "searxng";

/// Overall health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Reachability of the metasearch provider plus cache counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub searxng_reachable: bool,
    pub backend: String,
    pub model: String,
    pub cache: CacheStats,
    pub cache_hit_rate: f64,
}

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Bypass the cache lookup. A fresh answer is still stored.
    pub skip_cache: bool,
    /// Never decompose, even for complex questions.
    pub no_decompose: bool,
}

/// Pipeline stage announced on the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Looking for a cached answer.
    CheckingCache,
    /// Querying the metasearch provider.
    Retrieving,
    /// Scoring and ranking sources.
    Ranking,
    /// Waiting for the language model.
    Synthesizing,
}

impl Stage {
    /// Human-readable progress message.
    pub fn message(self) -> &'static str {
        match self {
            Self::CheckingCache => "Checking cache...",
            Self::Retrieving => "Searching the web...",
            Self::Ranking => "Analyzing sources...",
            Self::Synthesizing => "Generating answer...",
        }
    }
}

/// An event on the answer stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Progress notice.
    Status {
        /// Stage being entered.
        stage: Stage,
        /// Human-readable description.
        message: String,
    },
    /// A chunk of the answer text. Chunks concatenate to the full answer.
    Token {
        /// The chunk.
        content: String,
    },
    /// The final result. Always the last event of a successful stream.
    Done {
        /// The finished result.
        result: Box<PipelineResult>,
    },
    /// The question was rejected. Always the last event when present.
    Error {
        /// Stable error description.
        message: String,
    },
}

/// Sources-only lookup result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesReport {
    /// The query as asked.
    pub query: String,
    /// Enriched sources in retrieval order, snippets shortened.
    pub sources: Vec<EnrichedSource>,
    /// Sources retrieved before the limit was applied.
    pub total_found: usize,
}

/// One explored query of a research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchFinding {
    /// The query explored.
    pub query: String,
    /// The answer found.
    pub answer: String,
    /// Confidence of that answer.
    pub confidence: f64,
    /// Terminal state of that answer.
    pub status: response::AnswerStatus,
}

/// Topic research result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    /// The topic researched.
    pub topic: String,
    /// Per-query findings, in exploration order.
    pub findings: Vec<ResearchFinding>,
    /// Unique source URLs across findings, first-seen order.
    pub sources: Vec<String>,
}

/// Queries explored when researching `topic`, most general first.
pub fn research_queries(topic: &str, depth: usize) -> Vec<String> {
    let depth = depth.clamp(1, MAX_RESEARCH_DEPTH);
    [
        topic.to_owned(),
        format!("what is {topic}"),
        format!("{topic} benefits"),
        format!("{topic} challenges"),
        format!("how does {topic} work"),
    ]
    .into_iter()
    .take(depth)
    .collect()
}

/// Retrieved sources for one question, with how they were gathered.
struct Gathered {
    sources: Vec<EnrichedSource>,
    complex: bool,
}

/// The search-and-answer pipeline.
///
/// Cheap to share behind an `Arc`; all state is read-only except the
/// cache, which is safe for concurrent use.
pub struct SearchPipeline<S = SearxngClient> {
    searcher: S,
    search_config: SearchConfig,
    backend: Arc<dyn CompletionBackend>,
    cache: Arc<dyn ResultCache>,
    settings: PipelineConfig,
    cache_ttl: Duration,
    request: RequestOptions,
}

impl<S> std::fmt::Debug for SearchPipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPipeline")
            .field("backend", &self.backend.name())
            .field("model", &self.backend.model())
            .field("top_k", &self.settings.top_k)
            .finish()
    }
}

impl SearchPipeline<SearxngClient> {
    /// Build a pipeline talking to SearXNG, with the backend and cache the
    /// configuration describes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] for invalid configuration, or the
    /// backend/client construction error.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let searcher = SearxngClient::new(&config.search)?;
        let backend = build_backend(&config.llm)?;
        let cache: Arc<dyn ResultCache> = if config.cache.enabled {
            Arc::new(MemoryCache::new(config.cache.max_entries))
        } else {
            Arc::new(NoopCache::default())
        };
        Ok(Self::new(searcher, config.search.clone(), backend, cache)
            .with_settings(config.pipeline.clone())
            .with_cache_ttl(config.cache.ttl())
            .with_request_options(config.llm.request_options()))
    }
}

impl<S: MetasearchBackend> SearchPipeline<S> {
    /// Assemble a pipeline from its parts, with default settings.
    pub fn new(
        searcher: S,
        search_config: SearchConfig,
        backend: Arc<dyn CompletionBackend>,
        cache: Arc<dyn ResultCache>,
    ) -> Self {
        Self {
            searcher,
            search_config,
            backend,
            cache,
            settings: PipelineConfig::default(),
            cache_ttl: Duration::from_secs(3600),
            request: RequestOptions::default(),
        }
    }

    /// Replace the ranking and synthesis settings.
    pub fn with_settings(mut self, settings: PipelineConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Set how long answers stay cached.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set generation options for synthesis calls.
    pub fn with_request_options(mut self, request: RequestOptions) -> Self {
        self.request = request;
        self
    }

    /// The active settings.
    pub fn settings(&self) -> &PipelineConfig {
        &self.settings
    }

    /// Cache counters.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Drop every cached answer. Returns the number of entries removed.
    pub async fn clear_cache(&self) -> u64 {
        let removed = self.cache.stats().await.entries;
        self.cache.clear().await;
        tracing::info!(removed, "cache cleared");
        removed
    }

    /// Check that the metasearch provider answers, and report cache state.
    ///
    /// Sends one lightweight query without retries. The report is
    /// `degraded` when the provider cannot be reached.
    pub async fn health(&self) -> HealthReport {
        let config = SearchConfig {
            retry_attempts: 0,
            max_results: 1,
            ..self.search_config.clone()
        };
        let searxng_reachable =
            match try_retrieve(&self.searcher, HEALTH_QUERY, &config).await {
                Ok(_) => true,
                Err(err) => {
                    tracing::warn!(backend = self.searcher.name(), error = %err, "health check failed");
                    false
                }
            };
        let cache = self.cache.stats().await;

        HealthReport {
            status: if searxng_reachable {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            searxng_reachable,
            backend: self.backend.name().to_owned(),
            model: self.backend.model().to_owned(),
            cache_hit_rate: cache.hit_rate(),
            cache,
        }
    }

    /// Trim `question` and reject it if empty, too long or containing
    /// control characters.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`].
    pub fn validate_question(&self, question: &str) -> Result<String> {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::InvalidInput("query is empty".into()));
        }
        let chars = trimmed.chars().count();
        if chars > self.settings.max_query_chars {
            return Err(PipelineError::InvalidInput(format!(
                "query is {chars} characters, limit is {}",
                self.settings.max_query_chars
            )));
        }
        if trimmed.chars().any(|c| c.is_control() && !c.is_whitespace()) {
            return Err(PipelineError::InvalidInput(
                "query contains control characters".into(),
            ));
        }
        Ok(trimmed.to_owned())
    }

    /// Answer `question` with default options.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] only; every other failure is
    /// reported inside the result.
    pub async fn answer(&self, question: &str) -> Result<PipelineResult> {
        self.answer_with(question, QueryOptions::default()).await
    }

    /// Answer `question`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] only.
    pub async fn answer_with(&self, question: &str, options: QueryOptions) -> Result<PipelineResult> {
        let question = self.validate_question(question)?;
        let use_cache = self.shares_cache_entry(&question, options);

        if use_cache && !options.skip_cache {
            if let Some(hit) = self.cached(&question).await {
                return Ok(hit);
            }
        }

        let Gathered { sources, complex } = self.gather(&question, options).await;
        let result = match self.rank(&question, &sources).await {
            Some(selection) => {
                self.synthesize_answer(&question, &sources, selection, complex)
                    .await
            }
            None => response::no_results(&question),
        };
        if use_cache {
            self.store(&question, &result).await;
        }
        Ok(result)
    }

    /// Answer `question` as a stream of progress, token and final events.
    ///
    /// Dropping the stream cancels in-flight work; no partial result is
    /// produced.
    pub fn answer_stream<'a>(
        &'a self,
        question: &'a str,
        options: QueryOptions,
    ) -> impl Stream<Item = PipelineEvent> + Send + 'a
    where
        S: 'a,
    {
        async_stream::stream! {
            let question = match self.validate_question(question) {
                Ok(q) => q,
                Err(err) => {
                    yield PipelineEvent::Error { message: err.to_string() };
                    return;
                }
            };

            let use_cache = self.shares_cache_entry(&question, options);
            let mut result = None;
            if use_cache && !options.skip_cache {
                yield status(Stage::CheckingCache);
                result = self.cached(&question).await;
            }

            let result = match result {
                Some(hit) => {
                    yield PipelineEvent::Status {
                        stage: Stage::CheckingCache,
                        message: "Found cached result".to_owned(),
                    };
                    hit
                }
                None => {
                    yield status(Stage::Retrieving);
                    let Gathered { sources, complex } = self.gather(&question, options).await;

                    let mut selection = None;
                    if !sources.is_empty() {
                        yield status(Stage::Ranking);
                        selection = self.rank(&question, &sources).await;
                    }

                    let fresh = match selection {
                        Some(selection) => {
                            yield status(Stage::Synthesizing);
                            self.synthesize_answer(&question, &sources, selection, complex)
                                .await
                        }
                        None => response::no_results(&question),
                    };
                    if use_cache {
                        self.store(&question, &fresh).await;
                    }
                    fresh
                }
            };

            for chunk in result.answer.split_inclusive(char::is_whitespace) {
                yield PipelineEvent::Token { content: chunk.to_owned() };
            }
            yield PipelineEvent::Done { result: Box::new(result) };
        }
    }

    /// Retrieve and score sources for `query` without synthesis.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] only.
    pub async fn sources(&self, query: &str, limit: usize) -> Result<SourcesReport> {
        let query = self.validate_question(query)?;
        let raw = retrieve(&self.searcher, &query, &self.search_config).await;
        let total_found = raw.len();
        let sources = enrich_all(raw)
            .into_iter()
            .take(limit)
            .map(|mut s| {
                s.snippet = truncate_chars(&s.snippet, SOURCE_SNIPPET_CHARS).to_owned();
                s
            })
            .collect();
        Ok(SourcesReport {
            query,
            sources,
            total_found,
        })
    }

    /// Explore `topic` through up to `depth` related queries (clamped to
    /// 1..=5) and collect their answers and sources.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if `topic` is invalid.
    pub async fn research(&self, topic: &str, depth: usize) -> Result<ResearchReport> {
        let topic = self.validate_question(topic)?;
        let mut findings = Vec::new();
        let mut sources: Vec<String> = Vec::new();

        for query in research_queries(&topic, depth) {
            let result = match self.answer(&query).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(error = %err, "research query rejected");
                    continue;
                }
            };
            for source in &result.sources {
                if sources.len() < MAX_RESEARCH_SOURCES && !sources.contains(&source.url) {
                    sources.push(source.url.clone());
                }
            }
            findings.push(ResearchFinding {
                query,
                answer: result.answer,
                confidence: result.confidence,
                status: result.status,
            });
        }

        tracing::info!(explored = findings.len(), sources = sources.len(), "research complete");
        Ok(ResearchReport {
            topic,
            findings,
            sources,
        })
    }

    async fn cached(&self, question: &str) -> Option<PipelineResult> {
        let mut hit = self.cache.get(&fingerprint(question)).await?;
        hit.cached = true;
        Some(hit)
    }

    async fn store(&self, question: &str, result: &PipelineResult) {
        if result.is_cacheable() {
            self.cache
                .set(fingerprint(question), result.clone(), self.cache_ttl)
                .await;
        }
    }

    async fn gather(&self, question: &str, options: QueryOptions) -> Gathered {
        let complex =
            self.settings.decompose_complex && !options.no_decompose && is_complex(question);

        let raw = if complex {
            let sub_queries =
                decompose(self.backend.as_ref(), question, self.settings.max_sub_queries).await;
            tracing::debug!(count = sub_queries.len(), "retrieving sub-queries");
            retrieve_many(
                &self.searcher,
                &sub_queries,
                &self.search_config,
                self.settings.complex_result_cap,
            )
            .await
        } else {
            retrieve(&self.searcher, question, &self.search_config).await
        };

        tracing::debug!(count = raw.len(), complex, "retrieval finished");
        Gathered {
            sources: enrich_all(raw),
            complex,
        }
    }

    /// Whether the answer for `question` under `options` is the one stored
    /// under its fingerprint. A complex question answered without
    /// decomposition differs from the default answer and bypasses the cache.
    fn shares_cache_entry(&self, question: &str, options: QueryOptions) -> bool {
        !(options.no_decompose && self.settings.decompose_complex && is_complex(question))
    }

    /// Rank `sources`, or `None` when there is nothing to synthesize from.
    async fn rank(&self, question: &str, sources: &[EnrichedSource]) -> Option<RankedSelection> {
        if sources.is_empty() {
            tracing::info!("no search results");
            return None;
        }
        let backend = self
            .settings
            .rank_with_llm
            .then_some(self.backend.as_ref());
        let options = RerankOptions {
            preview_chars: self.settings.passage_preview_chars,
            ..RerankOptions::default()
        };
        let selection = rerank(question, sources, self.settings.top_k, backend, &options).await;
        (!selection.is_empty()).then_some(selection)
    }

    async fn synthesize_answer(
        &self,
        question: &str,
        sources: &[EnrichedSource],
        selection: RankedSelection,
        complex: bool,
    ) -> PipelineResult {
        let passages: Vec<String> = selection
            .project(sources)
            .iter()
            .map(|s| s.passage())
            .collect();

        let options = SynthesisOptions {
            context_char_budget: if complex {
                self.settings.complex_context_char_budget
            } else {
                self.settings.context_char_budget
            },
            default_confidence: self.settings.default_confidence,
            timeout: self.settings.synthesis_timeout(),
            request: self.request.clone(),
        };

        let model = self.backend.model().to_owned();
        match synthesize(self.backend.as_ref(), question, &passages, &options).await {
            Ok(synthesis) => {
                let mut used = selection;
                used.truncate(synthesis.passages_used);
                tracing::info!(
                    sources = used.len(),
                    confidence = synthesis.confidence,
                    strategy = ?used.strategy(),
                    "answer synthesized"
                );
                response::build(
                    question,
                    sources,
                    &used,
                    &synthesis.answer,
                    synthesis.confidence,
                    &model,
                )
            }
            Err(err) => {
                tracing::error!(
                    backend = self.backend.name(),
                    code = err.code(),
                    retryable = err.is_retryable(),
                    error = %err,
                    "synthesis failed, returning degraded answer"
                );
                response::degraded(question, &err, &model)
            }
        }
    }
}

fn status(stage: Stage) -> PipelineEvent {
    PipelineEvent::Status {
        stage,
        message: stage.message().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures_util::StreamExt;
    use searchflow_search::{RawResult, SearchError};

    use super::*;
    use crate::llm::LlmError;
    use crate::response::AnswerStatus;

    struct FixedSearch {
        results: Vec<RawResult>,
        queries: Mutex<Vec<String>>,
    }

    impl FixedSearch {
        fn new(results: Vec<RawResult>) -> Self {
            Self {
                results,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    impl MetasearchBackend for FixedSearch {
        async fn search(
            &self,
            query: &str,
            _config: &SearchConfig,
        ) -> std::result::Result<Vec<RawResult>, SearchError> {
            self.queries.lock().expect("lock").push(query.to_owned());
            Ok(self.results.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    /// Answers ranking prompts with `rank_reply`, decomposition prompts with
    /// `decompose_reply`, and everything else with `answer_reply`.
    struct RoutedLlm {
        rank_reply: std::result::Result<String, LlmError>,
        decompose_reply: std::result::Result<String, LlmError>,
        answer_reply: std::result::Result<String, LlmError>,
        answer_delay: Duration,
        calls: AtomicUsize,
    }

    impl RoutedLlm {
        fn answering(answer: &str) -> Self {
            Self {
                rank_reply: Ok("1".into()),
                decompose_reply: Ok(String::new()),
                answer_reply: Ok(answer.to_owned()),
                answer_delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for RoutedLlm {
        fn name(&self) -> &str {
            "routed"
        }

        fn model(&self) -> &str {
            "routed-1"
        }

        async fn complete(
            &self,
            prompt: &str,
            _options: &RequestOptions,
        ) -> std::result::Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.starts_with("Rank the passages") {
                self.rank_reply.clone()
            } else if prompt.starts_with("Break the following question") {
                self.decompose_reply.clone()
            } else {
                tokio::time::sleep(self.answer_delay).await;
                self.answer_reply.clone()
            }
        }
    }

    struct DownSearch;

    impl MetasearchBackend for DownSearch {
        async fn search(
            &self,
            _query: &str,
            _config: &SearchConfig,
        ) -> std::result::Result<Vec<RawResult>, SearchError> {
            Err(SearchError::Status { status: 503 })
        }

        fn name(&self) -> &'static str {
            "down"
        }
    }

    fn hits() -> Vec<RawResult> {
        vec![
            RawResult::new("https://example-blog.test/fastapi", "Blog", "random tips", "bing"),
            RawResult::new("https://docs.python.org/3/", "Python docs", "official guidance", "ddg"),
        ]
    }

    fn pipeline(search: FixedSearch, llm: RoutedLlm) -> SearchPipeline<FixedSearch> {
        SearchPipeline::new(
            search,
            SearchConfig::default(),
            Arc::new(llm),
            Arc::new(MemoryCache::new(100)),
        )
    }

    #[tokio::test]
    async fn empty_question_rejected() {
        let p = pipeline(FixedSearch::new(hits()), RoutedLlm::answering("ANSWER: x"));
        let err = p.answer("   ").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(p.searcher.queries.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn overlong_question_rejected() {
        let p = pipeline(FixedSearch::new(hits()), RoutedLlm::answering("ANSWER: x"));
        let err = p.answer(&"a".repeat(1001)).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(p.answer(&"a".repeat(1000)).await.is_ok());
    }

    #[tokio::test]
    async fn control_characters_rejected() {
        let p = pipeline(FixedSearch::new(hits()), RoutedLlm::answering("ANSWER: x"));
        assert!(p.answer("rust\u{0}async").await.is_err());
    }

    #[tokio::test]
    async fn answered_result_uses_llm_ranking() {
        let mut llm = RoutedLlm::answering("ANSWER: Use Pydantic [1].\nCONFIDENCE: 0.85 (high)");
        llm.rank_reply = Ok("2".into());
        let p = pipeline(FixedSearch::new(hits()), llm);

        let result = p.answer("best FastAPI practices").await.expect("answer");
        assert_eq!(result.status, AnswerStatus::Answered);
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].url, "https://docs.python.org/3/");
        assert_eq!(result.citations.len(), 1);
        assert!((result.confidence - 0.85).abs() < 1e-9);
        assert_eq!(result.model_used, "routed-1");
        assert!(!result.cached);
    }

    #[tokio::test]
    async fn fallback_ranking_with_top_k_one_picks_official_docs() {
        let mut llm = RoutedLlm::answering("ANSWER: ok [1]\nCONFIDENCE: 0.9");
        llm.rank_reply = Ok("not a number".into());
        let p = pipeline(FixedSearch::new(hits()), llm).with_settings(PipelineConfig {
            top_k: 1,
            ..Default::default()
        });

        let result = p.answer("best FastAPI practices").await.expect("answer");
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].url, "https://docs.python.org/3/");
        assert_eq!(result.ranking, Some(crate::rerank::RankStrategy::Credibility));
    }

    #[tokio::test]
    async fn synthesis_auth_failure_degrades() {
        let mut llm = RoutedLlm::answering("");
        llm.answer_reply = Err(LlmError::Auth("invalid key".into()));
        let p = pipeline(FixedSearch::new(hits()), llm);

        let result = p.answer("best FastAPI practices").await.expect("answer");
        assert_eq!(result.status, AnswerStatus::Degraded);
        assert_eq!(result.confidence, 0.0);
        assert!(result.sources.is_empty());
        assert!(result.answer.contains("Error"));

        // Degraded answers are not cached.
        let again = p.answer("best FastAPI practices").await.expect("answer");
        assert!(!again.cached);
    }

    #[tokio::test]
    async fn empty_retrieval_gives_no_results_without_llm_call() {
        let llm = RoutedLlm::answering("ANSWER: x");
        let p = pipeline(FixedSearch::new(Vec::new()), llm);
        let result = p.answer("nothing matches this").await.expect("answer");
        assert_eq!(result.status, AnswerStatus::NoResults);
        assert!(result.sources.is_empty());
        assert!(result.answer.contains("Could not find relevant information"));
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn second_identical_query_hits_cache() {
        let p = pipeline(
            FixedSearch::new(hits()),
            RoutedLlm::answering("ANSWER: cached answer\nCONFIDENCE: 0.8"),
        );
        let first = p.answer("Rust async").await.expect("first");
        let second = p.answer("  rust ASYNC ").await.expect("second");
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.answer, first.answer);
        assert_eq!(p.searcher.queries.lock().expect("lock").len(), 1);

        let stats = p.cache_stats().await;
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn skip_cache_reruns_pipeline() {
        let p = pipeline(
            FixedSearch::new(hits()),
            RoutedLlm::answering("ANSWER: a\nCONFIDENCE: 0.8"),
        );
        p.answer("rust async").await.expect("first");
        let fresh = p
            .answer_with(
                "rust async",
                QueryOptions {
                    skip_cache: true,
                    ..Default::default()
                },
            )
            .await
            .expect("second");
        assert!(!fresh.cached);
        assert_eq!(p.searcher.queries.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn complex_question_is_decomposed() {
        let mut llm = RoutedLlm::answering("ANSWER: both [1]\nCONFIDENCE: 0.8");
        llm.decompose_reply = Ok("Axum key features\nActix key features".into());
        let p = pipeline(FixedSearch::new(hits()), llm);

        p.answer("Compare Axum and Actix").await.expect("answer");
        let queries = p.searcher.queries.lock().expect("lock").clone();
        assert_eq!(queries.len(), 2);
        assert!(queries.contains(&"Axum key features".to_owned()));
    }

    #[tokio::test]
    async fn stream_emits_status_tokens_and_done() {
        let p = pipeline(
            FixedSearch::new(hits()),
            RoutedLlm::answering("ANSWER: Use Pydantic models [1].\nCONFIDENCE: 0.9"),
        );
        let events: Vec<PipelineEvent> = p
            .answer_stream("best FastAPI practices", QueryOptions::default())
            .collect()
            .await;

        assert!(matches!(
            events.first(),
            Some(PipelineEvent::Status { stage: Stage::CheckingCache, .. })
        ));
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Token { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Use Pydantic models [1].");
        match events.last() {
            Some(PipelineEvent::Done { result }) => {
                assert_eq!(result.status, AnswerStatus::Answered);
                assert!(!result.cached);
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_rejects_invalid_input() {
        let p = pipeline(FixedSearch::new(hits()), RoutedLlm::answering("ANSWER: x"));
        let events: Vec<PipelineEvent> = p.answer_stream("", QueryOptions::default()).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PipelineEvent::Error { .. }));
    }

    #[tokio::test]
    async fn sources_skip_synthesis() {
        let llm = Arc::new(RoutedLlm::answering("ANSWER: x"));
        let p = SearchPipeline::new(
            FixedSearch::new(hits()),
            SearchConfig::default(),
            llm.clone(),
            Arc::new(NoopCache::default()),
        );
        let report = p.sources("fastapi", 1).await.expect("sources");
        assert_eq!(report.total_found, 2);
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].url, "https://example-blog.test/fastapi");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn research_queries_clamp_depth() {
        assert_eq!(research_queries("WebAssembly", 0), vec!["WebAssembly"]);
        assert_eq!(research_queries("WebAssembly", 9).len(), 5);
        assert_eq!(
            research_queries("WebAssembly", 3),
            vec!["WebAssembly", "what is WebAssembly", "WebAssembly benefits"]
        );
    }

    #[tokio::test]
    async fn research_collects_unique_sources() {
        let p = pipeline(
            FixedSearch::new(hits()),
            RoutedLlm::answering("ANSWER: wasm [1]\nCONFIDENCE: 0.8"),
        );
        let report = p.research("WebAssembly", 2).await.expect("research");
        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.findings[1].query, "what is WebAssembly");
        assert_eq!(report.sources, vec!["https://example-blog.test/fastapi".to_owned()]);
    }
    #[tokio::test]
    async fn stream_announces_each_stage_before_it_runs() {
        let llm = Arc::new(RoutedLlm::answering("ANSWER: ok [1]\nCONFIDENCE: 0.9"));
        let p = SearchPipeline::new(
            FixedSearch::new(hits()),
            SearchConfig::default(),
            llm.clone(),
            Arc::new(MemoryCache::new(10)),
        );

        let mut stream = std::pin::pin!(p.answer_stream("best FastAPI practices", QueryOptions::default()));
        let mut stages = Vec::new();
        while let Some(event) = stream.next().await {
            if let PipelineEvent::Status { stage, .. } = event {
                stages.push((stage, llm.calls.load(Ordering::SeqCst)));
            }
        }

        // (stage, language-model calls made before it was announced)
        assert_eq!(
            stages,
            vec![
                (Stage::CheckingCache, 0),
                (Stage::Retrieving, 0),
                (Stage::Ranking, 0),
                (Stage::Synthesizing, 1),
            ]
        );
    }

    #[tokio::test]
    async fn dropping_stream_mid_synthesis_stores_nothing() {
        let mut llm = RoutedLlm::answering("ANSWER: late [1]\nCONFIDENCE: 0.9");
        llm.answer_delay = Duration::from_millis(200);
        let cache = Arc::new(MemoryCache::new(10));
        let p = SearchPipeline::new(
            FixedSearch::new(hits()),
            SearchConfig::default(),
            Arc::new(llm),
            cache.clone(),
        );

        {
            let mut stream = std::pin::pin!(p.answer_stream("rust async", QueryOptions::default()));
            loop {
                match stream.next().await {
                    Some(PipelineEvent::Status { stage: Stage::Synthesizing, .. }) => break,
                    Some(PipelineEvent::Done { .. }) | None => panic!("stream ended before synthesis"),
                    Some(_) => {}
                }
            }
            let pending = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
            assert!(pending.is_err(), "synthesis should still be in flight");
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(cache.stats().await.entries, 0);
        assert!(!p.answer("rust async").await.expect("answer").cached);
    }

    #[tokio::test]
    async fn flattened_complex_answer_bypasses_cache() {
        let mut llm = RoutedLlm::answering("ANSWER: both [1]\nCONFIDENCE: 0.8");
        llm.decompose_reply = Ok("Axum key features\nActix key features".into());
        let p = pipeline(FixedSearch::new(hits()), llm);
        let flat = QueryOptions {
            no_decompose: true,
            ..Default::default()
        };

        p.answer_with("Compare Axum and Actix", flat).await.expect("flat");
        let decomposed = p.answer("Compare Axum and Actix").await.expect("default");
        assert!(!decomposed.cached);

        let flat_again = p.answer_with("Compare Axum and Actix", flat).await.expect("flat again");
        assert!(!flat_again.cached);
        assert!(p.answer("Compare Axum and Actix").await.expect("default again").cached);

        // flat, decomposed (two sub-queries), flat again
        assert_eq!(p.searcher.queries.lock().expect("lock").len(), 4);
    }

    #[tokio::test]
    async fn clear_cache_drops_answers() {
        let p = pipeline(
            FixedSearch::new(hits()),
            RoutedLlm::answering("ANSWER: a\nCONFIDENCE: 0.8"),
        );
        p.answer("rust async").await.expect("first");
        assert_eq!(p.clear_cache().await, 1);
        assert!(!p.answer("rust async").await.expect("second").cached);
    }

    #[tokio::test]
    async fn health_reports_reachable_search_and_hit_rate() {
        let p = pipeline(
            FixedSearch::new(hits()),
            RoutedLlm::answering("ANSWER: a\nCONFIDENCE: 0.8"),
        );
        p.answer("rust async").await.expect("miss");
        p.answer("rust async").await.expect("hit");

        let report = p.health().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.searxng_reachable);
        assert_eq!(report.backend, "routed");
        assert_eq!(report.model, "routed-1");
        assert_eq!(report.cache.hits, 1);
        assert!((report.cache_hit_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn health_degraded_when_search_down() {
        let p = SearchPipeline::new(
            DownSearch,
            SearchConfig::default(),
            Arc::new(RoutedLlm::answering("ANSWER: a")),
            Arc::new(NoopCache::default()),
        );
        let report = p.health().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(!report.searxng_reachable);
        assert_eq!(report.cache_hit_rate, 0.0);
    }
}
