//! Passage reranking.
//!
//! The primary path asks the language model which passages best answer the
//! question. Its reply is parsed strictly; anything malformed, out of range
//! or empty sends the call down the credibility fallback, which is pure and
//! deterministic.

use serde::{Deserialize, Serialize};

use crate::credibility::EnrichedSource;
use crate::llm::{CompletionBackend, RequestOptions};

/// Which path produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankStrategy {
    /// Ordered by the language model.
    Llm,
    /// Ordered by credibility score, ties by retrieval order.
    Credibility,
}

/// Ordered, unique, in-bounds indices into an enriched source list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedSelection {
    indices: Vec<usize>,
    strategy: RankStrategy,
}

impl RankedSelection {
    /// An empty selection.
    pub fn empty(strategy: RankStrategy) -> Self {
        Self {
            indices: Vec::new(),
            strategy,
        }
    }

    /// Selected indices, most relevant first.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The path that produced this selection.
    pub fn strategy(&self) -> RankStrategy {
        self.strategy
    }

    /// Number of selected sources.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Keep only the first `len` selected indices.
    pub fn truncate(&mut self, len: usize) {
        self.indices.truncate(len);
    }

    /// The selected sources in rank order.
    pub fn project<'a>(&self, sources: &'a [EnrichedSource]) -> Vec<&'a EnrichedSource> {
        self.indices.iter().filter_map(|&i| sources.get(i)).collect()
    }
}

/// Settings for the language-model ranking path.
#[derive(Debug, Clone)]
pub struct RerankOptions {
    /// Characters of each passage shown to the model.
    pub preview_chars: usize,
    /// Generation options for the ranking call.
    pub request: RequestOptions,
}

impl Default for RerankOptions {
    fn default() -> Self {
        Self {
            preview_chars: 180,
            request: RequestOptions::new().with_max_tokens(64).with_temperature(0.0),
        }
    }
}

/// Select up to `top_k` sources for `question`.
///
/// With a backend, the model is asked first; without one, or if its answer
/// cannot be used, [`fallback_rank`] decides. Never fails.
pub async fn rerank(
    question: &str,
    sources: &[EnrichedSource],
    top_k: usize,
    backend: Option<&dyn CompletionBackend>,
    options: &RerankOptions,
) -> RankedSelection {
    if sources.is_empty() || top_k == 0 {
        return RankedSelection::empty(RankStrategy::Credibility);
    }

    if let Some(backend) = backend {
        let prompt = build_rank_prompt(question, sources, top_k, options.preview_chars);
        match backend.complete(&prompt, &options.request).await {
            Ok(reply) => match parse_rank_indices(&reply, sources.len()) {
                Some(mut indices) => {
                    indices.truncate(top_k);
                    tracing::debug!(selected = indices.len(), "LLM ranking accepted");
                    return RankedSelection {
                        indices,
                        strategy: RankStrategy::Llm,
                    };
                }
                None => {
                    tracing::warn!(
                        backend = backend.name(),
                        "LLM ranking output unusable, falling back to credibility order"
                    );
                }
            },
            Err(err) => {
                tracing::warn!(
                    backend = backend.name(),
                    code = err.code(),
                    "LLM ranking failed, falling back to credibility order"
                );
            }
        }
    }

    fallback_rank(sources, top_k)
}

/// Credibility-descending selection, ties broken by retrieval order.
pub fn fallback_rank(sources: &[EnrichedSource], top_k: usize) -> RankedSelection {
    let mut order: Vec<usize> = (0..sources.len()).collect();
    // Stable sort keeps retrieval order among equal scores.
    order.sort_by(|&a, &b| {
        sources[b]
            .credibility_score
            .total_cmp(&sources[a].credibility_score)
    });
    order.truncate(top_k);
    RankedSelection {
        indices: order,
        strategy: RankStrategy::Credibility,
    }
}

/// Build the ranking prompt. Passages are numbered from 1.
pub fn build_rank_prompt(
    question: &str,
    sources: &[EnrichedSource],
    top_k: usize,
    preview_chars: usize,
) -> String {
    let mut prompt = format!(
        "Rank the passages below by how well they answer the question.\n\
         Question: {question}\n\nPassages:\n"
    );
    for (i, source) in sources.iter().enumerate() {
        let passage = source.passage();
        let preview = truncate_chars(&passage, preview_chars);
        prompt.push_str(&format!(
            "[{}] (credibility: {:.2}) {}...\n",
            i + 1,
            source.credibility_score,
            preview.replace('\n', " ")
        ));
    }
    prompt.push_str(&format!(
        "\nReply with only the numbers of the {} most relevant passages, most relevant first, \
         separated by commas (for example: 3, 1, 2). Prefer credible sources when relevance is similar.",
        top_k.min(sources.len())
    ));
    prompt
}

/// Parse a model reply listing 1-based passage numbers into 0-based indices.
///
/// Only the first non-empty line is read; a leading `label:` is ignored.
/// Numbers are separated by commas or whitespace and may be wrapped in
/// brackets. Repeats are dropped, keeping the first. Any token that is not
/// a number in `1..=len`, or an empty list, makes the whole reply invalid.
pub fn parse_rank_indices(reply: &str, len: usize) -> Option<Vec<usize>> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let list = line.rsplit_once(':').map_or(line, |(_, rest)| rest);

    let mut indices = Vec::new();
    for token in list.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim_matches(|c| matches!(c, '[' | ']' | '(' | ')' | '.'));
        if token.is_empty() {
            continue;
        }
        let n: usize = token.parse().ok()?;
        if n == 0 || n > len {
            return None;
        }
        if !indices.contains(&(n - 1)) {
            indices.push(n - 1);
        }
    }

    (!indices.is_empty()).then_some(indices)
}

/// Cut `text` to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}
