//! Final result assembly.
//!
//! Every terminal state of the pipeline produces a [`PipelineResult`]:
//! an answered one from [`build`], or one of the [`no_results`] and
//! [`degraded`] fallbacks.

use serde::{Deserialize, Serialize};

use crate::credibility::EnrichedSource;
use crate::llm::LlmError;
use crate::rerank::{RankStrategy, RankedSelection};

/// Answer text when retrieval found nothing.
pub const NO_RESULTS_ANSWER: &str =
    "Could not find relevant information for this question. Try rephrasing it or using more specific terms.";

/// Model identifier recorded when no model was consulted.
pub const NO_MODEL: &str = "none";

/// How a result was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// Synthesized from retrieved sources.
    Answered,
    /// Retrieval returned nothing; no model was called.
    NoResults,
    /// Synthesis failed; the answer explains the failure.
    Degraded,
}

/// A source referenced by an inline `[n]` marker in the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// The number used in the answer text (1-based).
    pub marker: usize,
    /// URL of the cited source.
    pub url: String,
    /// Title of the cited source.
    pub title: String,
}

/// The outcome of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// The question as asked.
    pub question: String,
    /// Answer text, or a user-facing explanation.
    pub answer: String,
    /// Sources given to the model, in rank order. Marker `[n]` refers to
    /// `sources[n - 1]`.
    pub sources: Vec<EnrichedSource>,
    /// Sources the answer actually cites.
    pub citations: Vec<Citation>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Identifier of the model that produced the answer.
    pub model_used: String,
    /// Whether this result came from the cache.
    pub cached: bool,
    /// Which terminal state produced this result.
    pub status: AnswerStatus,
    /// Which ranking path chose the sources, when ranking ran.
    pub ranking: Option<RankStrategy>,
}

impl PipelineResult {
    /// Whether this result may be stored in the cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == AnswerStatus::Answered
    }
}

/// Assemble an answered result.
///
/// Projects `selection` onto `sources` in rank order, keeps citations only
/// for markers that appear in `answer` and point at a selected source, and
/// clamps `confidence` into `[0, 1]`.
pub fn build(
    question: &str,
    sources: &[EnrichedSource],
    selection: &RankedSelection,
    answer: &str,
    confidence: f64,
    model_id: &str,
) -> PipelineResult {
    let selected: Vec<EnrichedSource> = selection.project(sources).into_iter().cloned().collect();
    let citations = extract_markers(answer)
        .into_iter()
        .filter_map(|marker| {
            let source = selected.get(marker.checked_sub(1)?)?;
            Some(Citation {
                marker,
                url: source.url.clone(),
                title: source.title.clone(),
            })
        })
        .collect();

    PipelineResult {
        question: question.to_owned(),
        answer: answer.to_owned(),
        sources: selected,
        citations,
        confidence: clamp_confidence(confidence),
        model_used: model_id.to_owned(),
        cached: false,
        status: AnswerStatus::Answered,
        ranking: Some(selection.strategy()),
    }
}

/// Result for a query whose retrieval came back empty.
pub fn no_results(question: &str) -> PipelineResult {
    PipelineResult {
        question: question.to_owned(),
        answer: NO_RESULTS_ANSWER.to_owned(),
        sources: Vec::new(),
        citations: Vec::new(),
        confidence: 0.0,
        model_used: NO_MODEL.to_owned(),
        cached: false,
        status: AnswerStatus::NoResults,
        ranking: None,
    }
}

/// Result for a query whose synthesis failed.
///
/// Confidence is zero and no sources are attached; the answer names the
/// failure in user-facing terms without provider details.
pub fn degraded(question: &str, error: &LlmError, model_id: &str) -> PipelineResult {
    PipelineResult {
        question: question.to_owned(),
        answer: format!(
            "Error: unable to generate an answer because {} ({}). Please try again later.",
            error.user_message(),
            error.code()
        ),
        sources: Vec::new(),
        citations: Vec::new(),
        confidence: 0.0,
        model_used: model_id.to_owned(),
        cached: false,
        status: AnswerStatus::Degraded,
        ranking: None,
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Citation numbers used in `text`, in order of first appearance.
///
/// Recognises `[1]`, `[1][2]` and `[1, 2]`. Bracketed text that is not a
/// list of numbers is ignored.
pub fn extract_markers(text: &str) -> Vec<usize> {
    let mut markers = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else { break };
        let inner = &after[..close];
        let numbers: Option<Vec<usize>> = inner
            .split(',')
            .map(|part| part.trim().parse::<usize>().ok())
            .collect();
        for n in numbers.into_iter().flatten() {
            if !markers.contains(&n) {
                markers.push(n);
            }
        }
        rest = &after[close + 1..];
    }
    markers
}

#[cfg(test)]
mod tests {
    use searchflow_search::RawResult;

    use super::*;
    use crate::credibility::enrich_all;
    use crate::rerank::fallback_rank;

    fn sources() -> Vec<EnrichedSource> {
        enrich_all(vec![
            RawResult::new("https://example-blog.test/a", "Blog", "b", "bing"),
            RawResult::new("https://docs.python.org/3/", "Docs", "d", "ddg"),
            RawResult::new("https://stackoverflow.com/q/1", "SO", "s", "ddg"),
        ])
    }

    #[test]
    fn build_projects_selection_in_rank_order() {
        let all = sources();
        let selection = fallback_rank(&all, 2);
        let result = build("q", &all, &selection, "See [1].", 0.8, "gpt-4o-mini");
        let urls: Vec<&str> = result.sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://docs.python.org/3/", "https://stackoverflow.com/q/1"]);
        assert_eq!(result.status, AnswerStatus::Answered);
        assert!(!result.cached);
        assert_eq!(result.model_used, "gpt-4o-mini");
        assert_eq!(result.ranking, Some(RankStrategy::Credibility));
    }

    #[test]
    fn citations_only_for_markers_present() {
        let all = sources();
        let selection = fallback_rank(&all, 3);
        let result = build("q", &all, &selection, "Mostly [2], also [1][7].", 0.8, "m");
        let markers: Vec<usize> = result.citations.iter().map(|c| c.marker).collect();
        assert_eq!(markers, vec![2, 1]);
        assert_eq!(result.citations[0].url, "https://stackoverflow.com/q/1");
    }

    #[test]
    fn confidence_is_clamped() {
        let all = sources();
        let selection = fallback_rank(&all, 1);
        assert_eq!(build("q", &all, &selection, "a", 3.0, "m").confidence, 1.0);
        assert_eq!(build("q", &all, &selection, "a", f64::NAN, "m").confidence, 0.0);
    }

    #[test]
    fn no_results_shape() {
        let result = no_results("obscure question");
        assert_eq!(result.status, AnswerStatus::NoResults);
        assert!(result.sources.is_empty());
        assert!(result.answer.contains("Could not find relevant information"));
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_cacheable());
    }

    #[test]
    fn degraded_shape() {
        let err = LlmError::Auth("401 invalid key sk-abc".into());
        let result = degraded("q", &err, "gpt-4o-mini");
        assert_eq!(result.status, AnswerStatus::Degraded);
        assert_eq!(result.confidence, 0.0);
        assert!(result.sources.is_empty());
        assert!(result.answer.starts_with("Error:"));
        assert!(result.answer.contains("AUTH_FAILED"));
        assert!(!result.answer.contains("sk-abc"));
        assert!(!result.is_cacheable());
    }

    #[test]
    fn marker_extraction() {
        assert_eq!(extract_markers("a [1] b [3, 2] c [1]"), vec![1, 3, 2]);
        assert_eq!(extract_markers("list [x] and [1a] and [ 4 ]"), vec![4]);
        assert_eq!(extract_markers("unclosed [2"), Vec::<usize>::new());
        assert!(extract_markers("no markers").is_empty());
    }

    #[test]
    fn result_serializes_status_snake_case() {
        let json = serde_json::to_value(no_results("q")).expect("serialize");
        assert_eq!(json["status"], "no_results");
        assert_eq!(json["cached"], false);
    }
}
