//! Complex-question detection and decomposition.
//!
//! Comparison and multi-part questions retrieve poorly as one query. They
//! are split by the language model into a few focused sub-queries whose
//! results are merged before ranking.

use crate::llm::{CompletionBackend, RequestOptions};

/// Phrases marking a question as complex, matched on word boundaries.
const COMPLEX_INDICATORS: &[&str] = &[
    "compare",
    "comparison",
    "vs",
    "versus",
    "difference between",
    "differences between",
    "pros and cons",
    "advantages and disadvantages",
    "trade offs",
    "tradeoffs",
    "explain the relationship",
    "best practices for",
];

/// Sub-queries shorter than this many characters are discarded.
const MIN_SUB_QUERY_CHARS: usize = 6;

/// Fewest sub-queries a decomposition must yield to be used.
const MIN_SUB_QUERIES: usize = 2;

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Whether `question` should be decomposed.
pub fn is_complex(question: &str) -> bool {
    let question_words = words(question);
    COMPLEX_INDICATORS.iter().any(|indicator| {
        let phrase = words(indicator);
        question_words
            .windows(phrase.len())
            .any(|window| window == phrase.as_slice())
    })
}

/// Build the decomposition prompt.
pub fn build_decompose_prompt(question: &str, max_sub_queries: usize) -> String {
    format!(
        "Break the following question into {MIN_SUB_QUERIES} to {max_sub_queries} focused web \
         search queries, each targeting one aspect of it.\n\
         Question: {question}\n\n\
         Reply with one query per line and nothing else. Example for \"Compare X and Y\":\n\
         What are the key features of X?\n\
         What are the key features of Y?\n\
         X vs Y performance comparison"
    )
}

/// Extract sub-queries from a model reply: one per line, list bullets and
/// numbering removed, short and repeated lines dropped, capped at `max`.
pub fn parse_sub_queries(reply: &str, max: usize) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    for line in reply.lines() {
        let cleaned = strip_list_prefix(line.trim()).trim();
        if cleaned.chars().count() < MIN_SUB_QUERY_CHARS {
            continue;
        }
        if queries.iter().any(|q| q.eq_ignore_ascii_case(cleaned)) {
            continue;
        }
        queries.push(cleaned.to_owned());
        if queries.len() == max {
            break;
        }
    }
    queries
}

fn strip_list_prefix(line: &str) -> &str {
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest;
        }
    }
    line
}

/// Split `question` into sub-queries, or return it unchanged.
///
/// Falls back to `[question]` when the model fails or yields fewer than two
/// usable sub-queries.
pub async fn decompose(
    backend: &dyn CompletionBackend,
    question: &str,
    max_sub_queries: usize,
) -> Vec<String> {
    let prompt = build_decompose_prompt(question, max_sub_queries);
    let options = RequestOptions::new().with_max_tokens(200).with_temperature(0.0);

    match backend.complete(&prompt, &options).await {
        Ok(reply) => {
            let sub_queries = parse_sub_queries(&reply, max_sub_queries);
            if sub_queries.len() >= MIN_SUB_QUERIES {
                tracing::debug!(count = sub_queries.len(), "decomposed complex question");
                sub_queries
            } else {
                tracing::debug!("decomposition too short, using original question");
                vec![question.to_owned()]
            }
        }
        Err(err) => {
            tracing::warn!(code = err.code(), "query decomposition failed");
            vec![question.to_owned()]
        }
    }
}
