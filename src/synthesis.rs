//! Answer synthesis over ranked passages.
//!
//! The selected passages become a numbered context block (`[1] ...`) capped
//! at a character budget. The model is asked for an `ANSWER:` and a
//! `CONFIDENCE:` line; the answer is required, the confidence is parsed
//! leniently and replaced by a configured default when unusable.

use std::time::Duration;

use crate::llm::{CompletionBackend, LlmError, RequestOptions};
use crate::rerank::truncate_chars;

/// Separator between numbered passages in the context block.
const PASSAGE_SEPARATOR: &str = "\n\n";

/// Settings for one synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Maximum characters of numbered context.
    pub context_char_budget: usize,
    /// Confidence substituted when the model's value cannot be parsed.
    pub default_confidence: f64,
    /// Time budget for the model call.
    pub timeout: Duration,
    /// Generation options.
    pub request: RequestOptions,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            context_char_budget: 3000,
            default_confidence: 0.7,
            timeout: Duration::from_secs(60),
            request: RequestOptions::default(),
        }
    }
}

/// A synthesized answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// Answer text, possibly containing `[n]` citation markers.
    pub answer: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// How many of the supplied passages fit into the context.
    pub passages_used: usize,
}

/// Number `passages` from 1 and join them until `budget` characters are used.
///
/// Passages are never split, except that a first passage longer than the
/// whole budget is cut so the context is never empty. Returns the context
/// and the number of passages it contains.
pub fn build_context(passages: &[String], budget: usize) -> (String, usize) {
    let mut context = String::new();
    let mut used_chars = 0;
    let mut used = 0;

    for (i, passage) in passages.iter().enumerate() {
        let entry = format!("[{}] {}", i + 1, passage.trim());
        let entry_chars = entry.chars().count();
        let sep_chars = if used == 0 { 0 } else { PASSAGE_SEPARATOR.len() };

        if used_chars + sep_chars + entry_chars > budget {
            if used == 0 && budget > 0 {
                context.push_str(truncate_chars(&entry, budget));
                used = 1;
            }
            break;
        }

        if used > 0 {
            context.push_str(PASSAGE_SEPARATOR);
        }
        context.push_str(&entry);
        used_chars += sep_chars + entry_chars;
        used += 1;
    }

    (context, used)
}

/// Build the grounded-answer prompt.
pub fn build_synthesis_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the question using only the numbered sources below. \
         Cite sources inline with their numbers, like [1] or [2]. \
         If the sources do not contain the answer, say so.\n\n\
         Sources:\n{context}\n\n\
         Question: {question}\n\n\
         Reply in exactly this format:\n\
         ANSWER: <your answer>\n\
         CONFIDENCE: <a number between 0 and 1>"
    )
}

/// Parse a confidence value such as `"0.85"`, `"0.85 (high)"` or `"85%"`.
///
/// Only the leading token counts. Returns `default` when that token is not
/// a number within `[0, 1]` (after percent conversion).
pub fn parse_confidence(text: &str, default: f64) -> f64 {
    let Some(token) = text.split_whitespace().next() else {
        return default;
    };
    let token = token.trim_end_matches(|c| matches!(c, ',' | ';' | ')' | ']'));
    let token = token.trim_end_matches('.').trim_start_matches(['(', '[']);

    let value = match token.strip_suffix('%') {
        Some(percent) => percent.parse::<f64>().ok().map(|p| p / 100.0),
        None => token.parse::<f64>().ok(),
    };

    match value {
        Some(v) if v.is_finite() && (0.0..=1.0).contains(&v) => v,
        _ => default,
    }
}

/// Split a model reply into answer text and confidence.
///
/// Markers are case-insensitive. Without an `ANSWER:` marker the whole
/// reply, minus any confidence line, is the answer.
pub fn parse_synthesis_reply(reply: &str, default_confidence: f64) -> (String, f64) {
    let mut answer_lines: Vec<&str> = Vec::new();
    let mut confidence = None;
    let mut saw_answer_marker = false;

    for line in reply.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = strip_marker(trimmed, "CONFIDENCE:") {
            confidence.get_or_insert_with(|| parse_confidence(rest, default_confidence));
            continue;
        }
        if let Some(rest) = strip_marker(trimmed, "ANSWER:") {
            saw_answer_marker = true;
            answer_lines.clear();
            answer_lines.push(rest.trim_start());
            continue;
        }
        answer_lines.push(line);
    }

    if !saw_answer_marker {
        tracing::trace!("synthesis reply had no ANSWER marker");
    }

    let answer = answer_lines.join("\n").trim().to_owned();
    (answer, confidence.unwrap_or(default_confidence))
}

fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let head = line.get(..marker.len())?;
    head.eq_ignore_ascii_case(marker)
        .then(|| &line[marker.len()..])
}

/// Ask `backend` for a grounded answer to `question` over `passages`.
///
/// `backend` is passed explicitly so concurrent requests can use different
/// models without sharing state.
///
/// # Errors
///
/// Returns the backend's [`LlmError`], [`LlmError::Timeout`] when the time
/// budget elapses, or [`LlmError::MalformedOutput`] when the reply has no
/// answer text.
pub async fn synthesize(
    backend: &dyn CompletionBackend,
    question: &str,
    passages: &[String],
    options: &SynthesisOptions,
) -> Result<Synthesis, LlmError> {
    let (context, passages_used) = build_context(passages, options.context_char_budget);
    let prompt = build_synthesis_prompt(question, &context);

    tracing::debug!(
        backend = backend.name(),
        model = backend.model(),
        passages_used,
        context_chars = context.chars().count(),
        "synthesizing answer"
    );

    let reply = tokio::time::timeout(options.timeout, backend.complete(&prompt, &options.request))
        .await
        .map_err(|_| {
            LlmError::Timeout(format!(
                "synthesis exceeded {}s",
                options.timeout.as_secs()
            ))
        })??;

    let (answer, confidence) = parse_synthesis_reply(&reply, options.default_confidence);
    if answer.is_empty() {
        return Err(LlmError::MalformedOutput("synthesis reply has no answer text".into()));
    }

    Ok(Synthesis {
        answer,
        confidence,
        passages_used,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct RecordingLlm {
        reply: Result<String, LlmError>,
        delay: Duration,
        last_prompt: Mutex<Option<String>>,
    }

    impl RecordingLlm {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_owned()),
                delay: Duration::ZERO,
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for RecordingLlm {
        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "recording-1"
        }

        async fn complete(&self, prompt: &str, _options: &RequestOptions) -> Result<String, LlmError> {
            *self.last_prompt.lock().expect("lock") = Some(prompt.to_owned());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone()
        }
    }

    fn passages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| (*t).to_owned()).collect()
    }

    #[test]
    fn context_numbers_passages_in_order() {
        let (context, used) = build_context(&passages(&["alpha", "beta"]), 3000);
        assert_eq!(context, "[1] alpha\n\n[2] beta");
        assert_eq!(used, 2);
    }

    #[test]
    fn context_stops_before_overflowing_budget() {
        let texts = passages(&["aaaa", "bbbb", "cccc"]);
        // "[1] aaaa" = 8, "\n\n[2] bbbb" = 10 -> 18; third would be 28.
        let (context, used) = build_context(&texts, 20);
        assert_eq!(used, 2);
        assert_eq!(context, "[1] aaaa\n\n[2] bbbb");
        assert!(context.chars().count() <= 20);
    }

    #[test]
    fn oversized_first_passage_is_cut() {
        let long = "x".repeat(5000);
        let (context, used) = build_context(&[long], 3000);
        assert_eq!(used, 1);
        assert_eq!(context.chars().count(), 3000);
        assert!(context.starts_with("[1] x"));
    }

    #[test]
    fn empty_passages_give_empty_context() {
        assert_eq!(build_context(&[], 3000), (String::new(), 0));
    }

    #[test]
    fn confidence_with_annotation() {
        assert!((parse_confidence("0.85 (high)", 0.7) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn confidence_variants() {
        assert!((parse_confidence("0.9.", 0.7) - 0.9).abs() < 1e-9);
        assert!((parse_confidence("85%", 0.7) - 0.85).abs() < 1e-9);
        assert!((parse_confidence("1", 0.7) - 1.0).abs() < 1e-9);
        assert!((parse_confidence("(0.4)", 0.7) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn unparseable_confidence_uses_default() {
        assert!((parse_confidence("very confident", 0.7) - 0.7).abs() < 1e-9);
        assert!((parse_confidence("", 0.7) - 0.7).abs() < 1e-9);
        assert!((parse_confidence("7", 0.7) - 0.7).abs() < 1e-9);
        assert!((parse_confidence("-0.2", 0.7) - 0.7).abs() < 1e-9);
        assert!((parse_confidence("NaN", 0.6) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn reply_with_markers() {
        let reply = "ANSWER: Use dependency injection [1].\nKeep handlers async [2].\nCONFIDENCE: 0.85 (high)";
        let (answer, confidence) = parse_synthesis_reply(reply, 0.7);
        assert_eq!(answer, "Use dependency injection [1].\nKeep handlers async [2].");
        assert!((confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn reply_without_markers_is_whole_answer() {
        let (answer, confidence) = parse_synthesis_reply("Just an answer.", 0.7);
        assert_eq!(answer, "Just an answer.");
        assert!((confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn markers_are_case_insensitive() {
        let (answer, confidence) = parse_synthesis_reply("answer: yes\nconfidence: 0.3", 0.7);
        assert_eq!(answer, "yes");
        assert!((confidence - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn synthesize_embeds_context_and_parses_reply() {
        let llm = RecordingLlm::replying("ANSWER: FastAPI uses Pydantic [1].\nCONFIDENCE: 0.85 (high)");
        let result = synthesize(
            &llm,
            "best FastAPI practices",
            &passages(&["Pydantic models validate input."]),
            &SynthesisOptions::default(),
        )
        .await
        .expect("synthesis");

        assert_eq!(result.answer, "FastAPI uses Pydantic [1].");
        assert!((result.confidence - 0.85).abs() < 1e-9);
        assert_eq!(result.passages_used, 1);

        let prompt = llm.last_prompt.lock().expect("lock").clone().expect("prompt");
        assert!(prompt.contains("[1] Pydantic models validate input."));
        assert!(prompt.contains("Question: best FastAPI practices"));
    }

    #[tokio::test]
    async fn synthesize_propagates_backend_error() {
        let llm = RecordingLlm {
            reply: Err(LlmError::Auth("bad key".into())),
            delay: Duration::ZERO,
            last_prompt: Mutex::new(None),
        };
        let err = synthesize(&llm, "q", &passages(&["p"]), &SynthesisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Auth(_)));
    }

    #[tokio::test]
    async fn synthesize_times_out() {
        let llm = RecordingLlm {
            reply: Ok("ANSWER: late".into()),
            delay: Duration::from_millis(200),
            last_prompt: Mutex::new(None),
        };
        let options = SynthesisOptions {
            timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let err = synthesize(&llm, "q", &passages(&["p"]), &options)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TIMEOUT_ERROR");
    }

    #[tokio::test]
    async fn empty_answer_is_malformed() {
        let llm = RecordingLlm::replying("CONFIDENCE: 0.9");
        let err = synthesize(&llm, "q", &passages(&["p"]), &SynthesisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MalformedOutput(_)));
    }
}
