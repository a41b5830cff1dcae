//! Rendering of pipeline results for callers.
//!
//! [`JsonDocument`] is the machine-readable shape; Markdown and plain text
//! are the human-readable ones.

use std::fmt::Write as _;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::pipeline::{ResearchReport, SourcesReport};
use crate::rerank::truncate_chars;
use crate::response::{AnswerStatus, Citation, PipelineResult};

/// Version string stamped into document metadata.
pub const DOCUMENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Structured JSON document.
    #[default]
    Json,
    /// Markdown document.
    Markdown,
    /// Answer text with a short source list.
    Text,
}

/// A source entry of the JSON document.
#[derive(Debug, Serialize)]
pub struct SourceEntry<'a> {
    pub url: &'a str,
    pub title: &'a str,
    pub engine: &'a str,
    pub credibility_score: f64,
    pub credibility_category: &'static str,
}

/// A context entry of the JSON document: the passage text given to the model.
#[derive(Debug, Serialize)]
pub struct ContextEntry<'a> {
    pub text: String,
    pub url: &'a str,
    pub title: &'a str,
    pub source: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Metadata<'a> {
    pub timestamp: String,
    pub version: &'static str,
    pub cached: bool,
    pub model_used: &'a str,
}

/// Machine-readable rendering of a [`PipelineResult`].
#[derive(Debug, Serialize)]
pub struct JsonDocument<'a> {
    pub query: &'a str,
    pub answer: &'a str,
    pub confidence: f64,
    pub status: AnswerStatus,
    pub sources: Vec<SourceEntry<'a>>,
    pub context: Vec<ContextEntry<'a>>,
    pub citations: &'a [Citation],
    pub metadata: Metadata<'a>,
}

impl<'a> JsonDocument<'a> {
    /// Build the document, keeping at most `text_chars` characters of each
    /// context passage.
    pub fn new(result: &'a PipelineResult, text_chars: usize) -> Self {
        let sources = result
            .sources
            .iter()
            .map(|s| SourceEntry {
                url: &s.url,
                title: &s.title,
                engine: &s.engine,
                credibility_score: s.credibility_score,
                credibility_category: s.credibility_category.as_str(),
            })
            .collect();
        let context = result
            .sources
            .iter()
            .map(|s| ContextEntry {
                text: truncate_chars(&s.passage(), text_chars).to_owned(),
                url: &s.url,
                title: &s.title,
                source: &s.engine,
            })
            .collect();

        Self {
            query: &result.question,
            answer: &result.answer,
            confidence: result.confidence,
            status: result.status,
            sources,
            context,
            citations: &result.citations,
            metadata: Metadata {
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                version: DOCUMENT_VERSION,
                cached: result.cached,
                model_used: &result.model_used,
            },
        }
    }
}

/// Render `result` as a pretty-printed JSON document.
///
/// # Errors
///
/// Returns [`PipelineError::Output`] if serialization fails.
pub fn render_json(result: &PipelineResult, text_chars: usize) -> Result<String> {
    to_pretty_json(&JsonDocument::new(result, text_chars))
}

/// Serialize any report as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`PipelineError::Output`] if serialization fails.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| PipelineError::Output(e.to_string()))
}

/// Render `result` as a Markdown document.
pub fn render_markdown(result: &PipelineResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", result.question);
    let _ = writeln!(out, "{}\n", result.answer.trim());

    if !result.sources.is_empty() {
        let _ = writeln!(out, "## Sources\n");
        for (i, source) in result.sources.iter().enumerate() {
            let title = if source.title.is_empty() {
                source.url.as_str()
            } else {
                source.title.as_str()
            };
            let _ = writeln!(
                out,
                "{}. [{}]({}) (credibility {:.2}, {})",
                i + 1,
                title,
                source.url,
                source.credibility_score,
                source.credibility_category
            );
        }
        out.push('\n');
    }

    let _ = write!(
        out,
        "---\n*Confidence: {:.0}% | Model: {}",
        result.confidence * 100.0,
        result.model_used
    );
    if result.cached {
        out.push_str(" | cached");
    }
    out.push_str("*\n");
    out
}

/// Render `result` as plain text.
pub fn render_text(result: &PipelineResult) -> String {
    let mut out = format!("{}\n", result.answer.trim());
    if !result.sources.is_empty() {
        out.push_str("\nSources:\n");
        for (i, source) in result.sources.iter().enumerate() {
            let _ = writeln!(out, "  [{}] {}", i + 1, source.url);
        }
    }
    let _ = writeln!(out, "\nConfidence: {:.2}", result.confidence);
    out
}

/// Render a sources-only report as Markdown.
pub fn render_sources_markdown(report: &SourcesReport) -> String {
    let mut out = format!(
        "# Sources for: {}\n\n{} found\n\n",
        report.query, report.total_found
    );
    for (i, source) in report.sources.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. [{}]({}) ({}, credibility {:.2})",
            i + 1,
            source.title,
            source.url,
            source.engine,
            source.credibility_score
        );
        if !source.snippet.is_empty() {
            let _ = writeln!(out, "   > {}", source.snippet.replace('\n', " "));
        }
    }
    out
}

/// Render a research report as Markdown.
pub fn render_research_markdown(report: &ResearchReport) -> String {
    let mut out = format!("# Research: {}\n", report.topic);
    for finding in &report.findings {
        let _ = writeln!(out, "\n## {}\n\n{}", finding.query, finding.answer.trim());
    }
    if !report.sources.is_empty() {
        out.push_str("\n## Sources\n\n");
        for url in &report.sources {
            let _ = writeln!(out, "- {url}");
        }
    }
    out
}
