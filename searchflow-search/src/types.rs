//! Core types for raw metasearch results.

use serde::{Deserialize, Serialize};

/// Engine label used when the metasearch provider omits one.
pub const UNKNOWN_ENGINE: &str = "unknown";

/// A single search hit as reported by the metasearch provider.
///
/// Created per query by the retriever and handed downstream; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    /// The URL of the result page. Used as the deduplication key.
    pub url: String,
    /// The title of the result page.
    pub title: String,
    /// The passage text (SearXNG's `content` field).
    pub snippet: String,
    /// Which upstream engine produced this hit (e.g. `"duckduckgo"`).
    pub engine: String,
}

impl RawResult {
    /// Create a result from its four fields.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
        engine: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            engine: engine.into(),
        }
    }
}

/// SearXNG safe-search levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    /// No filtering.
    Off,
    /// Moderate filtering (SearXNG level 1).
    #[default]
    Moderate,
    /// Strict filtering.
    Strict,
}

impl SafeSearch {
    /// The numeric level SearXNG expects in its `safesearch` parameter.
    pub fn level(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Moderate => 1,
            Self::Strict => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_result_construction() {
        let result = RawResult::new(
            "https://docs.python.org/3/",
            "Python docs",
            "The official documentation",
            "duckduckgo",
        );
        assert_eq!(result.url, "https://docs.python.org/3/");
        assert_eq!(result.engine, "duckduckgo");
    }

    #[test]
    fn safe_search_levels() {
        assert_eq!(SafeSearch::Off.level(), 0);
        assert_eq!(SafeSearch::Moderate.level(), 1);
        assert_eq!(SafeSearch::Strict.level(), 2);
        assert_eq!(SafeSearch::default(), SafeSearch::Moderate);
    }

    #[test]
    fn safe_search_serde_lowercase() {
        let json = serde_json::to_string(&SafeSearch::Strict).expect("serialize");
        assert_eq!(json, "\"strict\"");
        let decoded: SafeSearch = serde_json::from_str("\"off\"").expect("deserialize");
        assert_eq!(decoded, SafeSearch::Off);
    }
}
