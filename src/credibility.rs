//! Source credibility scoring.
//!
//! Maps a URL to a trust score in `[0, 1]` and a coarse category, using a
//! static domain reputation table with TLD and naming heuristics behind it.
//! Scoring is pure and never fails: malformed input gets a neutral default.
//!
//! Score tiers, roughly:
//!
//! | score     | sources                                         |
//! |-----------|-------------------------------------------------|
//! | 0.90–0.95 | official documentation, research, .edu/.gov     |
//! | 0.80–0.88 | tutorials, education, tech news                 |
//! | 0.70–0.78 | Q&A and developer communities, encyclopedias    |
//! | 0.50–0.55 | social sites, unknown domains                   |
//! | 0.30–0.45 | personal blogs, spam-like and non-public hosts  |

use std::collections::HashMap;
use std::sync::OnceLock;

use searchflow_search::RawResult;
use serde::{Deserialize, Serialize};

/// Score for a URL whose host cannot be determined.
pub const MALFORMED_SCORE: f64 = 0.50;

/// Score for a well-formed URL that matches nothing in the table or heuristics.
pub const UNKNOWN_SCORE: f64 = 0.55;

/// Score for hosts whose name looks like spam or a throwaway tool site.
pub const LOW_QUALITY_SCORE: f64 = 0.30;

/// Score for reserved, non-public TLDs (`.test`, `.example`, ...).
pub const NON_PUBLIC_SCORE: f64 = 0.30;

/// Why a source is trusted (or not).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredibilityCategory {
    /// First-party documentation of a language, framework or platform.
    OfficialDocs,
    /// Research papers and preprints.
    Academic,
    /// Source hosting (GitHub, GitLab).
    CodeRepository,
    /// Structured courses and learning platforms.
    Educational,
    /// Tutorial sites.
    TechTutorial,
    /// Established technology news outlets.
    TechNews,
    /// Moderated Q&A sites.
    QaCommunity,
    /// Developer blogging communities.
    TechCommunity,
    /// General-purpose encyclopedias.
    Encyclopedia,
    /// Open blogging platforms.
    BlogPlatform,
    /// Social and discussion sites.
    SocialCommunity,
    /// Free personal blog hosts.
    PersonalBlog,
    /// `.edu` domains.
    EducationTld,
    /// `.gov` domains.
    GovernmentTld,
    /// `.org` domains not otherwise listed.
    OrganizationTld,
    /// Host names that look like spam, ads or throwaway tools.
    LowQuality,
    /// Reserved TLDs that cannot be real public sites.
    NonPublic,
    /// Nothing known about the source.
    Unknown,
}

impl CredibilityCategory {
    /// Snake-case label, as serialized.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OfficialDocs => "official_docs",
            Self::Academic => "academic",
            Self::CodeRepository => "code_repository",
            Self::Educational => "educational",
            Self::TechTutorial => "tech_tutorial",
            Self::TechNews => "tech_news",
            Self::QaCommunity => "qa_community",
            Self::TechCommunity => "tech_community",
            Self::Encyclopedia => "encyclopedia",
            Self::BlogPlatform => "blog_platform",
            Self::SocialCommunity => "social_community",
            Self::PersonalBlog => "personal_blog",
            Self::EducationTld => "education_tld",
            Self::GovernmentTld => "government_tld",
            Self::OrganizationTld => "organization_tld",
            Self::LowQuality => "low_quality",
            Self::NonPublic => "non_public",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CredibilityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credibility verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Credibility {
    /// Trust score in `[0, 1]`.
    pub score: f64,
    /// Coarse category explaining the score.
    pub category: CredibilityCategory,
}

impl Credibility {
    const fn new(score: f64, category: CredibilityCategory) -> Self {
        Self { score, category }
    }
}

use CredibilityCategory as C;

const DOMAIN_TABLE: &[(&str, f64, CredibilityCategory)] = &[
    ("docs.python.org", 0.95, C::OfficialDocs),
    ("fastapi.tiangolo.com", 0.95, C::OfficialDocs),
    ("react.dev", 0.95, C::OfficialDocs),
    ("nextjs.org", 0.95, C::OfficialDocs),
    ("vuejs.org", 0.95, C::OfficialDocs),
    ("angular.io", 0.95, C::OfficialDocs),
    ("kubernetes.io", 0.95, C::OfficialDocs),
    ("docker.com", 0.95, C::OfficialDocs),
    ("pytorch.org", 0.95, C::OfficialDocs),
    ("tensorflow.org", 0.95, C::OfficialDocs),
    ("developer.mozilla.org", 0.95, C::OfficialDocs),
    ("learn.microsoft.com", 0.95, C::OfficialDocs),
    ("cloud.google.com", 0.95, C::OfficialDocs),
    ("aws.amazon.com", 0.95, C::OfficialDocs),
    ("redis.io", 0.95, C::OfficialDocs),
    ("postgresql.org", 0.95, C::OfficialDocs),
    ("mongodb.com", 0.95, C::OfficialDocs),
    ("djangoproject.com", 0.95, C::OfficialDocs),
    ("flask.palletsprojects.com", 0.95, C::OfficialDocs),
    ("golang.org", 0.95, C::OfficialDocs),
    ("go.dev", 0.95, C::OfficialDocs),
    ("rust-lang.org", 0.95, C::OfficialDocs),
    ("docs.rs", 0.93, C::OfficialDocs),
    ("arxiv.org", 0.93, C::Academic),
    ("github.com", 0.90, C::CodeRepository),
    ("gitlab.com", 0.90, C::CodeRepository),
    ("realpython.com", 0.88, C::TechTutorial),
    ("freecodecamp.org", 0.85, C::Educational),
    ("digitalocean.com", 0.85, C::TechTutorial),
    ("baeldung.com", 0.85, C::TechTutorial),
    ("datacamp.com", 0.82, C::Educational),
    ("arstechnica.com", 0.82, C::TechNews),
    ("techcrunch.com", 0.80, C::TechNews),
    ("wired.com", 0.80, C::TechNews),
    ("theverge.com", 0.78, C::TechNews),
    ("hackernews.com", 0.75, C::TechNews),
    ("stackoverflow.com", 0.78, C::QaCommunity),
    ("stackexchange.com", 0.75, C::QaCommunity),
    ("quora.com", 0.50, C::QaCommunity),
    ("dev.to", 0.75, C::TechCommunity),
    ("hashnode.dev", 0.75, C::TechCommunity),
    ("geeksforgeeks.org", 0.72, C::TechTutorial),
    ("tutorialspoint.com", 0.70, C::TechTutorial),
    ("w3schools.com", 0.65, C::TechTutorial),
    ("wikipedia.org", 0.72, C::Encyclopedia),
    ("medium.com", 0.70, C::BlogPlatform),
    ("reddit.com", 0.55, C::SocialCommunity),
    ("wordpress.com", 0.45, C::PersonalBlog),
    ("blogspot.com", 0.40, C::PersonalBlog),
];

const TLD_TABLE: &[(&str, f64, CredibilityCategory)] = &[
    ("gov", 0.92, C::GovernmentTld),
    ("edu", 0.90, C::EducationTld),
    ("org", 0.70, C::OrganizationTld),
    ("test", NON_PUBLIC_SCORE, C::NonPublic),
    ("example", NON_PUBLIC_SCORE, C::NonPublic),
    ("invalid", NON_PUBLIC_SCORE, C::NonPublic),
    ("localhost", NON_PUBLIC_SCORE, C::NonPublic),
];

/// Host-name tokens that start with one of these mark a low-quality site.
const LOW_QUALITY_PREFIXES: &[&str] = &["spam", "ads", "click"];

/// Host-name substrings that mark a low-quality site.
const LOW_QUALITY_FRAGMENTS: &[&str] = &["free-", "cheap-", "-generator", "online-tool"];

static DOMAINS: OnceLock<HashMap<&'static str, Credibility>> = OnceLock::new();

fn domains() -> &'static HashMap<&'static str, Credibility> {
    DOMAINS.get_or_init(|| {
        DOMAIN_TABLE
            .iter()
            .map(|&(domain, score, category)| (domain, Credibility::new(score, category)))
            .collect()
    })
}

/// Lowercased host of `url` without a leading `www.`, if it has one.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_owned();
    (!host.is_empty()).then_some(host)
}

/// Score a URL.
///
/// Resolution order:
///
/// 1. The domain table, most specific suffix first: `docs.python.org`
///    before `python.org`, so `en.wikipedia.org` inherits `wikipedia.org`.
/// 2. The TLD table (`.gov`, `.edu`, `.org`, reserved TLDs).
/// 3. Spam-like host names.
/// 4. [`UNKNOWN_SCORE`].
///
/// Malformed URLs score [`MALFORMED_SCORE`] with [`CredibilityCategory::Unknown`].
pub fn score(url: &str) -> Credibility {
    let Some(host) = host_of(url) else {
        return Credibility::new(MALFORMED_SCORE, C::Unknown);
    };

    let table = domains();
    let mut suffix = host.as_str();
    loop {
        if let Some(hit) = table.get(suffix) {
            return *hit;
        }
        match suffix.split_once('.') {
            Some((_, rest)) if rest.contains('.') || table.contains_key(rest) => suffix = rest,
            _ => break,
        }
    }

    let tld = host.rsplit('.').next().unwrap_or(host.as_str());
    if let Some(&(_, score, category)) = TLD_TABLE.iter().find(|(t, _, _)| *t == tld) {
        return Credibility::new(score, category);
    }

    if looks_low_quality(&host) {
        return Credibility::new(LOW_QUALITY_SCORE, C::LowQuality);
    }

    Credibility::new(UNKNOWN_SCORE, C::Unknown)
}

fn looks_low_quality(host: &str) -> bool {
    LOW_QUALITY_FRAGMENTS.iter().any(|f| host.contains(f))
        || host
            .split(['.', '-'])
            .any(|token| LOW_QUALITY_PREFIXES.iter().any(|p| token.starts_with(p)))
}

/// A search hit with its credibility attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSource {
    /// Page URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Passage text.
    pub snippet: String,
    /// Upstream engine that reported the hit.
    pub engine: String,
    /// Trust score in `[0, 1]`.
    pub credibility_score: f64,
    /// Category explaining the score.
    pub credibility_category: CredibilityCategory,
}

impl EnrichedSource {
    /// Score `raw` and attach the verdict.
    pub fn from_raw(raw: RawResult) -> Self {
        let Credibility { score, category } = score(&raw.url);
        Self {
            url: raw.url,
            title: raw.title,
            snippet: raw.snippet,
            engine: raw.engine,
            credibility_score: score,
            credibility_category: category,
        }
    }

    /// Title and snippet as one passage.
    pub fn passage(&self) -> String {
        let title = self.title.trim();
        let snippet = self.snippet.trim();
        match (title.is_empty(), snippet.is_empty()) {
            (true, _) => snippet.to_owned(),
            (false, true) => title.to_owned(),
            (false, false) => format!("{title}\n{snippet}"),
        }
    }
}

/// Enrich every result, preserving order.
pub fn enrich_all(results: Vec<RawResult>) -> Vec<EnrichedSource> {
    results.into_iter().map(EnrichedSource::from_raw).collect()
}
