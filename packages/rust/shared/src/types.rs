//! Core domain types for article generation requests and results.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ArticleGenError, Result};

/// Language used when the caller does not pick one.
pub const DEFAULT_LANGUAGE: &str = "pt";

/// Minimum word count used when the caller does not pick one.
pub const DEFAULT_MIN_WORDS: usize = 300;

/// Upper bound on the requested minimum word count.
pub const MAX_MIN_WORDS: usize = 2000;

/// Lower bound on topic length, in characters.
pub const MIN_TOPIC_CHARS: usize = 3;

/// Upper bound on topic length, in characters.
pub const MAX_TOPIC_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one generate request (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Style
// ---------------------------------------------------------------------------

/// Writing style requested for the article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    #[default]
    Informative,
    Academic,
    Journalistic,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informative => "informative",
            Self::Academic => "academic",
            Self::Journalistic => "journalistic",
        }
    }
}

impl std::fmt::Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Style {
    type Err = ArticleGenError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "informative" => Ok(Self::Informative),
            "academic" => Ok(Self::Academic),
            "journalistic" => Ok(Self::Journalistic),
            other => Err(ArticleGenError::invalid_request(format!(
                "unknown style '{other}': expected informative, academic, or journalistic"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ArticleRequest
// ---------------------------------------------------------------------------

/// A validated request for one article. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRequest {
    topic: String,
    language: String,
    min_words: usize,
    style: Style,
}

impl ArticleRequest {
    /// Validate and build a request. The topic is stored trimmed.
    pub fn new(topic: &str, language: &str, min_words: usize, style: Style) -> Result<Self> {
        static LANGUAGE_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^[a-z]{2}$").expect("valid regex"));

        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ArticleGenError::invalid_request("topic must not be empty"));
        }
        let chars = topic.chars().count();
        if chars < MIN_TOPIC_CHARS {
            return Err(ArticleGenError::invalid_request(format!(
                "topic must have at least {MIN_TOPIC_CHARS} characters"
            )));
        }
        if chars > MAX_TOPIC_CHARS {
            return Err(ArticleGenError::invalid_request(format!(
                "topic exceeds {MAX_TOPIC_CHARS} characters"
            )));
        }
        if !LANGUAGE_RE.is_match(language) {
            return Err(ArticleGenError::invalid_request(format!(
                "language '{language}' must be a two-letter lowercase code"
            )));
        }
        if min_words == 0 || min_words > MAX_MIN_WORDS {
            return Err(ArticleGenError::invalid_request(format!(
                "min_words must be between 1 and {MAX_MIN_WORDS}, got {min_words}"
            )));
        }

        Ok(Self {
            topic: topic.to_string(),
            language: language.to_string(),
            min_words,
            style,
        })
    }

    /// Build a request with the default language, minimum, and style.
    pub fn with_defaults(topic: &str) -> Result<Self> {
        Self::new(topic, DEFAULT_LANGUAGE, DEFAULT_MIN_WORDS, Style::default())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn min_words(&self) -> usize {
        self.min_words
    }

    pub fn style(&self) -> Style {
        self.style
    }
}

// ---------------------------------------------------------------------------
// ResearchContext
// ---------------------------------------------------------------------------

/// How the topic was resolved against the knowledge source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Direct,
    Redirected,
    Disambiguated,
    NotFound,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Redirected => "redirected",
            Self::Disambiguated => "disambiguated",
            Self::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized factual material retrieved for a topic; input to synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchContext {
    /// Canonical article title.
    pub title: String,
    /// Extracted plain-text body (possibly truncated).
    pub body: String,
    /// Source URLs.
    pub sources: Vec<String>,
    /// How the topic was resolved.
    pub status: ResolutionStatus,
    /// Whether `body` was cut to the configured maximum length.
    pub truncated: bool,
    /// Language edition the article was read from.
    pub language: String,
    /// SHA-256 of `body`.
    pub content_hash: String,
    /// When the source was queried.
    pub fetched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ArticleResult
// ---------------------------------------------------------------------------

/// Provenance of a generated article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub request_id: RequestId,
    /// Name of the provider whose output was kept.
    pub provider: String,
    /// Model identifier of that provider.
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub style: Style,
    pub topic: String,
    pub language: String,
    pub research_status: ResolutionStatus,
    pub research_truncated: bool,
    /// Provider calls made across all synthesis rounds, including retries.
    pub synthesis_attempts: u32,
    /// Synthesis rounds triggered by a word-count shortfall.
    pub repair_attempts: u32,
}

/// The terminal artifact of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleResult {
    pub title: String,
    /// Markdown body, heading markers included.
    pub content: String,
    pub word_count: usize,
    pub sources: Vec<String>,
    /// Set when the repair loop was exhausted below the requested minimum.
    pub shortfall: bool,
    /// Words missing to reach the minimum; zero unless `shortfall`.
    pub word_deficit: usize,
    pub metadata: GenerationMetadata,
}
