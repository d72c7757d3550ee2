//! Error types for articlegen.
//!
//! Library crates use [`ArticleGenError`] via `thiserror`. Each pipeline stage
//! has its own error enum so the caller can tell where a request failed.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    Synthesis,
    Validation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Synthesis => "synthesis",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Top-level error type for all articlegen operations.
#[derive(Debug, thiserror::Error)]
pub enum ArticleGenError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The caller's request violates an input constraint.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Topic resolution failed.
    #[error("research stage failed: {0}")]
    Research(#[from] ResearchError),

    /// Every configured provider failed.
    #[error("synthesis stage failed: {0}")]
    Synthesis(#[from] SynthesisError),

    /// The generated text could not be turned into an article.
    #[error("validation stage failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ArticleGenError>;

impl ArticleGenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-request error from any displayable message.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The pipeline stage this error came from, if it came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Research(_) => Some(Stage::Research),
            Self::Synthesis(_) => Some(Stage::Synthesis),
            Self::Validation(_) => Some(Stage::Validation),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Research stage
// ---------------------------------------------------------------------------

/// Failures of the knowledge retrieval stage. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResearchError {
    #[error("no article found for '{topic}'")]
    NotFound { topic: String },

    #[error("'{topic}' is ambiguous; candidates: {}", candidates.join(", "))]
    AmbiguousTopic {
        topic: String,
        candidates: Vec<String>,
    },

    #[error("knowledge source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Transport-level failure reported by a [`crate::KnowledgeSource`] client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl From<SourceError> for ResearchError {
    fn from(e: SourceError) -> Self {
        Self::SourceUnavailable(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Synthesis stage
// ---------------------------------------------------------------------------

/// A single failed call to a generative backend.
///
/// These are handled inside the provider pool and only ever reach the caller
/// as part of [`SynthesisError::AllProvidersExhausted`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Credentials rejected. The provider is disabled for the rest of the process.
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    /// The call (or the wait for a concurrency slot) exceeded its timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("transient failure: {0}")]
    Transient(String),
}

impl ProviderError {
    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::RateLimit(_) => "rate_limit",
            Self::Timeout(_) => "timeout",
            Self::Transient(_) => "transient",
        }
    }

    /// Whether the same provider may be retried after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit(_) | Self::Transient(_))
    }
}

/// The last failure recorded for one provider during a generate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

/// Terminal failures of the synthesis stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("all providers exhausted after {attempts} attempts [{}]", format_failures(failures))]
    AllProvidersExhausted {
        attempts: u32,
        failures: Vec<ProviderFailure>,
    },
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no usable providers".to_string();
    }
    failures
        .iter()
        .map(ProviderFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Validation stage
// ---------------------------------------------------------------------------

/// Fatal validation failures. A word-count shortfall is not an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed output: {reason}")]
    MalformedOutput { reason: String },
}
