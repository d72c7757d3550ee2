//! The knowledge source seam.
//!
//! A [`KnowledgeSource`] answers a single lookup for a topic. It may resolve
//! one redirect itself, marking the article with `redirected_from`, or
//! report it as [`SourceLookup::Redirect`]. Disambiguation pages are never
//! resolved by the source; the research stage drives that.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Format of a [`SourceArticle`] body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Markup {
    Html,
    PlainText,
}

/// One concrete article returned by a knowledge source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceArticle {
    /// Canonical title as reported by the source.
    pub title: String,
    /// Raw body, in `markup` format.
    pub body: String,
    pub markup: Markup,
    /// Canonical URLs of the article.
    pub sources: Vec<String>,
    /// The alias that was looked up, when the source resolved a redirect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirected_from: Option<String>,
}

/// Outcome of a single lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLookup {
    Article(SourceArticle),
    /// The title is an alias; `target` is the title it points to.
    Redirect { target: String },
    /// The title lists several meanings; candidates are in page order.
    Disambiguation {
        title: String,
        candidates: Vec<String>,
    },
    NotFound,
}

/// A read-only encyclopedia-style source.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Look up `topic` in the `language` edition, following at most one
    /// redirect.
    async fn search(&self, topic: &str, language: &str) -> Result<SourceLookup, SourceError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
