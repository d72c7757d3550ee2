//! Turns raw model output into a checked article.
//!
//! The raw text is split into paragraphs at blank lines, with every ATX
//! heading line standing as its own paragraph. A heading that opens the
//! text is the title. A level-1 heading further down is also the title,
//! and chatter before it is dropped. Otherwise the first non-empty line is
//! the title and everything after it is kept.

use tracing::debug;

use articlegen_markdown::{count_words, parse_heading, strip_code_fence};
use articlegen_shared::ValidationError;

/// A parsed, well-formed article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub title: String,
    /// Markdown with the title normalized to `# Title` on the first line.
    pub content: String,
    pub word_count: usize,
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Complete(ParsedArticle),
    /// Well-formed but `deficit` words under the minimum.
    Shortfall {
        article: ParsedArticle,
        deficit: usize,
    },
}

impl Validation {
    pub fn article(&self) -> &ParsedArticle {
        match self {
            Self::Complete(article) | Self::Shortfall { article, .. } => article,
        }
    }

    pub fn into_article(self) -> ParsedArticle {
        match self {
            Self::Complete(article) | Self::Shortfall { article, .. } => article,
        }
    }

    pub fn deficit(&self) -> usize {
        match self {
            Self::Complete(_) => 0,
            Self::Shortfall { deficit, .. } => *deficit,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

#[derive(Debug)]
struct Paragraph {
    text: String,
    heading: bool,
}

fn malformed(reason: impl Into<String>) -> ValidationError {
    ValidationError::MalformedOutput {
        reason: reason.into(),
    }
}

fn flush(current: &mut Vec<&str>, paragraphs: &mut Vec<Paragraph>) {
    if !current.is_empty() {
        paragraphs.push(Paragraph {
            text: current.join("\n"),
            heading: false,
        });
        current.clear();
    }
}

fn split_paragraphs(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            flush(&mut current, &mut paragraphs);
        } else if parse_heading(line).is_some() {
            flush(&mut current, &mut paragraphs);
            paragraphs.push(Paragraph {
                text: line.trim_start().to_string(),
                heading: true,
            });
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut paragraphs);

    paragraphs
}

/// Parse `raw` and check it against `min_words`.
///
/// Returns [`ValidationError::MalformedOutput`] for empty output or output
/// with nothing but a title. A short article is not an error.
pub fn validate(raw: &str, min_words: usize) -> Result<Validation, ValidationError> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = strip_code_fence(&normalized);
    if text.trim().is_empty() {
        return Err(malformed("empty response"));
    }

    let mut paragraphs = split_paragraphs(text);

    let title_heading = paragraphs.iter().position(|p| p.heading).filter(|&index| {
        index == 0 || matches!(parse_heading(&paragraphs[index].text), Some((1, _)))
    });

    let title = match title_heading {
        Some(index) => {
            let mut rest = paragraphs.split_off(index);
            if index > 0 {
                debug!(dropped = index, "dropping preamble before title");
            }
            let heading = rest.remove(0);
            paragraphs = rest;
            parse_heading(&heading.text)
                .map(|(_, text)| text.to_string())
                .unwrap_or_default()
        }
        None => {
            let first = paragraphs.remove(0);
            let (line, remainder) = first.text.split_once('\n').unwrap_or((first.text.as_str(), ""));
            let title = line.trim().to_string();
            if !remainder.trim().is_empty() {
                paragraphs.insert(
                    0,
                    Paragraph {
                        text: remainder.to_string(),
                        heading: false,
                    },
                );
            }
            title
        }
    };

    if title.is_empty() {
        return Err(malformed("empty title"));
    }
    if !paragraphs.iter().any(|p| !p.heading) {
        return Err(malformed("no body paragraphs after the title"));
    }

    let mut content = format!("# {title}");
    for paragraph in &paragraphs {
        content.push_str("\n\n");
        content.push_str(&paragraph.text);
    }

    let word_count = count_words(&content);
    let article = ParsedArticle {
        title,
        content,
        word_count,
    };

    if word_count >= min_words {
        Ok(Validation::Complete(article))
    } else {
        let deficit = min_words - word_count;
        debug!(word_count, min_words, deficit, "article under minimum length");
        Ok(Validation::Shortfall { article, deficit })
    }
}
