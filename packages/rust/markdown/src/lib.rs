//! Text extraction and Markdown helpers.
//!
//! Turns encyclopedia HTML (or wiki plain text) into research text with
//! Markdown-style section headings, and provides the word counting, heading
//! parsing, and truncation helpers shared by research and validation.

mod cleanup;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure to convert a source body to text.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("htmd conversion failed: {0}")]
    Html(String),
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Elements that never carry article prose.
const NOISE_SELECTORS: &[&str] = &[
    ".mw-editsection",
    "sup.reference",
    ".reference",
    ".mw-references-wrap",
    "table",
    ".infobox",
    ".navbox",
    ".metadata",
    ".hatnote",
    ".thumb",
    "figure",
    "script",
    "style",
];

/// Convert an HTML article body to plain text with `##` section headings.
///
/// Reference markers, edit links, tables, infoboxes, navigation boxes,
/// figures, scripts, and styles are dropped before conversion.
#[instrument(skip_all, fields(html_len = html.len()))]
pub fn html_to_text(html: &str) -> Result<String, ConvertError> {
    let stripped = strip_noise(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "iframe", "noscript", "svg", "table", "figure", "img",
        ])
        .build();

    let raw_markdown = converter
        .convert(&stripped)
        .map_err(|e| ConvertError::Html(e.to_string()))?;

    debug!(raw_len = raw_markdown.len(), "htmd conversion complete");

    Ok(cleanup::run_pipeline(&raw_markdown))
}

/// Normalize wiki plain text (`== Section ==` headings) to the same shape
/// [`html_to_text`] produces.
pub fn plain_to_text(text: &str) -> String {
    static WIKI_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^(={2,6})\s*(.+?)\s*={2,6}[ \t]*$").expect("valid regex")
    });

    let text = text.replace("\r\n", "\n");
    let converted = WIKI_HEADING_RE.replace_all(&text, |caps: &regex::Captures| {
        format!("{} {}", "#".repeat(caps[1].len()), &caps[2])
    });

    cleanup::run_pipeline(&converted)
}

/// Remove noise elements from an HTML fragment.
///
/// The fragment is re-serialized first so every matched element's HTML is a
/// literal substring of the document being edited.
fn strip_noise(html: &str) -> String {
    let doc = Html::parse_fragment(html);
    let mut result = doc.root_element().inner_html();

    for sel_str in NOISE_SELECTORS {
        let Ok(selector) = Selector::parse(sel_str) else {
            continue;
        };
        for el in doc.select(&selector) {
            result = result.replacen(&el.html(), "", 1);
        }
    }

    result
}

// ---------------------------------------------------------------------------
// Markdown helpers
// ---------------------------------------------------------------------------

/// Parse an ATX heading line into `(level, text)`.
///
/// A heading is one to six `#` followed by a space. `#hashtag` is not a heading.
pub fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    let text = rest.trim();
    // Optional closing sequence, as in `## Title ##`.
    let without_closing = text.trim_end_matches('#');
    if without_closing.is_empty() || without_closing.ends_with(char::is_whitespace) {
        return Some((level, without_closing.trim_end()));
    }
    Some((level, text))
}

/// Count whitespace-separated words, headings included, heading markers excluded.
pub fn count_words(md: &str) -> usize {
    md.lines()
        .map(|line| match parse_heading(line) {
            Some((_, text)) => text.split_whitespace().count(),
            None => line.split_whitespace().count(),
        })
        .sum()
}

/// Strip a single code fence wrapping the whole text (```` ```markdown ````,
/// ```` ```md ```` or a bare ```` ``` ````). Inner fences are left alone.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some((info, body)) = rest.split_once('\n') else {
        return trimmed;
    };
    let info = info.trim().to_ascii_lowercase();
    if !matches!(info.as_str(), "" | "markdown" | "md") {
        return trimmed;
    }
    match body.trim_end().strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
///
/// Returns the (possibly) shortened text and whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        None => (text.to_string(), false),
        Some((byte_idx, _)) => (text[..byte_idx].trim_end().to_string(), true),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
