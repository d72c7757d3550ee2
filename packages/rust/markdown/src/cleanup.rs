//! Post-conversion cleanup pipeline for research text.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! The result is prose with `##` headings and list markers, free of links,
//! emphasis markers, reference markers, and escapes.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on raw Markdown text.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = md.replace("\r\n", "\n");

    result = strip_images(&result);
    result = unwrap_links(&result);
    result = normalize_bullets(&result);
    result = strip_emphasis(&result);
    result = strip_reference_markers(&result);
    result = unescape(&result);
    result = normalize_headings(&result);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Images and links
// ---------------------------------------------------------------------------

/// Drop `![alt](src)` images entirely.
fn strip_images(md: &str) -> String {
    static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"!\[[^\]]*\]\((?:[^()\s]|\([^()\s]*\))*(?:\s+"[^"]*")?\)"#)
            .expect("valid regex")
    });

    IMAGE_RE.replace_all(md, "").to_string()
}

/// Replace `[text](target "title")` with `text`.
///
/// Targets may contain one level of parentheses, as in `/wiki/Mercury_(planet)`.
fn unwrap_links(md: &str) -> String {
    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"\[([^\]]*)\]\((?:[^()\s]|\([^()\s]*\))*(?:\s+"[^"]*")?\)"#)
            .expect("valid regex")
    });

    LINK_RE.replace_all(md, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Inline markers
// ---------------------------------------------------------------------------

/// Use `-` for bullets so a leading `*` is never mistaken for emphasis.
fn normalize_bullets(md: &str) -> String {
    static BULLET_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)[*+][ \t]+").expect("valid regex"));

    BULLET_RE.replace_all(md, "$1- ").to_string()
}

/// Remove `**strong**`, `__strong__`, `*em*` and `_em_` markers, keeping the text.
fn strip_emphasis(md: &str) -> String {
    static STRONG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\*\*|__)([^\n]+?)(\*\*|__)").expect("valid regex"));
    static STAR_EM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").expect("valid regex"));
    static UNDERSCORE_EM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(^|[^\w\\])_([^_\n]+)_(\W|$)").expect("valid regex"));

    let result = STRONG_RE.replace_all(md, "$2");
    let result = STAR_EM_RE.replace_all(&result, "$1");
    UNDERSCORE_EM_RE
        .replace_all(&result, "$1$2$3")
        .to_string()
}

/// Remove bracketed citation markers such as `[1]`, `[12]` or `[a]`.
fn strip_reference_markers(md: &str) -> String {
    static REF_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\\?\[(?:\d{1,3}|[a-z])\\?\]").expect("valid regex"));

    REF_RE.replace_all(md, "").to_string()
}

/// Undo Markdown backslash escapes.
fn unescape(md: &str) -> String {
    static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\\([\\`*_{}\[\]()#+\-.!|<>~=])").expect("valid regex")
    });

    ESCAPE_RE.replace_all(md, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Headings
// ---------------------------------------------------------------------------

/// Demote H1s to H2; the article title is carried separately.
fn normalize_headings(md: &str) -> String {
    static H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+?)(?:\s+#+)?\s*$").expect("valid regex"));

    md.lines()
        .map(|line| match H_RE.captures(line) {
            Some(caps) if &caps[1] == "#" => format!("## {}", &caps[2]),
            Some(caps) => format!("{} {}", &caps[1], &caps[2]),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 4: Whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace and collapse runs of inner spaces.
fn normalize_whitespace(md: &str) -> String {
    static SPACES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\S)[ \t]{2,}").expect("valid regex"));

    md.lines()
        .map(|line| SPACES_RE.replace_all(line.trim_end(), "$1 ").to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse runs of blank lines into one.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
