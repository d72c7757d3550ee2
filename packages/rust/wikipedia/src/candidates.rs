//! Candidate extraction from disambiguation pages.

use std::collections::HashSet;

use scraper::{Html, Selector};

/// Markers MediaWiki editions put in the titles of disambiguation pages.
const DISAMBIGUATION_MARKERS: &[&str] = &["disambiguation", "desambiguação", "desambiguación"];

/// List the article titles a disambiguation page points to, in page order.
///
/// Only the first article link of each `<li>` counts. Namespaced links
/// (`File:`, `Help:`, ...), red links, anchors, and links to other
/// disambiguation pages are skipped.
pub fn extract_candidates(html: &str) -> Vec<String> {
    let doc = Html::parse_fragment(html);
    let (Ok(li_sel), Ok(link_sel)) = (Selector::parse("li"), Selector::parse("a[href][title]"))
    else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for li in doc.select(&li_sel) {
        let Some(title) = li
            .select(&link_sel)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let title = a.value().attr("title")?;
                is_article_link(href, title).then(|| title.trim().to_string())
            })
            .next()
        else {
            continue;
        };

        if seen.insert(title.clone()) {
            candidates.push(title);
        }
    }

    candidates
}

fn is_article_link(href: &str, title: &str) -> bool {
    if !href.starts_with("/wiki/") || title.is_empty() {
        return false;
    }
    if title.contains(':') {
        return false;
    }
    let lower = title.to_lowercase();
    !DISAMBIGUATION_MARKERS.iter().any(|m| lower.contains(m))
}
