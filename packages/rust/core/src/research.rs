//! Research stage: topic → [`ResearchContext`].
//!
//! Drives a [`KnowledgeSource`] through redirects and disambiguation pages,
//! extracts plain text from the winning article, and caches the outcome.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use articlegen_markdown::{html_to_text, plain_to_text, truncate_chars};
use articlegen_shared::{
    DisambiguationPolicy, KnowledgeSource, Markup, ResearchConfig, ResearchContext, ResearchError,
    ResolutionStatus, SourceArticle, SourceError, SourceLookup,
};

use crate::cache::{CacheKey, CachedOutcome, ResearchCache};

/// Collapse runs of whitespace and trim.
pub fn normalize_topic(topic: &str) -> String {
    topic.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves topics against one knowledge source, with caching.
pub struct Researcher {
    source: Arc<dyn KnowledgeSource>,
    config: ResearchConfig,
    cache: ResearchCache,
}

impl std::fmt::Debug for Researcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Researcher")
            .field("source", &self.source.name())
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl Researcher {
    pub fn new(source: Arc<dyn KnowledgeSource>, config: ResearchConfig) -> Self {
        let cache = ResearchCache::new(config.cache_ttl, config.negative_cache_ttl);
        Self {
            source,
            config,
            cache,
        }
    }

    pub fn cache(&self) -> &ResearchCache {
        &self.cache
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Resolve `topic` in the `language` edition.
    ///
    /// Cached outcomes are returned without touching the source.
    #[instrument(skip_all, fields(topic = %topic, language = %language, source = self.source.name()))]
    pub async fn fetch(
        &self,
        topic: &str,
        language: &str,
    ) -> Result<Arc<ResearchContext>, ResearchError> {
        let topic = normalize_topic(topic);
        if topic.is_empty() {
            return Err(ResearchError::NotFound { topic });
        }

        let key = CacheKey::new(&topic, language);
        match self.cache.get(&key) {
            Some(CachedOutcome::Found(context)) => {
                debug!(title = %context.title, "research cache hit");
                return Ok(context);
            }
            Some(CachedOutcome::Missing(error)) => {
                debug!(%error, "negative research cache hit");
                return Err(error);
            }
            None => {}
        }

        let outcome = self.resolve(&topic, language).await;
        match &outcome {
            Ok(context) => {
                info!(
                    title = %context.title,
                    status = %context.status,
                    chars = context.body.chars().count(),
                    truncated = context.truncated,
                    "research complete"
                );
                self.cache.insert_found(key, Arc::clone(context));
            }
            Err(error) => {
                warn!(%error, "research failed");
                self.cache.insert_missing(key, error.clone());
            }
        }
        outcome
    }

    async fn resolve(
        &self,
        topic: &str,
        language: &str,
    ) -> Result<Arc<ResearchContext>, ResearchError> {
        let (lookup, redirected) = self.follow(topic, language).await?;

        match lookup {
            SourceLookup::Article(article) => {
                let status = if redirected || article.redirected_from.is_some() {
                    ResolutionStatus::Redirected
                } else {
                    ResolutionStatus::Direct
                };
                self.build(topic, article, status, language)
            }
            SourceLookup::Disambiguation { title, candidates } => {
                self.disambiguate(topic, &title, candidates, language).await
            }
            SourceLookup::Redirect { .. } | SourceLookup::NotFound => Err(ResearchError::NotFound {
                topic: topic.to_string(),
            }),
        }
    }

    /// Look up `title`, following at most one redirect. A second redirect
    /// comes back as `NotFound`. The flag tells whether a redirect was taken.
    async fn follow(
        &self,
        title: &str,
        language: &str,
    ) -> Result<(SourceLookup, bool), ResearchError> {
        match self.lookup(title, language).await? {
            SourceLookup::Redirect { target } => {
                debug!(from = title, to = %target, "following redirect");
                match self.lookup(&target, language).await? {
                    SourceLookup::Redirect { target: next } => {
                        warn!(from = %target, to = %next, "redirect chain too long");
                        Ok((SourceLookup::NotFound, true))
                    }
                    other => Ok((other, true)),
                }
            }
            other => Ok((other, false)),
        }
    }

    async fn lookup(&self, title: &str, language: &str) -> Result<SourceLookup, ResearchError> {
        match tokio::time::timeout(self.config.timeout, self.source.search(title, language)).await {
            Ok(result) => result.map_err(ResearchError::from),
            Err(_) => Err(SourceError::Timeout(self.config.timeout).into()),
        }
    }

    async fn disambiguate(
        &self,
        topic: &str,
        page: &str,
        candidates: Vec<String>,
        language: &str,
    ) -> Result<Arc<ResearchContext>, ResearchError> {
        let ambiguous = |candidates: Vec<String>| ResearchError::AmbiguousTopic {
            topic: topic.to_string(),
            candidates,
        };

        if self.config.disambiguation == DisambiguationPolicy::Fail {
            return Err(ambiguous(candidates));
        }

        debug!(%page, count = candidates.len(), "resolving disambiguation page");
        let limit = self.config.max_candidates.unwrap_or(candidates.len());
        for candidate in candidates.iter().take(limit) {
            match self.follow(candidate, language).await? {
                (SourceLookup::Article(article), _) => {
                    match self.build(topic, article, ResolutionStatus::Disambiguated, language) {
                        Ok(context) => {
                            info!(%candidate, "picked disambiguation candidate");
                            return Ok(context);
                        }
                        Err(ResearchError::NotFound { .. }) => {
                            debug!(%candidate, "candidate has no text, skipping");
                        }
                        Err(error) => return Err(error),
                    }
                }
                _ => debug!(%candidate, "candidate is not a concrete article, skipping"),
            }
        }

        Err(ambiguous(candidates))
    }

    fn build(
        &self,
        topic: &str,
        article: SourceArticle,
        status: ResolutionStatus,
        language: &str,
    ) -> Result<Arc<ResearchContext>, ResearchError> {
        let text = match article.markup {
            Markup::Html => html_to_text(&article.body)
                .map_err(|e| ResearchError::SourceUnavailable(e.to_string()))?,
            Markup::PlainText => plain_to_text(&article.body),
        };
        if text.trim().is_empty() {
            return Err(ResearchError::NotFound {
                topic: topic.to_string(),
            });
        }

        let (body, truncated) = truncate_chars(&text, self.config.max_body_chars);
        let content_hash = format!("{:x}", Sha256::digest(body.as_bytes()));

        Ok(Arc::new(ResearchContext {
            title: article.title,
            body,
            sources: article.sources,
            status,
            truncated,
            language: language.to_string(),
            content_hash,
            fetched_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<String, SourceLookup>,
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl FakeSource {
        fn with(mut self, title: &str, lookup: SourceLookup) -> Self {
            self.pages.insert(title.to_string(), lookup);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl KnowledgeSource for FakeSource {
        async fn search(&self, topic: &str, _language: &str) -> Result<SourceLookup, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(SourceError::Transport("connection refused".into()));
            }
            Ok(self.pages.get(topic).cloned().unwrap_or(SourceLookup::NotFound))
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn article(title: &str, body: &str) -> SourceLookup {
        SourceLookup::Article(SourceArticle {
            title: title.into(),
            body: body.into(),
            markup: Markup::PlainText,
            sources: vec![format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_"))],
            redirected_from: None,
        })
    }

    fn redirect(target: &str) -> SourceLookup {
        SourceLookup::Redirect {
            target: target.into(),
        }
    }

    fn disambiguation(title: &str, candidates: &[&str]) -> SourceLookup {
        SourceLookup::Disambiguation {
            title: title.into(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn researcher(source: FakeSource) -> (Researcher, Arc<FakeSource>) {
        researcher_with(source, ResearchConfig::default())
    }

    fn researcher_with(source: FakeSource, config: ResearchConfig) -> (Researcher, Arc<FakeSource>) {
        let source = Arc::new(source);
        (Researcher::new(source.clone(), config), source)
    }

    #[test]
    fn topic_whitespace_is_collapsed() {
        assert_eq!(normalize_topic("  Quantum \t  Computing\n"), "Quantum Computing");
    }

    #[tokio::test]
    async fn direct_hit() {
        let (researcher, _) = researcher(FakeSource::default().with(
            "Quantum Computing",
            article("Quantum computing", "Intro.\n\n== History ==\nEarly work."),
        ));

        let context = researcher.fetch("Quantum Computing", "en").await.unwrap();
        assert_eq!(context.title, "Quantum computing");
        assert_eq!(context.status, ResolutionStatus::Direct);
        assert_eq!(context.sources, vec!["https://en.wikipedia.org/wiki/Quantum_computing"]);
        assert!(context.body.contains("## History"));
        assert!(!context.truncated);
        assert_eq!(context.language, "en");
        assert_eq!(context.content_hash.len(), 64);
    }

    #[tokio::test]
    async fn html_body_is_converted() {
        let lookup = SourceLookup::Article(SourceArticle {
            title: "Rust".into(),
            body: "<p>Rust is a <b>systems</b> language.</p>".into(),
            markup: Markup::Html,
            sources: vec!["https://en.wikipedia.org/wiki/Rust".into()],
            redirected_from: None,
        });
        let (researcher, _) = researcher(FakeSource::default().with("Rust", lookup));

        let context = researcher.fetch("Rust", "en").await.unwrap();
        assert!(context.body.contains("Rust is a systems language."));
        assert!(!context.body.contains('<'));
    }

    #[tokio::test]
    async fn single_redirect_is_followed() {
        let (researcher, source) = researcher(
            FakeSource::default()
                .with("QC", redirect("Quantum computing"))
                .with("Quantum computing", article("Quantum computing", "Body.")),
        );

        let context = researcher.fetch("QC", "en").await.unwrap();
        assert_eq!(context.title, "Quantum computing");
        assert_eq!(context.status, ResolutionStatus::Redirected);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn redirect_resolved_by_source_is_marked() {
        let lookup = SourceLookup::Article(SourceArticle {
            title: "Quantum computing".into(),
            body: "Body.".into(),
            markup: Markup::PlainText,
            sources: vec!["https://en.wikipedia.org/wiki/Quantum_computing".into()],
            redirected_from: Some("QC".into()),
        });
        let (researcher, source) = researcher(FakeSource::default().with("QC", lookup));

        let context = researcher.fetch("QC", "en").await.unwrap();
        assert_eq!(context.title, "Quantum computing");
        assert_eq!(context.status, ResolutionStatus::Redirected);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn double_redirect_is_not_found() {
        let (researcher, source) = researcher(
            FakeSource::default()
                .with("A", redirect("B"))
                .with("B", redirect("C"))
                .with("C", article("C", "Body.")),
        );

        let err = researcher.fetch("A", "en").await.unwrap_err();
        assert_eq!(err, ResearchError::NotFound { topic: "A".into() });
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn disambiguation_picks_first_concrete_candidate() {
        let (researcher, _) = researcher(
            FakeSource::default()
                .with("Mercury", disambiguation("Mercury", &["Mercury (mythology)", "Mercury (planet)", "Mercury (element)"]))
                .with("Mercury (mythology)", disambiguation("Mercury (mythology)", &["Hermes"]))
                .with("Mercury (planet)", article("Mercury (planet)", "The smallest planet.")),
        );

        let context = researcher.fetch("Mercury", "en").await.unwrap();
        assert_eq!(context.title, "Mercury (planet)");
        assert_eq!(context.status, ResolutionStatus::Disambiguated);
        assert_eq!(context.body, "The smallest planet.");
    }

    #[tokio::test]
    async fn every_candidate_is_tried_by_default() {
        let (researcher, source) = researcher(
            FakeSource::default()
                .with("Foo", disambiguation("Foo", &["A", "B", "C", "D"]))
                .with("D", article("D", "The only concrete page.")),
        );

        let context = researcher.fetch("Foo", "en").await.unwrap();
        assert_eq!(context.title, "D");
        assert_eq!(context.status, ResolutionStatus::Disambiguated);
        assert_eq!(source.calls(), 5);
    }

    #[tokio::test]
    async fn disambiguation_without_concrete_candidate_is_ambiguous() {
        let (researcher, source) = researcher(
            FakeSource::default().with("Foo", disambiguation("Foo", &["Foo (a)", "Foo (b)"])),
        );

        let err = researcher.fetch("Foo", "en").await.unwrap_err();
        assert_eq!(
            err,
            ResearchError::AmbiguousTopic {
                topic: "Foo".into(),
                candidates: vec!["Foo (a)".into(), "Foo (b)".into()],
            }
        );
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn only_max_candidates_are_tried() {
        let config = ResearchConfig {
            max_candidates: Some(1),
            ..ResearchConfig::default()
        };
        let (researcher, source) = researcher_with(
            FakeSource::default()
                .with("Foo", disambiguation("Foo", &["Foo (a)", "Foo (b)"]))
                .with("Foo (b)", article("Foo (b)", "Body.")),
            config,
        );

        assert!(matches!(
            researcher.fetch("Foo", "en").await,
            Err(ResearchError::AmbiguousTopic { .. })
        ));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn fail_policy_skips_candidates() {
        let config = ResearchConfig {
            disambiguation: DisambiguationPolicy::Fail,
            ..ResearchConfig::default()
        };
        let (researcher, source) = researcher_with(
            FakeSource::default()
                .with("Foo", disambiguation("Foo", &["Foo (a)"]))
                .with("Foo (a)", article("Foo (a)", "Body.")),
            config,
        );

        assert!(matches!(
            researcher.fetch("Foo", "en").await,
            Err(ResearchError::AmbiguousTopic { .. })
        ));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn repeated_fetch_hits_cache() {
        let (researcher, source) = researcher(
            FakeSource::default().with("Quantum Computing", article("Quantum computing", "Body.")),
        );

        let first = researcher.fetch("Quantum Computing", "en").await.unwrap();
        let second = researcher.fetch("  quantum   computing ", "en").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(), 1);

        // Different language edition is a different key.
        let other = researcher.fetch("Quantum Computing", "pt").await.unwrap();
        assert_eq!(other.language, "pt");
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(source.calls(), 2);
        assert_eq!(researcher.cache().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_fetch_leaves_cache_empty() {
        let (researcher, source) = researcher(
            FakeSource {
                delay: Duration::from_secs(5),
                ..FakeSource::default()
            }
            .with("Rust", article("Rust", "Body.")),
        );

        let cancelled =
            tokio::time::timeout(Duration::from_secs(1), researcher.fetch("Rust", "en")).await;
        assert!(cancelled.is_err());
        assert_eq!(source.calls(), 1);
        assert!(researcher.cache().is_empty());

        // The next request goes back to the source.
        let context = researcher.fetch("Rust", "en").await.unwrap();
        assert_eq!(context.title, "Rust");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn not_found_is_negatively_cached() {
        let (researcher, source) = researcher(FakeSource::default());

        for _ in 0..2 {
            let err = researcher.fetch("zzz-nonexistent-xyz", "en").await.unwrap_err();
            assert!(matches!(err, ResearchError::NotFound { .. }));
        }
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn outages_are_not_cached() {
        let (researcher, source) = researcher(FakeSource {
            fail: true,
            ..FakeSource::default()
        });

        for _ in 0..2 {
            let err = researcher.fetch("Rust", "en").await.unwrap_err();
            assert!(matches!(err, ResearchError::SourceUnavailable(_)));
        }
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out() {
        let (researcher, _) = researcher(FakeSource {
            delay: Duration::from_secs(30),
            ..FakeSource::default()
        });

        let err = researcher.fetch("Rust", "en").await.unwrap_err();
        assert_eq!(
            err,
            ResearchError::SourceUnavailable("timed out after 10s".into())
        );
    }

    #[tokio::test]
    async fn long_body_is_truncated() {
        let config = ResearchConfig {
            max_body_chars: 10,
            ..ResearchConfig::default()
        };
        let (researcher, _) = researcher_with(
            FakeSource::default().with("Rust", article("Rust", "Rust is a systems programming language.")),
            config,
        );

        let context = researcher.fetch("Rust", "en").await.unwrap();
        assert!(context.truncated);
        assert!(context.body.chars().count() <= 10);
    }

    #[tokio::test]
    async fn empty_body_is_not_found() {
        let (researcher, _) = researcher(FakeSource::default().with("Empty", article("Empty", "  \n ")));
        assert!(matches!(
            researcher.fetch("Empty", "en").await,
            Err(ResearchError::NotFound { .. })
        ));
    }
}
