//! End-to-end pipeline behavior against in-memory collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use articlegen_core::{ArticleGenerator, PipelineObserver, PipelineState};
use articlegen_shared::{
    AppConfig, ArticleGenError, ArticleRequest, GenerationConstraints, KnowledgeSource, Markup,
    ProviderEntry, ProviderError, RequestId, ResearchError, ResolutionStatus, SourceArticle,
    SourceError, SourceLookup, Stage, Style, SynthesisError, TextGenerator, ValidationError,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeSource {
    pages: HashMap<String, SourceLookup>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn with(mut self, title: &str, lookup: SourceLookup) -> Self {
        self.pages.insert(title.to_string(), lookup);
        self
    }

    fn with_article(self, title: &str, body: &str) -> Self {
        let lookup = SourceLookup::Article(SourceArticle {
            title: title.into(),
            body: body.into(),
            markup: Markup::PlainText,
            sources: vec![format!(
                "https://en.wikipedia.org/wiki/{}",
                title.replace(' ', "_")
            )],
            redirected_from: None,
        });
        self.with(title, lookup)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeSource for FakeSource {
    async fn search(&self, topic: &str, _language: &str) -> Result<SourceLookup, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.get(topic).cloned().unwrap_or(SourceLookup::NotFound))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Replays scripted outcomes, then repeats the last one.
struct Scripted {
    outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(outcomes: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    fn texts(texts: &[String]) -> Arc<Self> {
        Self::new(texts.iter().cloned().map(Ok).collect())
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(vec![Ok(article_text(400))].into()),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    async fn complete(
        &self,
        _prompt: &str,
        _constraints: &GenerationConstraints,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.len() > 1 {
            outcomes.pop_front().unwrap()
        } else {
            outcomes.front().cloned().unwrap()
        }
    }
}

#[derive(Default)]
struct Recorder {
    transitions: Mutex<Vec<(PipelineState, PipelineState)>>,
    drafts: Mutex<Vec<(u32, usize)>>,
}

impl Recorder {
    fn states(&self) -> Vec<PipelineState> {
        let transitions = self.transitions.lock().unwrap();
        let mut states = vec![PipelineState::Idle];
        states.extend(transitions.iter().map(|&(_, to)| to));
        states
    }
}

impl PipelineObserver for Recorder {
    fn state_changed(&self, _request_id: &RequestId, from: PipelineState, to: PipelineState) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn draft_validated(&self, round: u32, word_count: usize, _min_words: usize) {
        self.drafts.lock().unwrap().push((round, word_count));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const TOPIC: &str = "Quantum Computing";

/// A well-formed article with one section; see [`words`] for its length.
fn article_text(filler: usize) -> String {
    format!(
        "# Quantum Computing\n\n{}\n\n## History\n\n{}",
        vec!["qubit"; filler / 2].join(" "),
        vec!["gate"; filler - filler / 2].join(" ")
    )
}

/// Words in `article_text(filler)`: title, section heading, filler.
fn words(filler: usize) -> usize {
    2 + 1 + filler
}

fn source() -> Arc<FakeSource> {
    Arc::new(FakeSource::default().with_article(
        TOPIC,
        "Quantum computing uses qubits.\n\n== History ==\nIt began in the 1980s.",
    ))
}

fn entry(name: &str, generator: Arc<dyn TextGenerator>) -> ProviderEntry {
    ProviderEntry::new(name, format!("{name}-model"), generator)
}

fn generator(source: Arc<FakeSource>, providers: Vec<ProviderEntry>) -> ArticleGenerator {
    ArticleGenerator::new(source, providers, &AppConfig::default()).unwrap()
}

fn request(min_words: usize) -> ArticleRequest {
    ArticleRequest::new(TOPIC, "en", min_words, Style::Informative).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn direct_topic_produces_complete_article() {
    let writer = Scripted::texts(&[article_text(400)]);
    let pipeline = generator(source(), vec![entry("a", writer.clone())]);

    let result = pipeline.run(&request(300)).await.unwrap();

    assert_eq!(result.title, "Quantum Computing");
    assert!(result.content.starts_with("# Quantum Computing\n\n"));
    assert_eq!(result.word_count, words(400));
    assert!(result.word_count >= 300);
    assert!(!result.shortfall);
    assert_eq!(result.word_deficit, 0);
    assert_eq!(result.sources, vec!["https://en.wikipedia.org/wiki/Quantum_Computing"]);

    let meta = &result.metadata;
    assert_eq!(meta.provider, "a");
    assert_eq!(meta.model, "a-model");
    assert_eq!(meta.research_status, ResolutionStatus::Direct);
    assert_eq!(meta.synthesis_attempts, 1);
    assert_eq!(meta.repair_attempts, 0);
    assert_eq!(meta.topic, TOPIC);
    assert_eq!(meta.language, "en");
    assert_eq!(writer.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn observer_sees_every_transition() {
    let recorder = Arc::new(Recorder::default());
    let writer = Scripted::texts(&[article_text(10), article_text(400)]);
    let pipeline =
        generator(source(), vec![entry("a", writer)]).with_observer(recorder.clone());

    pipeline.run(&request(300)).await.unwrap();

    use PipelineState::*;
    let states = recorder.states();
    assert_eq!(
        states,
        vec![
            Idle, Researching, Researched, Synthesizing, Synthesized, Validating, Repairing,
            Synthesizing, Synthesized, Validating, Done,
        ]
    );
    assert!(states.windows(2).all(|w| w[0].can_transition_to(w[1])));
    assert_eq!(
        *recorder.drafts.lock().unwrap(),
        vec![(0, words(10)), (1, words(400))]
    );
}

#[tokio::test(start_paused = true)]
async fn repair_reaches_minimum() {
    let writer = Scripted::texts(&[article_text(100), article_text(350)]);
    let pipeline = generator(source(), vec![entry("a", writer.clone())]);

    let result = pipeline.run(&request(300)).await.unwrap();

    assert!(!result.shortfall);
    assert_eq!(result.word_count, words(350));
    assert_eq!(result.metadata.repair_attempts, 1);
    assert_eq!(result.metadata.synthesis_attempts, 2);
    assert_eq!(writer.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_repairs_flag_shortfall_with_longest_draft() {
    let writer = Scripted::texts(&[article_text(120), article_text(40), article_text(80)]);
    let pipeline = generator(source(), vec![entry("a", writer.clone())]);

    let result = pipeline.run(&request(300)).await.unwrap();

    assert!(result.shortfall);
    assert_eq!(result.word_count, words(120));
    assert_eq!(result.word_deficit, 300 - words(120));
    assert_eq!(result.metadata.repair_attempts, 2);
    assert_eq!(result.metadata.synthesis_attempts, 3);
    assert_eq!(writer.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn malformed_repair_keeps_earlier_draft() {
    let writer = Scripted::texts(&[article_text(50), "# Quantum Computing".to_string()]);
    let pipeline = generator(source(), vec![entry("a", writer)]);

    let result = pipeline.run(&request(300)).await.unwrap();

    assert!(result.shortfall);
    assert_eq!(result.word_count, words(50));
    assert_eq!(result.metadata.repair_attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_requests_share_cached_research() {
    let source = source();
    let pipeline = generator(
        source.clone(),
        vec![entry("a", Scripted::texts(&[article_text(400)]))],
    );

    let first = pipeline.research(TOPIC, "en").await.unwrap();
    pipeline.run(&request(300)).await.unwrap();
    pipeline.run(&request(300)).await.unwrap();
    let second = pipeline.research(TOPIC, "en").await.unwrap();

    assert_eq!(first.body, second.body);
    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_provider_falls_back() {
    let slow = Scripted::slow(Duration::from_secs(120));
    let fast = Scripted::texts(&[article_text(400)]);
    let pipeline = generator(
        source(),
        vec![
            entry("a", slow.clone()).with_timeout(Duration::from_secs(5)),
            entry("b", fast),
        ],
    );

    let result = pipeline.run(&request(300)).await.unwrap();

    assert_eq!(result.metadata.provider, "b");
    assert_eq!(result.metadata.synthesis_attempts, 2);
    assert_eq!(slow.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn all_rate_limited_exhausts_providers() {
    let limited = || Scripted::new(vec![Err(ProviderError::RateLimit("429".into()))]);
    let pipeline = generator(source(), vec![entry("a", limited()), entry("b", limited())]);

    let err = pipeline.run(&request(300)).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Synthesis));
    let ArticleGenError::Synthesis(SynthesisError::AllProvidersExhausted { attempts, failures }) =
        &err
    else {
        panic!("expected exhausted providers, got {err}");
    };
    // providers × (1 + max_retries)
    assert_eq!(*attempts, 2 * 3);
    assert_eq!(failures.len(), 2);
    assert_eq!(pipeline.pool().call_count("a"), 3);
    assert_eq!(pipeline.pool().call_count("b"), 3);
}

#[tokio::test(start_paused = true)]
async fn title_only_output_is_malformed_without_repair() {
    let recorder = Arc::new(Recorder::default());
    let writer = Scripted::texts(&["# Quantum Computing\n".to_string()]);
    let pipeline =
        generator(source(), vec![entry("a", writer.clone())]).with_observer(recorder.clone());

    let err = pipeline.run(&request(300)).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Validation));
    assert!(matches!(
        err,
        ArticleGenError::Validation(ValidationError::MalformedOutput { .. })
    ));
    assert_eq!(writer.calls(), 1);
    assert!(!recorder.states().contains(&PipelineState::Repairing));
    assert_eq!(recorder.states().last(), Some(&PipelineState::Failed));
}

#[tokio::test(start_paused = true)]
async fn unknown_topic_fails_before_synthesis() {
    let writer = Scripted::texts(&[article_text(400)]);
    let pipeline = generator(source(), vec![entry("a", writer.clone())]);

    let err = pipeline
        .generate_article("zzz-nonexistent-xyz", "en", 300, Style::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Research));
    assert!(matches!(
        err,
        ArticleGenError::Research(ResearchError::NotFound { .. })
    ));
    assert_eq!(writer.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn ambiguous_topic_without_concrete_candidate() {
    let source = Arc::new(FakeSource::default().with(
        "Mercury",
        SourceLookup::Disambiguation {
            title: "Mercury".into(),
            candidates: vec!["Mercury (a)".into(), "Mercury (b)".into()],
        },
    ));
    let writer = Scripted::texts(&[article_text(400)]);
    let pipeline = generator(source, vec![entry("a", writer.clone())]);

    let err = pipeline
        .generate_article("Mercury", "en", 300, Style::default())
        .await
        .unwrap_err();

    let ArticleGenError::Research(ResearchError::AmbiguousTopic { candidates, .. }) = &err else {
        panic!("expected ambiguous topic, got {err}");
    };
    assert_eq!(*candidates, vec!["Mercury (a)", "Mercury (b)"]);
    assert_eq!(writer.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn ambiguous_topic_with_one_concrete_candidate() {
    let source = Arc::new(
        FakeSource::default()
            .with(
                "Mercury",
                SourceLookup::Disambiguation {
                    title: "Mercury".into(),
                    candidates: vec!["Mercury (a)".into(), "Mercury (planet)".into()],
                },
            )
            .with_article("Mercury (planet)", "Mercury is the smallest planet."),
    );
    let pipeline = generator(source, vec![entry("a", Scripted::texts(&[article_text(400)]))]);

    let context = pipeline.research("Mercury", "en").await.unwrap();
    assert_eq!(context.status, ResolutionStatus::Disambiguated);
    assert_eq!(context.title, "Mercury (planet)");
    assert_eq!(context.body, "Mercury is the smallest planet.");

    let result = pipeline
        .generate_article("Mercury", "en", 300, Style::Journalistic)
        .await
        .unwrap();
    assert_eq!(result.metadata.research_status, ResolutionStatus::Disambiguated);
    assert_eq!(result.sources, vec!["https://en.wikipedia.org/wiki/Mercury_(planet)"]);
}

#[tokio::test(start_paused = true)]
async fn invalid_arguments_are_rejected() {
    let pipeline = generator(source(), vec![entry("a", Scripted::texts(&[article_text(400)]))]);

    let err = pipeline
        .generate_article(TOPIC, "en", 0, Style::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ArticleGenError::InvalidRequest { .. }));
    assert_eq!(err.stage(), None);
}
