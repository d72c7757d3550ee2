//! End-to-end article pipeline: topic → research → synthesis → validation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use articlegen_shared::{
    AppConfig, ArticleRequest, ArticleResult, GenerationConfig, GenerationConstraints,
    GenerationMetadata, KnowledgeSource, ProviderEntry, RequestId, ResearchConfig,
    ResearchContext, Result, Style,
};

use crate::generation::ProviderPool;
use crate::prompt::{repair_prompt, synthesis_prompt};
use crate::research::Researcher;
use crate::retry::RetryPolicy;
use crate::validator::{ParsedArticle, Validation, validate};

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    Researching,
    Researched,
    Synthesizing,
    Synthesized,
    Validating,
    Repairing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Researching => "researching",
            Self::Researched => "researched",
            Self::Synthesizing => "synthesizing",
            Self::Synthesized => "synthesized",
            Self::Validating => "validating",
            Self::Repairing => "repairing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Researching)
                | (Researching, Researched | Failed)
                | (Researched, Synthesizing)
                | (Synthesizing, Synthesized | Failed)
                | (Synthesized, Validating)
                | (Validating, Repairing | Done | Failed)
                | (Repairing, Synthesizing)
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Receives pipeline progress, e.g. to drive a spinner.
pub trait PipelineObserver: Send + Sync {
    /// Called on every state transition.
    fn state_changed(&self, request_id: &RequestId, from: PipelineState, to: PipelineState);

    /// Called after each draft passes structural validation. `round` is 0
    /// for the first draft and counts repairs after that.
    fn draft_validated(&self, _round: u32, _word_count: usize, _min_words: usize) {}
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {
    fn state_changed(&self, _request_id: &RequestId, _from: PipelineState, _to: PipelineState) {}
}

/// Per-request state tracker.
struct Run<'a> {
    request_id: RequestId,
    state: PipelineState,
    observer: &'a dyn PipelineObserver,
}

impl<'a> Run<'a> {
    fn new(observer: &'a dyn PipelineObserver) -> Self {
        Self {
            request_id: RequestId::new(),
            state: PipelineState::Idle,
            observer,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal pipeline transition {} -> {}",
            self.state,
            next
        );
        debug!(request_id = %self.request_id, from = %self.state, to = %next, "pipeline transition");
        self.observer.state_changed(&self.request_id, self.state, next);
        self.state = next;
    }
}

/// The draft kept so far, with the provider that wrote it.
struct Draft {
    article: ParsedArticle,
    provider: String,
    model: String,
}

// ---------------------------------------------------------------------------
// ArticleGenerator
// ---------------------------------------------------------------------------

/// Owns the research stage and the provider pool; safe to share between
/// concurrent requests.
pub struct ArticleGenerator {
    researcher: Researcher,
    pool: ProviderPool,
    generation: GenerationConfig,
    observer: Arc<dyn PipelineObserver>,
}

impl ArticleGenerator {
    /// `providers` must already be in priority order.
    pub fn new(
        source: Arc<dyn KnowledgeSource>,
        providers: Vec<ProviderEntry>,
        config: &AppConfig,
    ) -> Result<Self> {
        let generation = GenerationConfig::from(config);
        let pool = ProviderPool::new(providers, RetryPolicy::from(&generation))?;

        Ok(Self {
            researcher: Researcher::new(source, ResearchConfig::from(config)),
            pool,
            generation,
            observer: Arc::new(SilentObserver),
        })
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn researcher(&self) -> &Researcher {
        &self.researcher
    }

    pub fn pool(&self) -> &ProviderPool {
        &self.pool
    }

    /// Validate the arguments into a request and run it.
    pub async fn generate_article(
        &self,
        topic: &str,
        language: &str,
        min_words: usize,
        style: Style,
    ) -> Result<ArticleResult> {
        let request = ArticleRequest::new(topic, language, min_words, style)?;
        self.run(&request).await
    }

    /// Run only the research stage.
    pub async fn research(&self, topic: &str, language: &str) -> Result<Arc<ResearchContext>> {
        Ok(self.researcher.fetch(topic, language).await?)
    }

    /// Run the full pipeline for one request.
    #[instrument(skip_all, fields(topic = %request.topic(), language = %request.language(), min_words = request.min_words()))]
    pub async fn run(&self, request: &ArticleRequest) -> Result<ArticleResult> {
        let mut run = Run::new(self.observer.as_ref());
        info!(request_id = %run.request_id, style = %request.style(), "starting article pipeline");

        run.advance(PipelineState::Researching);
        let research = match self.researcher.fetch(request.topic(), request.language()).await {
            Ok(research) => research,
            Err(error) => {
                run.advance(PipelineState::Failed);
                return Err(error.into());
            }
        };
        run.advance(PipelineState::Researched);

        let outcome = self.synthesize(&mut run, request, &research).await;
        match &outcome {
            Ok(result) => {
                run.advance(PipelineState::Done);
                info!(
                    request_id = %run.request_id,
                    provider = %result.metadata.provider,
                    words = result.word_count,
                    shortfall = result.shortfall,
                    repairs = result.metadata.repair_attempts,
                    "article generated"
                );
            }
            Err(error) => {
                run.advance(PipelineState::Failed);
                warn!(request_id = %run.request_id, %error, "article pipeline failed");
            }
        }
        outcome
    }

    /// Synthesis, validation and the bounded repair loop. Leaves `run` in
    /// `Validating` on success and in `Synthesizing` or `Validating` on error.
    async fn synthesize(
        &self,
        run: &mut Run<'_>,
        request: &ArticleRequest,
        research: &ResearchContext,
    ) -> Result<ArticleResult> {
        let constraints = GenerationConstraints {
            max_tokens: self.generation.max_output_tokens,
            temperature: self.generation.temperature,
        };
        let min_words = request.min_words();

        let mut prompt = synthesis_prompt(request, research);
        let mut best: Option<Draft> = None;
        let mut attempts = 0;
        let mut repairs = 0;

        loop {
            run.advance(PipelineState::Synthesizing);
            let generation = self.pool.generate(&prompt, &constraints).await?;
            attempts += generation.attempts;
            run.advance(PipelineState::Synthesized);

            run.advance(PipelineState::Validating);
            let validation = match validate(&generation.text, min_words) {
                Ok(validation) => validation,
                Err(error) => match best.take() {
                    // A broken repair round does not discard an earlier usable draft.
                    Some(draft) => {
                        warn!(round = repairs, %error, "repair draft malformed, keeping earlier draft");
                        return Ok(self.finish(run, request, research, draft, attempts, repairs));
                    }
                    None => return Err(error.into()),
                },
            };
            self.observer
                .draft_validated(repairs, validation.article().word_count, min_words);

            let draft_of = |article| Draft {
                article,
                provider: generation.provider.clone(),
                model: generation.model.clone(),
            };

            match validation {
                Validation::Complete(article) => {
                    return Ok(self.finish(run, request, research, draft_of(article), attempts, repairs));
                }
                Validation::Shortfall { article, deficit } => {
                    info!(round = repairs, words = article.word_count, deficit, "draft under minimum");

                    let next_prompt = (repairs < self.generation.max_repairs).then(|| {
                        repair_prompt(request, research, &article.content, article.word_count)
                    });
                    let draft = match best.take() {
                        Some(kept) if kept.article.word_count >= article.word_count => kept,
                        _ => draft_of(article),
                    };

                    let Some(next_prompt) = next_prompt else {
                        return Ok(self.finish(run, request, research, draft, attempts, repairs));
                    };
                    best = Some(draft);
                    prompt = next_prompt;
                    repairs += 1;
                    run.advance(PipelineState::Repairing);
                }
            }
        }
    }

    fn finish(
        &self,
        run: &Run<'_>,
        request: &ArticleRequest,
        research: &ResearchContext,
        draft: Draft,
        synthesis_attempts: u32,
        repair_attempts: u32,
    ) -> ArticleResult {
        let word_deficit = request.min_words().saturating_sub(draft.article.word_count);

        ArticleResult {
            title: draft.article.title,
            content: draft.article.content,
            word_count: draft.article.word_count,
            sources: research.sources.clone(),
            shortfall: word_deficit > 0,
            word_deficit,
            metadata: GenerationMetadata {
                request_id: run.request_id.clone(),
                provider: draft.provider,
                model: draft.model,
                generated_at: Utc::now(),
                style: request.style(),
                topic: request.topic().to_string(),
                language: request.language().to_string(),
                research_status: research.status,
                research_truncated: research.truncated,
                synthesis_attempts,
                repair_attempts,
            },
        }
    }
}
