//! Pipeline orchestration and domain logic for articlegen.
//!
//! This crate ties research, provider fallback, and output validation into
//! one request lifecycle ([`ArticleGenerator::run`]).

pub mod cache;
pub mod generation;
pub mod pipeline;
pub mod prompt;
pub mod research;
pub mod retry;
pub mod validator;

pub use cache::{CacheKey, CachedOutcome, ResearchCache};
pub use generation::{Generation, ProviderPool};
pub use pipeline::{ArticleGenerator, PipelineObserver, PipelineState, SilentObserver};
pub use prompt::{repair_prompt, synthesis_prompt};
pub use research::{Researcher, normalize_topic};
pub use retry::{RetryPolicy, execute_with_retry};
pub use validator::{ParsedArticle, Validation, validate};
