//! Shared types, error model, configuration, and collaborator traits for articlegen.
//!
//! This crate is the foundation depended on by all other articlegen crates.
//! It provides:
//! - [`ArticleGenError`]: the unified error type, with per-stage error enums
//! - Domain types ([`ArticleRequest`], [`ResearchContext`], [`ArticleResult`])
//! - Configuration ([`AppConfig`], [`ResearchConfig`], [`GenerationConfig`], config loading)
//! - The collaborator seams ([`KnowledgeSource`], [`TextGenerator`])

pub mod config;
pub mod error;
pub mod generator;
pub mod source;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, DisambiguationPolicy, GenerationConfig, GenerationPoliciesConfig,
    ProviderConfig, ProviderKind, ResearchConfig, ResearchPoliciesConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{
    ArticleGenError, ProviderError, ProviderFailure, ResearchError, Result, SourceError, Stage,
    SynthesisError, ValidationError,
};
pub use generator::{GenerationConstraints, ProviderEntry, TextGenerator};
pub use source::{KnowledgeSource, Markup, SourceArticle, SourceLookup};
pub use types::{
    ArticleRequest, ArticleResult, DEFAULT_LANGUAGE, DEFAULT_MIN_WORDS, GenerationMetadata,
    MAX_MIN_WORDS, MAX_TOPIC_CHARS, MIN_TOPIC_CHARS, RequestId, ResearchContext,
    ResolutionStatus, Style,
};
