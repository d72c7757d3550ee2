//! Wikipedia knowledge source.
//!
//! This crate provides:
//! - [`WikipediaClient`]: a [`KnowledgeSource`](articlegen_shared::KnowledgeSource)
//!   backed by the MediaWiki Action API
//! - [`extract_candidates`]: candidate titles listed on a disambiguation page

pub mod candidates;
pub mod client;

pub use candidates::extract_candidates;
pub use client::{DEFAULT_ENDPOINT, WikipediaClient};
