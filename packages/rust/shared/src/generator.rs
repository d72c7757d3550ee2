//! The generative provider seam.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;

/// Per-call limits handed to a [`TextGenerator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConstraints {
    /// Output-token budget.
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationConstraints {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            temperature: 0.7,
        }
    }
}

/// A backend that turns a prompt into text.
///
/// Implementations classify their own failures into [`ProviderError`] kinds;
/// retry and fallback decisions are made by the caller.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        constraints: &GenerationConstraints,
    ) -> Result<String, ProviderError>;
}

/// One configured backend, ready to be placed in a provider pool.
#[derive(Clone)]
pub struct ProviderEntry {
    /// Display name, unique within a pool.
    pub name: String,
    /// Model identifier reported in article metadata.
    pub model: String,
    /// Simultaneous in-flight calls allowed.
    pub max_concurrency: usize,
    /// Timeout of one call, including the wait for a concurrency slot.
    pub timeout: Duration,
    pub generator: Arc<dyn TextGenerator>,
}

impl ProviderEntry {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            max_concurrency: 4,
            timeout: Duration::from_secs(60),
            generator,
        }
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("max_concurrency", &self.max_concurrency)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
