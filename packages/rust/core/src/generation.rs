//! Prioritized provider pool with retry and fallback.
//!
//! Providers are tried in order. Rate limits and transient failures are
//! retried on the same provider with backoff; timeouts fall through to the
//! next provider at once; an authentication failure disables the provider
//! for the rest of the process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, warn};

use articlegen_shared::{
    ArticleGenError, GenerationConstraints, ProviderEntry, ProviderError, ProviderFailure, Result,
    SynthesisError,
};

use crate::retry::{RetryPolicy, execute_with_retry};

/// Text produced by one successful provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    /// Name of the provider that produced `text`.
    pub provider: String,
    pub model: String,
    /// Provider calls made for this generation, across all providers.
    pub attempts: u32,
}

struct PoolSlot {
    entry: ProviderEntry,
    permits: Arc<Semaphore>,
    disabled: AtomicBool,
    calls: AtomicU32,
}

/// Immutable, shareable set of providers.
pub struct ProviderPool {
    slots: Vec<PoolSlot>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ProviderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderPool")
            .field("providers", &self.provider_names())
            .field("retry", &self.retry)
            .finish()
    }
}

impl ProviderPool {
    /// Build a pool from providers already sorted by priority.
    pub fn new(entries: Vec<ProviderEntry>, retry: RetryPolicy) -> Result<Self> {
        if entries.is_empty() {
            return Err(ArticleGenError::config("provider pool needs at least one provider"));
        }

        let slots = entries
            .into_iter()
            .map(|entry| PoolSlot {
                permits: Arc::new(Semaphore::new(entry.max_concurrency.max(1))),
                entry,
                disabled: AtomicBool::new(false),
                calls: AtomicU32::new(0),
            })
            .collect();

        Ok(Self { slots, retry })
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.entry.name.as_str()).collect()
    }

    /// Whether `name` was disabled by an authentication failure.
    pub fn is_disabled(&self, name: &str) -> bool {
        self.slots
            .iter()
            .any(|s| s.entry.name == name && s.disabled.load(Ordering::Acquire))
    }

    /// Total calls made to `name` since the pool was built.
    pub fn call_count(&self, name: &str) -> u32 {
        self.slots
            .iter()
            .find(|s| s.entry.name == name)
            .map_or(0, |s| s.calls.load(Ordering::Relaxed))
    }

    /// Generate text with the first provider that succeeds.
    #[instrument(skip_all, fields(prompt_len = prompt.len()))]
    pub async fn generate(
        &self,
        prompt: &str,
        constraints: &GenerationConstraints,
    ) -> std::result::Result<Generation, SynthesisError> {
        let mut attempts = 0;
        let mut failures = Vec::new();

        for slot in &self.slots {
            let name = &slot.entry.name;

            if slot.disabled.load(Ordering::Acquire) {
                debug!(provider = %name, "skipping disabled provider");
                failures.push(ProviderFailure {
                    provider: name.clone(),
                    error: ProviderError::Auth("disabled after an earlier authentication failure".into()),
                });
                continue;
            }

            let (result, used) = execute_with_retry(&self.retry, ProviderError::is_retryable, || {
                self.attempt(slot, prompt, constraints)
            })
            .await;
            attempts += used;

            match result {
                Ok(text) => {
                    info!(provider = %name, attempts, "generation succeeded");
                    return Ok(Generation {
                        text,
                        provider: name.clone(),
                        model: slot.entry.model.clone(),
                        attempts,
                    });
                }
                Err(error) => {
                    if matches!(error, ProviderError::Auth(_)) {
                        slot.disabled.store(true, Ordering::Release);
                        warn!(provider = %name, %error, "authentication rejected; provider disabled");
                    } else {
                        warn!(provider = %name, kind = error.kind(), %error, "provider failed; falling back");
                    }
                    failures.push(ProviderFailure {
                        provider: name.clone(),
                        error,
                    });
                }
            }
        }

        Err(SynthesisError::AllProvidersExhausted { attempts, failures })
    }

    /// One call to one provider. The concurrency permit is held only for the
    /// duration of the call, so it is released before any backoff sleep.
    async fn attempt(
        &self,
        slot: &PoolSlot,
        prompt: &str,
        constraints: &GenerationConstraints,
    ) -> std::result::Result<String, ProviderError> {
        let limit = slot.entry.timeout;
        let deadline = Instant::now() + limit;

        let _permit = timeout_at(deadline, slot.permits.acquire())
            .await
            .map_err(|_| ProviderError::Timeout(format!("no concurrency slot within {limit:?}")))?
            .map_err(|_| ProviderError::Transient("provider pool closed".into()))?;

        slot.calls.fetch_add(1, Ordering::Relaxed);
        timeout_at(deadline, slot.entry.generator.complete(prompt, constraints))
            .await
            .map_err(|_| ProviderError::Timeout(format!("no response within {limit:?}")))?
    }
}
