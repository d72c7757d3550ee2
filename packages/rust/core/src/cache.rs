//! In-memory TTL cache of research outcomes.
//!
//! Entries are keyed by (case-folded topic, language). Successful lookups
//! live for the positive TTL; not-found and ambiguous outcomes live for the
//! shorter negative TTL. Source outages are never stored.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use articlegen_shared::{ResearchContext, ResearchError};

/// Cache key: normalized topic plus language edition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    topic: String,
    language: String,
}

impl CacheKey {
    /// `topic` must already be whitespace-normalized; it is case-folded here.
    pub fn new(topic: &str, language: &str) -> Self {
        Self {
            topic: topic.to_lowercase(),
            language: language.to_string(),
        }
    }
}

/// A cached research outcome.
#[derive(Debug, Clone)]
pub enum CachedOutcome {
    Found(Arc<ResearchContext>),
    Missing(ResearchError),
}

#[derive(Debug)]
struct CacheEntry {
    outcome: CachedOutcome,
    expires_at: Instant,
}

/// Concurrent research cache shared by all requests of a process.
#[derive(Debug)]
pub struct ResearchCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    negative_ttl: Duration,
}

impl ResearchCache {
    pub fn new(ttl: Duration, negative_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            negative_ttl,
        }
    }

    /// Return the live entry for `key`, evicting it if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<CachedOutcome> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                return Some(entry.outcome.clone());
            }
        }
        // The read guard must be released before removing from the same shard.
        self.evict(key, now);
        None
    }

    /// Remove `key` if it is still expired at `now`. A concurrent writer may
    /// have replaced it since it was read.
    fn evict(&self, key: &CacheKey, now: Instant) -> bool {
        let evicted = self.entries.remove_if(key, |_, e| e.expires_at <= now).is_some();
        if evicted {
            debug!(?key, "evicted expired research entry");
        }
        evicted
    }

    /// Store a resolved context for the positive TTL.
    pub fn insert_found(&self, key: CacheKey, context: Arc<ResearchContext>) {
        self.entries.insert(
            key,
            CacheEntry {
                outcome: CachedOutcome::Found(context),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Store a not-found or ambiguous outcome for the negative TTL.
    ///
    /// `SourceUnavailable` is transient and is ignored.
    pub fn insert_missing(&self, key: CacheKey, error: ResearchError) {
        if matches!(error, ResearchError::SourceUnavailable(_)) {
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                outcome: CachedOutcome::Missing(error),
                expires_at: Instant::now() + self.negative_ttl,
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
