//! Generative backends for articlegen.
//!
//! This crate provides:
//! - [`GeminiClient`]: Google Gemini `generateContent`
//! - [`OpenAiCompatibleClient`]: OpenAI-style chat completions (Groq, OpenRouter, OpenAI)
//! - [`resolve_providers`]: builds the prioritized provider list from config and env

pub mod gemini;
pub mod openai;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use articlegen_shared::{
    AppConfig, ArticleGenError, ProviderConfig, ProviderEntry, ProviderKind, Result,
    TextGenerator,
};

pub use gemini::{GEMINI_API_BASE, GeminiClient};
pub use openai::{OPENAI_API_BASE, OpenAiCompatibleClient};
pub use status::{classify_status, classify_transport};

/// User-Agent string for provider requests.
pub(crate) const USER_AGENT: &str = concat!("ArticleGen/", env!("CARGO_PKG_VERSION"));

/// Build the enabled providers in priority order.
///
/// `env` looks up environment variables by name. Providers whose key is
/// missing or blank are skipped with a warning; ending up with none is a
/// config error.
pub fn resolve_providers<F>(config: &AppConfig, env: F) -> Result<Vec<ProviderEntry>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut entries = Vec::new();

    for provider in config.providers_by_priority() {
        let Some(api_key) = env(&provider.api_key_env).filter(|k| !k.trim().is_empty()) else {
            warn!(
                provider = %provider.name,
                env = %provider.api_key_env,
                "API key not set, skipping provider"
            );
            continue;
        };

        entries.push(build_entry(provider, api_key)?);
    }

    if entries.is_empty() {
        let names: Vec<&str> = config
            .providers_by_priority()
            .iter()
            .map(|p| p.api_key_env.as_str())
            .collect();
        return Err(ArticleGenError::config(format!(
            "no usable providers: set one of {}",
            names.join(", ")
        )));
    }

    info!(
        providers = ?entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        "providers resolved"
    );
    Ok(entries)
}

/// [`resolve_providers`] against the process environment.
pub fn resolve_providers_from_env(config: &AppConfig) -> Result<Vec<ProviderEntry>> {
    resolve_providers(config, |name| std::env::var(name).ok())
}

fn build_entry(provider: &ProviderConfig, api_key: String) -> Result<ProviderEntry> {
    let timeout = Duration::from_secs(provider.timeout_secs);
    let base_url = provider.base_url.as_deref();

    let generator: Arc<dyn TextGenerator> = match provider.kind {
        ProviderKind::Gemini => Arc::new(GeminiClient::new(
            api_key,
            provider.model.clone(),
            base_url,
            timeout,
        )?),
        ProviderKind::OpenaiCompatible => Arc::new(OpenAiCompatibleClient::new(
            api_key,
            provider.model.clone(),
            base_url,
            timeout,
        )?),
    };

    Ok(
        ProviderEntry::new(provider.name.clone(), provider.model.clone(), generator)
            .with_max_concurrency(provider.max_concurrency)
            .with_timeout(timeout),
    )
}
