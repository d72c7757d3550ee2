//! Application configuration for articlegen.
//!
//! User config lives at `~/.articlegen/articlegen.toml`.
//! CLI flags override config file values, which override defaults.
//! The config is loaded once at process start and read-only afterwards.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ArticleGenError, Result};
use crate::types::{DEFAULT_LANGUAGE, DEFAULT_MIN_WORDS, Style};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "articlegen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".articlegen";

// ---------------------------------------------------------------------------
// Config structs (matching articlegen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Request defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Knowledge retrieval policies.
    #[serde(default)]
    pub research: ResearchPoliciesConfig,

    /// Generation, retry, and repair policies.
    #[serde(default)]
    pub generation: GenerationPoliciesConfig,

    /// Generative backends, tried in priority order.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            research: ResearchPoliciesConfig::default(),
            generation: GenerationPoliciesConfig::default(),
            providers: default_providers(),
        }
    }
}

impl AppConfig {
    /// Enabled providers sorted by ascending priority (stable for ties).
    pub fn providers_by_priority(&self) -> Vec<&ProviderConfig> {
        let mut providers: Vec<&ProviderConfig> =
            self.providers.iter().filter(|p| p.enabled).collect();
        providers.sort_by_key(|p| p.priority);
        providers
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Language edition of the knowledge source and of the article.
    #[serde(default = "default_language")]
    pub language: String,

    /// Minimum word count of generated articles.
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Writing style.
    #[serde(default)]
    pub style: Style,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            min_words: default_min_words(),
            style: Style::default(),
        }
    }
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.into()
}
fn default_min_words() -> usize {
    DEFAULT_MIN_WORDS
}

/// What to do when a topic lands on a disambiguation page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisambiguationPolicy {
    /// Use the first listed candidate that resolves to a concrete article.
    #[default]
    PickFirst,
    /// Report the candidates to the caller as an ambiguous topic.
    Fail,
}

/// `[research]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPoliciesConfig {
    /// Knowledge source API endpoint; `{lang}` is replaced by the language tag.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout for the knowledge source.
    #[serde(default = "default_research_timeout")]
    pub timeout_secs: u64,

    /// Maximum extracted body length, in characters.
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,

    /// Lifetime of cached research results.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Lifetime of cached not-found / ambiguous outcomes.
    #[serde(default = "default_negative_cache_ttl")]
    pub negative_cache_ttl_secs: u64,

    #[serde(default)]
    pub disambiguation: DisambiguationPolicy,

    /// Cap on disambiguation candidates tried before giving up. Unset
    /// means every listed candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_candidates: Option<usize>,
}

impl Default for ResearchPoliciesConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_research_timeout(),
            max_body_chars: default_max_body_chars(),
            cache_ttl_secs: default_cache_ttl(),
            negative_cache_ttl_secs: default_negative_cache_ttl(),
            disambiguation: DisambiguationPolicy::default(),
            max_candidates: None,
        }
    }
}

fn default_endpoint() -> String {
    "https://{lang}.wikipedia.org/w/api.php".into()
}
fn default_research_timeout() -> u64 {
    10
}
fn default_max_body_chars() -> usize {
    12_000
}
fn default_cache_ttl() -> u64 {
    3600
}
fn default_negative_cache_ttl() -> u64 {
    300
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationPoliciesConfig {
    /// Retries of the same provider after a rate-limit or transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on every retry.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Re-synthesis rounds allowed after a word-count shortfall.
    #[serde(default = "default_max_repairs")]
    pub max_repairs: u32,

    /// Sampling temperature passed to providers.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Ceiling on the output-token budget of one generation.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for GenerationPoliciesConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            max_repairs: default_max_repairs(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    8_000
}
fn default_max_repairs() -> u32 {
    2
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    8192
}

/// Wire protocol spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Google Gemini `generateContent` API.
    Gemini,
    /// OpenAI-style `/chat/completions` API (OpenAI, Groq, OpenRouter, ...).
    OpenaiCompatible,
}

/// `[[providers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name, unique across providers.
    pub name: String,

    pub kind: ProviderKind,

    /// Model identifier sent to the provider.
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    pub api_key_env: String,

    /// Overrides the provider's default API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Lower values are tried first.
    #[serde(default)]
    pub priority: u32,

    /// Simultaneous in-flight calls allowed across all requests.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout of a single generation call.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_max_concurrency() -> usize {
    4
}
fn default_provider_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

fn default_providers() -> Vec<ProviderConfig> {
    let provider = |name: &str, kind, model: &str, api_key_env: &str, base_url: Option<&str>, priority| {
        ProviderConfig {
            name: name.into(),
            kind,
            model: model.into(),
            api_key_env: api_key_env.into(),
            base_url: base_url.map(String::from),
            priority,
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_provider_timeout(),
            enabled: true,
        }
    };

    vec![
        provider("gemini", ProviderKind::Gemini, "gemini-2.5-flash", "GEMINI_API_KEY", None, 1),
        provider(
            "groq",
            ProviderKind::OpenaiCompatible,
            "llama-3.3-70b-versatile",
            "GROQ_API_KEY",
            Some("https://api.groq.com/openai/v1"),
            2,
        ),
        provider(
            "openrouter",
            ProviderKind::OpenaiCompatible,
            "google/gemini-2.0-flash-exp:free",
            "OPENROUTER_API_KEY",
            Some("https://openrouter.ai/api/v1"),
            3,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Runtime configs (derived from the file config)
// ---------------------------------------------------------------------------

/// Runtime retrieval configuration.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub timeout: Duration,
    pub max_body_chars: usize,
    pub cache_ttl: Duration,
    pub negative_cache_ttl: Duration,
    pub disambiguation: DisambiguationPolicy,
    pub max_candidates: Option<usize>,
}

impl From<&AppConfig> for ResearchConfig {
    fn from(config: &AppConfig) -> Self {
        let research = &config.research;
        Self {
            timeout: Duration::from_secs(research.timeout_secs),
            max_body_chars: research.max_body_chars,
            cache_ttl: Duration::from_secs(research.cache_ttl_secs),
            negative_cache_ttl: Duration::from_secs(research.negative_cache_ttl_secs),
            disambiguation: research.disambiguation,
            max_candidates: research.max_candidates,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Runtime generation configuration.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_repairs: u32,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl From<&AppConfig> for GenerationConfig {
    fn from(config: &AppConfig) -> Self {
        let generation = &config.generation;
        Self {
            max_retries: generation.max_retries,
            initial_backoff: Duration::from_millis(generation.initial_backoff_ms),
            max_backoff: Duration::from_millis(generation.max_backoff_ms),
            max_repairs: generation.max_repairs,
            temperature: generation.temperature,
            max_output_tokens: generation.max_output_tokens,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.articlegen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ArticleGenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.articlegen/articlegen.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ArticleGenError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ArticleGenError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ArticleGenError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ArticleGenError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ArticleGenError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check the invariants the rest of the system relies on.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.providers_by_priority().is_empty() {
        return Err(ArticleGenError::config("no enabled providers configured"));
    }

    let mut names = HashSet::new();
    for provider in &config.providers {
        if provider.name.trim().is_empty() {
            return Err(ArticleGenError::config("provider name must not be empty"));
        }
        if !names.insert(provider.name.as_str()) {
            return Err(ArticleGenError::config(format!(
                "duplicate provider name '{}'",
                provider.name
            )));
        }
        if provider.max_concurrency == 0 {
            return Err(ArticleGenError::config(format!(
                "provider '{}': max_concurrency must be at least 1",
                provider.name
            )));
        }
        if provider.timeout_secs == 0 {
            return Err(ArticleGenError::config(format!(
                "provider '{}': timeout_secs must be at least 1",
                provider.name
            )));
        }
    }

    if config.research.endpoint.trim().is_empty() {
        return Err(ArticleGenError::config("research endpoint must not be empty"));
    }
    if config.research.max_body_chars == 0 {
        return Err(ArticleGenError::config("research.max_body_chars must be positive"));
    }
    if config.research.negative_cache_ttl_secs > config.research.cache_ttl_secs {
        return Err(ArticleGenError::config(
            "research.negative_cache_ttl_secs must not exceed cache_ttl_secs",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_body_chars"));
        assert!(toml_str.contains("GEMINI_API_KEY"));
        assert!(toml_str.contains("openai-compatible"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.min_words, 300);
        assert_eq!(parsed.providers.len(), 3);
        assert_eq!(parsed.research.disambiguation, DisambiguationPolicy::PickFirst);
        assert_eq!(parsed.research.max_candidates, None);
        validate_config(&parsed).expect("defaults are valid");
    }

    #[test]
    fn config_with_custom_providers() {
        let toml_str = r#"
[defaults]
language = "en"

[research]
disambiguation = "fail"
max_candidates = 2

[[providers]]
name = "backup"
kind = "openai-compatible"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
priority = 5

[[providers]]
name = "primary"
kind = "gemini"
model = "gemini-2.5-flash"
api_key_env = "GEMINI_API_KEY"
priority = 1
max_concurrency = 8
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.language, "en");
        assert_eq!(config.defaults.min_words, 300);
        assert_eq!(config.research.disambiguation, DisambiguationPolicy::Fail);
        assert_eq!(ResearchConfig::from(&config).max_candidates, Some(2));

        let ordered: Vec<&str> = config
            .providers_by_priority()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(ordered, vec!["primary", "backup"]);
        assert_eq!(config.providers[0].max_concurrency, 4);
        assert_eq!(config.providers[1].max_concurrency, 8);
    }

    #[test]
    fn disabled_providers_are_skipped() {
        let mut config = AppConfig::default();
        config.providers[0].enabled = false;
        let names: Vec<&str> = config
            .providers_by_priority()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["groq", "openrouter"]);
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let app = AppConfig::default();
        let research = ResearchConfig::from(&app);
        assert_eq!(research.timeout, Duration::from_secs(10));
        assert_eq!(research.max_body_chars, 12_000);
        assert!(research.negative_cache_ttl < research.cache_ttl);

        let generation = GenerationConfig::from(&app);
        assert_eq!(generation.max_retries, 2);
        assert_eq!(generation.initial_backoff, Duration::from_millis(500));
        assert_eq!(generation.max_repairs, 2);
    }

    #[test]
    fn validation_rejects_duplicates() {
        let mut config = AppConfig::default();
        config.providers[1].name = "gemini".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate provider name"));
    }

    #[test]
    fn validation_rejects_no_enabled_providers() {
        let mut config = AppConfig::default();
        for provider in &mut config.providers {
            provider.enabled = false;
        }
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn validation_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.providers[2].max_concurrency = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("openrouter"));
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("articlegen-config-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[generation]\nmax_repairs = 1\n").unwrap();

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.generation.max_repairs, 1);
        assert_eq!(config.generation.max_retries, 2);

        std::fs::write(&path, "[generation\n").unwrap();
        assert!(load_config_from(&path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
