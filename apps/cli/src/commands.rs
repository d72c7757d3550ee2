//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing::info;

use articlegen_core::{ArticleGenerator, Researcher};
use articlegen_providers::resolve_providers_from_env;
use articlegen_shared::{
    AppConfig, ArticleRequest, ArticleResult, ResearchConfig, ResearchContext, Style, init_config,
    load_config, load_config_from,
};
use articlegen_wikipedia::WikipediaClient;

use crate::progress::CliProgress;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// articlegen: turn a topic into a sourced article.
#[derive(Parser)]
#[command(
    name = "articlegen",
    version,
    about = "Research a topic on Wikipedia and write an article about it with an LLM.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.articlegen/articlegen.toml.
    #[arg(long, global = true, env = "ARTICLEGEN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Output format for command results.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Research a topic and generate an article.
    Generate {
        /// Topic to write about.
        topic: String,

        /// Two-letter language code (defaults to the configured language).
        #[arg(short, long)]
        language: Option<String>,

        /// Minimum word count (defaults to the configured minimum).
        #[arg(short, long)]
        min_words: Option<usize>,

        /// Writing style: informative, academic, or journalistic.
        #[arg(short, long)]
        style: Option<Style>,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,

        /// Write the result to a file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run only the research stage and print the extracted material.
    Research {
        /// Topic to look up.
        topic: String,

        /// Two-letter language code (defaults to the configured language).
        #[arg(short, long)]
        language: Option<String>,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List configured providers and whether their API key is set.
    Providers,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout
/// carries only command output.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "articlegen=warn",
        1 => "articlegen=info",
        2 => "articlegen=debug",
        _ => "articlegen=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Generate {
            topic,
            language,
            min_words,
            style,
            format,
            out,
        } => {
            let config = resolve_config(config_path)?;
            let request = ArticleRequest::new(
                &topic,
                language.as_deref().unwrap_or(&config.defaults.language),
                min_words.unwrap_or(config.defaults.min_words),
                style.unwrap_or(config.defaults.style),
            )?;
            if let Some(path) = out.as_deref() {
                check_output_path(path)?;
            }
            cmd_generate(&config, &request, format, out.as_deref()).await
        }
        Command::Research {
            topic,
            language,
            format,
        } => {
            let config = resolve_config(config_path)?;
            let language = language.unwrap_or_else(|| config.defaults.language.clone());
            cmd_research(&config, &topic, &language, format).await
        }
        Command::Providers => cmd_providers(&resolve_config(config_path)?),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_generate(
    config: &AppConfig,
    request: &ArticleRequest,
    format: OutputFormat,
    out: Option<&Path>,
) -> Result<()> {
    let providers = resolve_providers_from_env(config)?;
    let source = Arc::new(WikipediaClient::from_config(config)?);

    info!(
        topic = request.topic(),
        language = request.language(),
        min_words = request.min_words(),
        style = %request.style(),
        "generating article"
    );

    let progress = Arc::new(CliProgress::new());
    let generator =
        ArticleGenerator::new(source, providers, config)?.with_observer(progress.clone());

    let outcome = generator.run(request).await;
    progress.finish();
    let result = outcome?;

    let rendered = match format {
        OutputFormat::Markdown => render_article(&result),
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
    };
    emit(&rendered, out)?;

    if result.shortfall {
        eprintln!(
            "warning: article has {} words, {} short of the requested {}",
            result.word_count,
            result.word_deficit,
            request.min_words()
        );
    }
    eprintln!(
        "{} words via {} ({}), {} provider call(s), {} repair(s)",
        result.word_count,
        result.metadata.provider,
        result.metadata.model,
        result.metadata.synthesis_attempts,
        result.metadata.repair_attempts
    );

    Ok(())
}

async fn cmd_research(
    config: &AppConfig,
    topic: &str,
    language: &str,
    format: OutputFormat,
) -> Result<()> {
    let request = ArticleRequest::new(topic, language, config.defaults.min_words, Style::default())?;
    let source = Arc::new(WikipediaClient::from_config(config)?);
    let researcher = Researcher::new(source, ResearchConfig::from(config));

    let context = researcher.fetch(request.topic(), request.language()).await?;

    let rendered = match format {
        OutputFormat::Markdown => render_research(&context),
        OutputFormat::Json => serde_json::to_string_pretty(context.as_ref())?,
    };
    println!("{rendered}");
    Ok(())
}

fn cmd_providers(config: &AppConfig) -> Result<()> {
    let mut providers: Vec<_> = config.providers.iter().collect();
    providers.sort_by_key(|p| p.priority);

    println!(
        "{:<4} {:<12} {:<18} {:<36} {:<8} KEY",
        "PRI", "NAME", "KIND", "MODEL", "ENABLED"
    );
    for provider in providers {
        let key = match std::env::var(&provider.api_key_env) {
            Ok(value) if !value.trim().is_empty() => "set",
            _ => "missing",
        };
        let kind = serde_json::to_value(&provider.kind)?;
        println!(
            "{:<4} {:<12} {:<18} {:<36} {:<8} {} ({})",
            provider.priority,
            provider.name,
            kind.as_str().unwrap_or_default(),
            provider.model,
            provider.enabled,
            key,
            provider.api_key_env
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn emit(rendered: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, format!("{rendered}\n"))
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            eprintln!("Article written to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

/// Article Markdown followed by a sources section.
fn render_article(result: &ArticleResult) -> String {
    let mut out = result.content.clone();
    if !result.sources.is_empty() {
        out.push_str("\n\n---\n\nSources:\n");
        for source in &result.sources {
            out.push_str(&format!("\n- {source}"));
        }
    }
    out
}

fn render_research(context: &ResearchContext) -> String {
    let mut out = format!("# {}\n\n", context.title);
    out.push_str(&format!("Status:    {}\n", context.status));
    out.push_str(&format!("Language:  {}\n", context.language));
    out.push_str(&format!(
        "Length:    {} chars{}\n",
        context.body.chars().count(),
        if context.truncated { " (truncated)" } else { "" }
    ));
    out.push_str(&format!("Hash:      {}\n", context.content_hash));
    for source in &context.sources {
        out.push_str(&format!("Source:    {source}\n"));
    }
    out.push_str("\n---\n\n");
    out.push_str(&context.body);
    out
}

/// Reject `--out` targets whose parent directory does not exist.
fn check_output_path(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => Err(eyre!(
            "output directory '{}' does not exist",
            parent.display()
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use articlegen_shared::{GenerationMetadata, RequestId, ResolutionStatus};
    use chrono::Utc;

    fn result(sources: Vec<String>) -> ArticleResult {
        ArticleResult {
            title: "Rust".into(),
            content: "# Rust\n\nRust is a language.".into(),
            word_count: 5,
            sources,
            shortfall: false,
            word_deficit: 0,
            metadata: GenerationMetadata {
                request_id: RequestId::new(),
                provider: "groq".into(),
                model: "llama".into(),
                generated_at: Utc::now(),
                style: Style::Informative,
                topic: "Rust".into(),
                language: "en".into(),
                research_status: ResolutionStatus::Direct,
                research_truncated: false,
                synthesis_attempts: 1,
                repair_attempts: 0,
            },
        }
    }

    #[test]
    fn article_lists_sources() {
        let rendered = render_article(&result(vec!["https://en.wikipedia.org/wiki/Rust".into()]));
        assert_eq!(
            rendered,
            "# Rust\n\nRust is a language.\n\n---\n\nSources:\n\n- https://en.wikipedia.org/wiki/Rust"
        );
    }

    #[test]
    fn article_without_sources_is_unchanged() {
        assert_eq!(render_article(&result(vec![])), "# Rust\n\nRust is a language.");
    }

    #[test]
    fn cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "articlegen", "generate", "Quantum Computing", "-l", "en", "-m", "450", "-s",
            "academic", "-f", "json",
        ])
        .unwrap();
        let Command::Generate {
            topic,
            language,
            min_words,
            style,
            format,
            out,
        } = cli.command
        else {
            panic!("expected generate");
        };
        assert_eq!(topic, "Quantum Computing");
        assert_eq!(language.as_deref(), Some("en"));
        assert_eq!(min_words, Some(450));
        assert_eq!(style, Some(Style::Academic));
        assert!(matches!(format, OutputFormat::Json));
        assert!(out.is_none());
    }

    #[test]
    fn cli_rejects_unknown_style() {
        assert!(Cli::try_parse_from(["articlegen", "generate", "Rust", "-s", "poetic"]).is_err());
    }

    #[test]
    fn missing_output_directory_is_rejected() {
        assert!(check_output_path(Path::new("/definitely/not/here/article.md")).is_err());
        assert!(check_output_path(Path::new("article.md")).is_ok());
    }
}
