//! MediaWiki Action API client.
//!
//! One [`KnowledgeSource::search`] call issues one `action=query` request
//! (plus one `action=parse` request for disambiguation pages). The API
//! resolves a single redirect in the same request; a longer chain comes
//! back as not found.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use articlegen_shared::{
    AppConfig, ArticleGenError, KnowledgeSource, Markup, Result, SourceArticle, SourceError,
    SourceLookup,
};

use crate::candidates::extract_candidates;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("ArticleGen/", env!("CARGO_PKG_VERSION"), " (article research)");

/// Default endpoint; `{lang}` is replaced by the language edition.
pub const DEFAULT_ENDPOINT: &str = "https://{lang}.wikipedia.org/w/api.php";

// ---------------------------------------------------------------------------
// API response shapes (formatversion=2)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<QueryBody>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryBody {
    #[serde(default)]
    redirects: Vec<RedirectEntry>,
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct RedirectEntry {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    pageprops: Option<PageProps>,
    #[serde(default)]
    canonicalurl: Option<String>,
    #[serde(default)]
    fullurl: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    #[serde(default)]
    disambiguation: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    #[serde(default)]
    parse: Option<ParseBody>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ParseBody {
    title: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    info: String,
}

impl ApiError {
    fn into_source_error(self) -> SourceError {
        SourceError::Decode(format!("API error {}: {}", self.code, self.info))
    }
}

// ---------------------------------------------------------------------------
// WikipediaClient
// ---------------------------------------------------------------------------

/// Wikipedia-backed knowledge source.
#[derive(Debug, Clone)]
pub struct WikipediaClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl WikipediaClient {
    /// Create a client for an endpoint template containing `{lang}`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ArticleGenError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    /// Create a client from the `[research]` section of the app config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.research.endpoint.clone(),
            Duration::from_secs(config.research.timeout_secs),
        )
    }

    fn endpoint_for(&self, language: &str) -> String {
        self.endpoint.replace("{lang}", language)
    }

    /// Article URL used when the API omits the canonical one.
    fn fallback_url(&self, language: &str, title: &str) -> String {
        let base = self
            .endpoint_for(language)
            .split("/w/api.php")
            .next()
            .map(str::to_string)
            .unwrap_or_default();
        format!("{base}/wiki/{}", title.replace(' ', "_"))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        language: &str,
        params: &[(&str, &str)],
    ) -> std::result::Result<T, SourceError> {
        let url = Url::parse_with_params(&self.endpoint_for(language), params)
            .map_err(|e| SourceError::Transport(format!("invalid endpoint: {e}")))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))
    }

    fn classify(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else {
            SourceError::Transport(e.to_string())
        }
    }

    async fn disambiguation_candidates(
        &self,
        title: &str,
        language: &str,
    ) -> std::result::Result<SourceLookup, SourceError> {
        let response: ParseResponse = self
            .get_json(
                language,
                &[
                    ("action", "parse"),
                    ("format", "json"),
                    ("formatversion", "2"),
                    ("prop", "text"),
                    ("page", title),
                ],
            )
            .await?;

        if let Some(error) = response.error {
            return Err(error.into_source_error());
        }
        let parse = response
            .parse
            .ok_or_else(|| SourceError::Decode("parse response without body".into()))?;

        let candidates = extract_candidates(&parse.text);
        debug!(title = %parse.title, count = candidates.len(), "disambiguation candidates");

        Ok(SourceLookup::Disambiguation {
            title: parse.title,
            candidates,
        })
    }
}

#[async_trait]
impl KnowledgeSource for WikipediaClient {
    #[instrument(skip(self), fields(source = "wikipedia"))]
    async fn search(
        &self,
        topic: &str,
        language: &str,
    ) -> std::result::Result<SourceLookup, SourceError> {
        let response: QueryResponse = self
            .get_json(
                language,
                &[
                    ("action", "query"),
                    ("format", "json"),
                    ("formatversion", "2"),
                    ("prop", "extracts|pageprops|info"),
                    ("inprop", "url"),
                    ("ppprop", "disambiguation"),
                    ("redirects", "1"),
                    ("titles", topic),
                ],
            )
            .await?;

        if let Some(error) = response.error {
            return Err(error.into_source_error());
        }
        let query = response.query.unwrap_or_default();

        let redirected_from = match query.redirects.as_slice() {
            [] => None,
            [redirect] => {
                debug!(from = %redirect.from, to = %redirect.to, "redirect resolved");
                Some(redirect.from.clone())
            }
            [.., last] => {
                debug!(hops = query.redirects.len(), to = %last.to, "redirect chain too long");
                return Ok(SourceLookup::NotFound);
            }
        };

        let Some(page) = query.pages.into_iter().next() else {
            return Ok(SourceLookup::NotFound);
        };
        if page.missing || page.invalid {
            return Ok(SourceLookup::NotFound);
        }

        if page
            .pageprops
            .as_ref()
            .is_some_and(|p| p.disambiguation.is_some())
        {
            return self.disambiguation_candidates(&page.title, language).await;
        }

        let source_url = page
            .canonicalurl
            .or(page.fullurl)
            .unwrap_or_else(|| self.fallback_url(language, &page.title));

        Ok(SourceLookup::Article(SourceArticle {
            title: page.title,
            body: page.extract.unwrap_or_default(),
            markup: Markup::Html,
            sources: vec![source_url],
            redirected_from,
        }))
    }

    fn name(&self) -> &str {
        "wikipedia"
    }
}
