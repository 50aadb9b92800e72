//! HTTP client for CourtListener's `/dockets/` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.courtlistener.com/api/rest/v4";

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("malformed page from {url}: {reason}")]
    MalformedPage { url: String, reason: String },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("pagination did not finish within {0} pages")]
    TooManyPages(usize),
    #[error("CourtListener API key is not set")]
    MissingCredential,
}

impl UpstreamError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A source of raw docket objects.
///
/// Implementations must return every docket for the query or fail: a partially
/// fetched result set is an error, never a short `Ok`.
#[async_trait]
pub trait DocketSource: Send + Sync {
    async fn fetch_dockets(
        &self,
        since: NaiveDate,
        party_name: &str,
    ) -> Result<Vec<Value>, UpstreamError>;
}

/// Connection settings for [`CourtListenerClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://www.courtlistener.com/api/rest/v4`.
    pub base_url: String,
    pub api_key: String,
    /// Per-request timeout, covering connect and body.
    pub timeout: Duration,
    /// Total attempts per page, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub initial_backoff: Duration,
    pub max_pages: usize,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_pages: 500,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

#[derive(Deserialize)]
struct DocketPage {
    next: Option<String>,
    results: Vec<Value>,
}

/// CourtListener REST v4 client.
pub struct CourtListenerClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl CourtListenerClient {
    /// Build a client. An empty API key is rejected here, at startup, rather
    /// than surfacing later as a 401 from every refresh.
    pub fn new(mut config: ClientConfig) -> Result<Self, UpstreamError> {
        if config.api_key.trim().is_empty() {
            return Err(UpstreamError::MissingCredential);
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        config.max_attempts = config.max_attempts.max(1);
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// First-page URL for dockets filed on or after `since` naming `party_name`.
    fn dockets_url(&self, since: NaiveDate, party_name: &str) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&format!("{}/dockets/", self.config.base_url))?;
        url.query_pairs_mut()
            .append_pair("date_filed__gte", &since.format("%Y-%m-%d").to_string())
            .append_pair("party_name", party_name);
        Ok(url)
    }

    async fn get_page(&self, url: &Url) -> Result<DocketPage, UpstreamError> {
        let mut attempt = 1;
        loop {
            match self.get_page_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.initial_backoff * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        url = %url,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient upstream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_page_once(&self, url: &Url) -> Result<DocketPage, UpstreamError> {
        let resp = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, format!("Token {}", self.config.api_key))
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| UpstreamError::MalformedPage {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl DocketSource for CourtListenerClient {
    /// Fetch every page of results, following `next` links until exhausted.
    async fn fetch_dockets(
        &self,
        since: NaiveDate,
        party_name: &str,
    ) -> Result<Vec<Value>, UpstreamError> {
        let mut url = self.dockets_url(since, party_name)?;
        info!(url = %url, "fetching dockets");

        let mut dockets = Vec::new();
        for page_no in 1..=self.config.max_pages {
            let page = self.get_page(&url).await?;
            debug!(page = page_no, count = page.results.len(), "fetched docket page");
            dockets.extend(page.results);

            match page.next {
                Some(next) => url = url.join(&next)?,
                None => {
                    info!(pages = page_no, count = dockets.len(), "fetched dockets");
                    return Ok(dockets);
                }
            }
        }
        Err(UpstreamError::TooManyPages(self.config.max_pages))
    }
}
