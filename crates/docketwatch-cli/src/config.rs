//! Startup configuration: flags with environment fallbacks.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderValue;
use chrono::NaiveDate;
use clap::Args;
use docketwatch_core::WatchList;
use docketwatch_host::{RefreshPipeline, RefreshQuery};
use docketwatch_store::{CACHE_FILE, CASES_FILE, CaseStore, DocketCache};
use docketwatch_sync::{ClientConfig, CourtListenerClient, DEFAULT_BASE_URL};
use tracing::info;

/// CourtListener's webhook delivery addresses.
pub const COURTLISTENER_WEBHOOK_IPS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(34, 210, 230, 218)),
    IpAddr::V4(Ipv4Addr::new(54, 189, 59, 91)),
];

/// Settings shared by every subcommand.
#[derive(Args)]
pub struct Settings {
    /// CourtListener API token.
    #[arg(long, env = "COURTLISTENER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "COURTLISTENER_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Only dockets filed on or after this date (YYYY-MM-DD).
    #[arg(long, env = "CASE_START_DATE", default_value = "2025-01-18")]
    pub start_date: NaiveDate,

    /// Party name filter sent upstream.
    #[arg(long, env = "PARTY_NAME", default_value = "Department of Government Efficiency")]
    pub party_name: String,

    /// Directory holding cache.json and cases.json.
    #[arg(long, env = "DOCKETWATCH_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Watch-list JSON file; the built-in list is used when unset.
    #[arg(long, env = "DOCKETWATCH_WATCHLIST")]
    pub watchlist: Option<PathBuf>,

    /// Per-request timeout for upstream calls, in seconds.
    #[arg(long, env = "DOCKETWATCH_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Attempts per upstream page, including the first.
    #[arg(long, env = "DOCKETWATCH_HTTP_ATTEMPTS", default_value_t = 3)]
    pub http_attempts: u32,

    /// Append logs to this file instead of stderr.
    #[arg(long, env = "DOCKETWATCH_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// Settings for `serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "DOCKETWATCH_LISTEN", default_value = "127.0.0.1:5000")]
    pub listen: SocketAddr,

    /// Addresses allowed to call the webhook (repeatable). Defaults to
    /// CourtListener's delivery addresses.
    #[arg(long = "allowed-ip", value_delimiter = ',', env = "DOCKETWATCH_ALLOWED_IPS")]
    pub allowed_ips: Vec<IpAddr>,

    /// Seconds between scheduled refreshes; the first runs at startup.
    #[arg(long, env = "DOCKETWATCH_REFRESH_INTERVAL_SECS", default_value_t = 12 * 60 * 60)]
    pub refresh_interval_secs: u64,

    /// Browser origins allowed to read the HTTP surface (repeatable).
    /// Any origin is allowed when unset.
    #[arg(long = "cors-origin", value_delimiter = ',', env = "DOCKETWATCH_CORS_ORIGINS")]
    pub cors_origins: Vec<String>,
}

impl ServeArgs {
    pub fn allowed_ips(&self) -> Vec<IpAddr> {
        if self.allowed_ips.is_empty() {
            COURTLISTENER_WEBHOOK_IPS.to_vec()
        } else {
            self.allowed_ips.clone()
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn cors_origins(&self) -> anyhow::Result<Vec<HeaderValue>> {
        self.cors_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim())
                    .with_context(|| format!("invalid CORS origin {origin:?}"))
            })
            .collect()
    }
}

impl Settings {
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE)
    }

    pub fn cases_path(&self) -> PathBuf {
        self.data_dir.join(CASES_FILE)
    }

    pub fn load_watchlist(&self) -> anyhow::Result<WatchList> {
        match &self.watchlist {
            Some(path) => WatchList::load(path)
                .with_context(|| format!("loading watch-list {}", path.display())),
            None => {
                info!("using built-in watch-list");
                Ok(WatchList::builtin())
            }
        }
    }

    /// Upstream client. A missing API key is a startup error.
    pub fn client(&self) -> anyhow::Result<CourtListenerClient> {
        let api_key = self
            .api_key
            .clone()
            .context("COURTLISTENER_API_KEY is not set")?;
        let mut config = ClientConfig::new(self.base_url.clone(), api_key);
        config.timeout = Duration::from_secs(self.http_timeout_secs);
        config.max_attempts = self.http_attempts;
        CourtListenerClient::new(config).context("configuring CourtListener client")
    }

    pub fn open_case_store(&self) -> anyhow::Result<CaseStore> {
        let path = self.cases_path();
        CaseStore::open(&path).with_context(|| format!("opening {}", path.display()))
    }

    /// Wire the full pipeline from configuration.
    pub fn open_pipeline(&self) -> anyhow::Result<RefreshPipeline> {
        let client = self.client()?;
        let watchlist = self.load_watchlist()?;
        let cache_path = self.cache_path();
        let cache = DocketCache::open(&cache_path)
            .with_context(|| format!("opening {}", cache_path.display()))?;
        let cases = Arc::new(self.open_case_store()?);
        let query = RefreshQuery {
            since: self.start_date,
            party_name: self.party_name.clone(),
        };
        Ok(RefreshPipeline::new(
            Arc::new(client),
            watchlist,
            query,
            cache,
            cases,
        ))
    }
}
