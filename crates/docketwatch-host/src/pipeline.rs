//! The refresh cycle: fetch → consult cache → classify new dockets → rebuild case list.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use docketwatch_core::{CaseRecord, ClassificationResult, DocketRecord, WatchList, classify};
use docketwatch_store::{CaseStore, DocketCache, StoreError};
use docketwatch_sync::{DocketSource, UpstreamError};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("fetching dockets failed: {0}")]
    Fetch(#[from] UpstreamError),
    #[error("persisting refresh results failed: {0}")]
    Persist(#[from] StoreError),
    #[error("a refresh is already running")]
    AlreadyRunning,
}

/// What to ask upstream for on every cycle.
#[derive(Debug, Clone)]
pub struct RefreshQuery {
    /// Only dockets filed on or after this date.
    pub since: NaiveDate,
    pub party_name: String,
}

/// Outcome of one successful refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    /// Dockets returned by upstream, malformed ones included.
    pub fetched: usize,
    /// Dockets classified for the first time this cycle.
    pub classified: usize,
    /// Dockets whose verdict came from the cache.
    pub reused: usize,
    /// Malformed dockets skipped.
    pub skipped: usize,
    /// Size of the rebuilt case list.
    pub matched_count: usize,
    /// One line per skipped docket.
    pub errors: Vec<String>,
}

/// Orchestrates refresh cycles over a docket source, the classification
/// cache, and the case list.
///
/// The cache lives behind an async mutex that is held for a whole cycle, so
/// cycles never overlap. The case list is shared with readers and only ever
/// replaced wholesale at the end of a successful cycle.
pub struct RefreshPipeline {
    source: Arc<dyn DocketSource>,
    watchlist: WatchList,
    query: RefreshQuery,
    cache: Mutex<DocketCache>,
    cases: Arc<CaseStore>,
}

impl RefreshPipeline {
    pub fn new(
        source: Arc<dyn DocketSource>,
        watchlist: WatchList,
        query: RefreshQuery,
        cache: DocketCache,
        cases: Arc<CaseStore>,
    ) -> Self {
        Self {
            source,
            watchlist,
            query,
            cache: Mutex::new(cache),
            cases,
        }
    }

    /// Run one cycle, waiting for any cycle already in progress to finish first.
    pub async fn refresh(&self) -> Result<RefreshSummary, RefreshError> {
        let mut cache = self.cache.lock().await;
        self.run_cycle(&mut cache).await
    }

    /// Run one cycle unless another is in progress.
    pub async fn try_refresh(&self) -> Result<RefreshSummary, RefreshError> {
        let Ok(mut cache) = self.cache.try_lock() else {
            return Err(RefreshError::AlreadyRunning);
        };
        self.run_cycle(&mut cache).await
    }

    /// The last committed case list.
    pub fn cases(&self) -> Arc<[CaseRecord]> {
        self.cases.all()
    }

    pub fn watchlist(&self) -> &WatchList {
        &self.watchlist
    }

    async fn run_cycle(&self, cache: &mut DocketCache) -> Result<RefreshSummary, RefreshError> {
        let start = Instant::now();
        info!(
            since = %self.query.since,
            party = %self.query.party_name,
            cached = cache.len(),
            "refresh started"
        );

        let raw = match self
            .source
            .fetch_dockets(self.query.since, &self.query.party_name)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "refresh aborted: fetch failed");
                return Err(e.into());
            }
        };

        let mut summary = RefreshSummary {
            fetched: raw.len(),
            ..Default::default()
        };
        let mut seen = HashSet::with_capacity(raw.len());
        let mut matched = Vec::new();

        for value in &raw {
            let docket = match DocketRecord::from_value(value) {
                Ok(docket) => docket,
                Err(e) => {
                    warn!(error = %e, "skipping malformed docket");
                    summary.skipped += 1;
                    summary.errors.push(e.to_string());
                    continue;
                }
            };

            if !seen.insert(docket.id) {
                debug!(docket_id = docket.id, "docket repeated within fetch, ignoring");
                summary.reused += 1;
                continue;
            }

            let verdict = match cache.get(docket.id) {
                Some(cached) => {
                    debug!(
                        docket_id = docket.id,
                        entities = ?cached.matched_entity_ids,
                        "using cached verdict"
                    );
                    summary.reused += 1;
                    cached.clone()
                }
                None => {
                    let result = self.classify_and_commit(cache, &docket)?;
                    summary.classified += 1;
                    result
                }
            };

            if verdict.is_match() {
                matched.push(verdict.case_snapshot);
            }
        }

        summary.matched_count = matched.len();
        if let Err(e) = self.cases.replace_all(matched) {
            error!(error = %e, "refresh aborted: case list not written");
            return Err(e.into());
        }

        info!(
            fetched = summary.fetched,
            classified = summary.classified,
            reused = summary.reused,
            skipped = summary.skipped,
            matched = summary.matched_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "refresh complete"
        );
        Ok(summary)
    }

    /// Classify a docket not yet in the cache and persist the verdict before
    /// returning it.
    fn classify_and_commit(
        &self,
        cache: &mut DocketCache,
        docket: &DocketRecord,
    ) -> Result<ClassificationResult, RefreshError> {
        let entities = classify(docket, &self.watchlist);
        debug!(docket_id = docket.id, entities = ?entities, "classified new docket");
        let result = ClassificationResult::new(docket, entities, Utc::now());
        if let Err(e) = cache.put(result.clone()) {
            error!(docket_id = docket.id, error = %e, "refresh aborted: verdict not persisted");
            return Err(e.into());
        }
        Ok(result)
    }
}
