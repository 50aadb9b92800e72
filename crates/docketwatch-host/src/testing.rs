//! Shared fixtures for pipeline and service tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use docketwatch_core::WatchList;
use docketwatch_store::{CACHE_FILE, CASES_FILE, CaseStore, DocketCache};
use docketwatch_sync::{DocketSource, UpstreamError};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::pipeline::{RefreshPipeline, RefreshQuery};

pub fn docket(id: u64, case_name: &str) -> Value {
    json!({
        "id": id,
        "case_name": case_name,
        "case_name_short": "",
        "case_name_full": null,
        "docket_number": format!("1:25-cv-{id:05}"),
        "court_id": "dcd",
        "date_filed": "2025-02-10",
        "absolute_url": format!("/docket/{id}/case/"),
        "jurisdiction_type": "Federal Question",
        "nature_of_suit": "Civil Rights",
        "cause": "42:1983 Civil Rights Act",
    })
}

pub fn matching_docket(id: u64) -> Value {
    docket(id, &format!("Doe {id} v. Department of Government Efficiency"))
}

pub fn watchlist() -> WatchList {
    WatchList::builtin()
}

pub fn query() -> RefreshQuery {
    RefreshQuery {
        since: NaiveDate::from_ymd_opt(2025, 1, 18).unwrap(),
        party_name: "Department of Government Efficiency".into(),
    }
}

/// Lets a test hold a fetch open to observe the pipeline mid-cycle.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Docket source answering from a script, then from a fixed fallback.
#[derive(Default)]
pub struct FakeSource {
    script: Mutex<VecDeque<Result<Vec<Value>, UpstreamError>>>,
    fallback: Vec<Value>,
    gate: Option<Arc<Gate>>,
    pub calls: AtomicUsize,
}

impl FakeSource {
    pub fn always(dockets: Vec<Value>) -> Self {
        Self {
            fallback: dockets,
            ..Default::default()
        }
    }

    pub fn scripted(responses: Vec<Result<Vec<Value>, UpstreamError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    pub fn gated(dockets: Vec<Value>) -> Self {
        Self {
            fallback: dockets,
            gate: Some(Arc::new(Gate::default())),
            ..Default::default()
        }
    }

    pub fn gate(&self) -> Arc<Gate> {
        self.gate.clone().expect("source is not gated")
    }
}

#[async_trait]
impl DocketSource for FakeSource {
    async fn fetch_dockets(
        &self,
        _since: NaiveDate,
        _party_name: &str,
    ) -> Result<Vec<Value>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// A pipeline over a temporary data directory.
pub struct Harness {
    dir: TempDir,
    source: Arc<FakeSource>,
    pub pipeline: RefreshPipeline,
}

impl Harness {
    pub fn new(source: FakeSource) -> Self {
        Self::build(TempDir::new().unwrap(), Arc::new(source))
    }

    fn build(dir: TempDir, source: Arc<FakeSource>) -> Self {
        let data = dir.path().join("data");
        let cache = DocketCache::open(&data.join(CACHE_FILE)).unwrap();
        let cases = Arc::new(CaseStore::open(&data.join(CASES_FILE)).unwrap());
        let pipeline = RefreshPipeline::new(source.clone(), watchlist(), query(), cache, cases);
        Self {
            dir,
            source,
            pipeline,
        }
    }

    /// Drop the pipeline and build a fresh one over the same files, as a
    /// process restart would.
    pub fn restart(self) -> Self {
        let Harness { dir, source, .. } = self;
        Self::build(dir, source)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn reopen_cache(&self) -> DocketCache {
        DocketCache::open(&self.data_dir().join(CACHE_FILE)).unwrap()
    }

    pub fn reopen_cases(&self) -> CaseStore {
        CaseStore::open(&self.data_dir().join(CASES_FILE)).unwrap()
    }

    pub fn source_handle(&self) -> Arc<FakeSource> {
        self.source.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.source.calls.load(Ordering::SeqCst)
    }
}
