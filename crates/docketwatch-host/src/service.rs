//! Service context shared by the HTTP handlers, the scheduler, and the refresh worker.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use docketwatch_core::CaseRecord;
use lru::LruCache;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::pipeline::{RefreshError, RefreshPipeline, RefreshSummary};

/// Idempotency keys remembered for webhook de-duplication.
pub const WEBHOOK_KEY_MEMORY: usize = 1024;

/// Why a refresh was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Schedule,
    Webhook,
}

/// Result of [`Service::handle_webhook_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A refresh was requested.
    Queued,
    /// A refresh request was already pending; this event rides along with it.
    Coalesced,
    /// The idempotency key was seen before; nothing was done.
    Duplicate,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Coalesced => "coalesced",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Bounded set of recently seen keys; the oldest is forgotten first.
struct RecentKeys {
    keys: LruCache<String, ()>,
}

impl RecentKeys {
    fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            keys: LruCache::new(capacity),
        }
    }

    /// Returns `false` if `key` was already present. A repeat does not
    /// refresh the key's position, so keys expire in arrival order.
    fn insert(&mut self, key: &str) -> bool {
        if self.keys.contains(key) {
            return false;
        }
        self.keys.put(key.to_string(), ());
        true
    }
}

/// Process-wide context, built once at startup and shared behind an `Arc`.
pub struct Service {
    pipeline: Arc<RefreshPipeline>,
    triggers: mpsc::Sender<RefreshTrigger>,
    webhook_keys: Mutex<RecentKeys>,
}

/// Consumes refresh requests one at a time. Spawn [`run`](Self::run) once.
pub struct RefreshWorker {
    pipeline: Arc<RefreshPipeline>,
    triggers: mpsc::Receiver<RefreshTrigger>,
}

impl Service {
    /// Build the service and the worker that will execute its refresh requests.
    ///
    /// At most one request is queued at a time; requests made while one is
    /// pending are coalesced into it.
    pub fn new(pipeline: RefreshPipeline) -> (Arc<Self>, RefreshWorker) {
        let pipeline = Arc::new(pipeline);
        let (tx, rx) = mpsc::channel(1);
        let service = Arc::new(Self {
            pipeline: pipeline.clone(),
            triggers: tx,
            webhook_keys: Mutex::new(RecentKeys::new(WEBHOOK_KEY_MEMORY)),
        });
        let worker = RefreshWorker {
            pipeline,
            triggers: rx,
        };
        (service, worker)
    }

    /// Read path for the presentation layer: the last committed case list.
    pub fn get_cases(&self) -> Arc<[CaseRecord]> {
        self.pipeline.cases()
    }

    /// Run a refresh cycle inline, serialised with any other cycle.
    pub async fn refresh(&self) -> Result<RefreshSummary, RefreshError> {
        self.pipeline.refresh().await
    }

    /// Ask the worker for a refresh. Returns `false` if one was already pending.
    pub fn request_refresh(&self, trigger: RefreshTrigger) -> bool {
        match self.triggers.try_send(trigger) {
            Ok(()) => {
                debug!(?trigger, "refresh requested");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(?trigger, "refresh already pending");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(?trigger, "refresh worker stopped, request dropped");
                false
            }
        }
    }

    /// Handle a webhook delivery.
    ///
    /// Webhooks are only a trigger: the payload is not classified and the
    /// stores are not touched here. A new idempotency key requests a refresh;
    /// a key seen before is acknowledged without doing anything.
    pub fn handle_webhook_event(&self, idempotency_key: &str, payload: &Value) -> WebhookOutcome {
        let fresh = self
            .webhook_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(idempotency_key);
        if !fresh {
            info!(key = idempotency_key, "duplicate webhook delivery ignored");
            return WebhookOutcome::Duplicate;
        }

        let event_type = payload
            .pointer("/webhook/event_type")
            .map(Value::to_string)
            .unwrap_or_else(|| "unknown".into());
        info!(key = idempotency_key, event_type = %event_type, "webhook received");

        if self.request_refresh(RefreshTrigger::Webhook) {
            WebhookOutcome::Queued
        } else {
            WebhookOutcome::Coalesced
        }
    }
}

impl RefreshWorker {
    /// Execute refresh requests until every [`Service`] handle is dropped.
    pub async fn run(mut self) {
        while let Some(trigger) = self.triggers.recv().await {
            info!(?trigger, "running refresh");
            match self.pipeline.refresh().await {
                Ok(summary) => info!(
                    ?trigger,
                    matched = summary.matched_count,
                    skipped = summary.skipped,
                    "refresh succeeded"
                ),
                Err(e) => error!(?trigger, error = %e, "refresh failed"),
            }
        }
        info!("refresh worker stopped");
    }
}

/// Request a refresh every `every`, starting immediately.
pub fn spawn_scheduler(service: Arc<Service>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            service.request_refresh(RefreshTrigger::Schedule);
        }
    })
}
