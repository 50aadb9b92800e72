//! Host runtime: the refresh pipeline and the service context that drives it.

pub mod pipeline;
pub mod service;

#[cfg(test)]
mod testing;

pub use pipeline::{RefreshError, RefreshPipeline, RefreshQuery, RefreshSummary};
pub use service::{RefreshTrigger, RefreshWorker, Service, WebhookOutcome, spawn_scheduler};
