//! Storage layer: the per-docket classification cache (source of truth) and
//! the derived list of matched cases served to readers.
//!
//! Both stores are JSON files rewritten whole on every change, through a
//! temp file in the same directory that is fsynced and renamed over the target.

mod cache;
mod cases;
mod error;
mod file;

pub use cache::DocketCache;
pub use cases::CaseStore;
pub use error::StoreError;

/// File name of the classification cache inside the data directory.
pub const CACHE_FILE: &str = "cache.json";
/// File name of the case list inside the data directory.
pub const CASES_FILE: &str = "cases.json";
