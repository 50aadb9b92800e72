//! Durable docket ID → classification verdict map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use docketwatch_core::{ClassificationResult, DocketId};
use tracing::{debug, info};

use crate::StoreError;
use crate::file::{ensure_parent_dir, read_json_or_quarantine, write_json_atomic};

/// Persistent classification cache, the source of truth for every docket
/// ever classified.
///
/// Entries are append-only by key: once a docket has a verdict it is never
/// replaced or removed. Every [`put`](Self::put) rewrites the backing file
/// atomically and returns only after it is on disk, so a crash loses at most
/// the entry being written.
///
/// A missing or corrupt backing file opens as an empty cache. A backing file
/// that exists but cannot be read fails [`open`](Self::open) instead.
pub struct DocketCache {
    path: PathBuf,
    entries: BTreeMap<DocketId, ClassificationResult>,
}

impl DocketCache {
    /// Open the cache stored at `path`, creating its directory if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        ensure_parent_dir(path)?;
        let entries: BTreeMap<DocketId, ClassificationResult> =
            read_json_or_quarantine(path)?.unwrap_or_default();
        info!(path = %path.display(), entries = entries.len(), "opened docket cache");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, docket_id: DocketId) -> Option<&ClassificationResult> {
        self.entries.get(&docket_id)
    }

    pub fn contains(&self, docket_id: DocketId) -> bool {
        self.entries.contains_key(&docket_id)
    }

    /// Record a verdict and persist it.
    ///
    /// Idempotent: if the docket already has a verdict the existing one is
    /// kept, nothing is written, and `Ok(false)` is returned. On a write
    /// failure the entry is not retained in memory either.
    pub fn put(&mut self, result: ClassificationResult) -> Result<bool, StoreError> {
        let docket_id = result.docket_id;
        if self.entries.contains_key(&docket_id) {
            debug!(docket_id, "verdict already cached, keeping existing entry");
            return Ok(false);
        }

        self.entries.insert(docket_id, result);
        if let Err(e) = write_json_atomic(&self.path, &self.entries) {
            self.entries.remove(&docket_id);
            return Err(e);
        }
        Ok(true)
    }

    /// All verdicts in ascending docket ID order.
    pub fn all(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docketwatch_core::{CaseRecord, DocketRecord};

    fn result(id: DocketId, entities: &[&str]) -> ClassificationResult {
        let docket = DocketRecord {
            id,
            case_name: format!("Case {id}"),
            case_name_short: None,
            case_name_full: None,
            docket_number: format!("1:25-cv-{id:05}"),
            court_id: "dcd".into(),
            date_filed: "2025-02-01".into(),
            absolute_url: format!("/docket/{id}/case/"),
            jurisdiction_type: None,
            nature_of_suit: None,
            cause: None,
        };
        ClassificationResult::new(
            &docket,
            entities.iter().map(|e| e.to_string()).collect(),
            Utc::now(),
        )
    }

    #[test]
    fn open_missing_is_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cache = DocketCache::open(&tmp.path().join("cache.json")).unwrap();
        assert!(cache.is_empty());
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn open_creates_data_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("data").join("cache.json");
        DocketCache::open(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn put_persists_across_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");

        let mut cache = DocketCache::open(&path).unwrap();
        assert!(cache.put(result(7, &["doge"])).unwrap());
        assert!(cache.put(result(3, &[])).unwrap());
        drop(cache);

        let cache = DocketCache::open(&path).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(7).unwrap().matched_entity_ids, vec!["doge"]);
        assert!(cache.get(3).unwrap().matched_entity_ids.is_empty());
        let ids: Vec<DocketId> = cache.all().map(|r| r.docket_id).collect();
        assert_eq!(ids, vec![3, 7]);
    }

    #[test]
    fn put_keeps_first_verdict() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut cache = DocketCache::open(&tmp.path().join("cache.json")).unwrap();

        let first = result(7, &[]);
        assert!(cache.put(first.clone()).unwrap());
        assert!(!cache.put(result(7, &["doge"])).unwrap());
        assert_eq!(cache.get(7), Some(&first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::write(&path, "{\"7\": {\"docket_id\": 7, ").unwrap();

        let mut cache = DocketCache::open(&path).unwrap();
        assert!(cache.is_empty());
        // Still writable afterwards.
        cache.put(result(1, &["doge"])).unwrap();
        assert_eq!(DocketCache::open(&path).unwrap().len(), 1);
    }

    #[test]
    fn unreadable_file_fails_open_and_is_kept() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::create_dir(&path).unwrap();

        let err = DocketCache::open(&path).err().unwrap();
        assert!(matches!(err, StoreError::Read { .. }));
        assert!(path.is_dir());
    }

    #[test]
    fn failed_write_is_not_retained() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("data");
        let path = dir.join("cache.json");
        let mut cache = DocketCache::open(&path).unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
        let err = cache.put(result(9, &["doge"])).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        assert!(!cache.contains(9));
    }

    #[test]
    fn snapshot_survives_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        let original = result(42, &["doge"]);
        let expected: CaseRecord = original.case_snapshot.clone();

        let mut cache = DocketCache::open(&path).unwrap();
        cache.put(original).unwrap();
        let reopened = DocketCache::open(&path).unwrap();
        assert_eq!(reopened.get(42).unwrap().case_snapshot, expected);
    }
}
