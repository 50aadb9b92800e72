//! The derived list of matched cases served to readers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use docketwatch_core::CaseRecord;
use tracing::info;

use crate::StoreError;
use crate::file::{ensure_parent_dir, read_json_or_quarantine, write_json_atomic};

/// Ordered list of matched cases, replaced wholesale on every refresh.
///
/// Readers get an immutable snapshot; [`replace_all`](Self::replace_all)
/// writes the new list to disk first and only then swaps the snapshot, so a
/// reader sees either the previous list or the new one in full.
pub struct CaseStore {
    path: PathBuf,
    current: RwLock<Arc<[CaseRecord]>>,
}

impl CaseStore {
    /// Open the case list at `path`. Missing or corrupt files open empty; an
    /// unreadable one is an error.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        ensure_parent_dir(path)?;
        let records: Vec<CaseRecord> = read_json_or_quarantine(path)?.unwrap_or_default();
        info!(path = %path.display(), cases = records.len(), "opened case store");
        Ok(Self {
            path: path.to_path_buf(),
            current: RwLock::new(records.into()),
        })
    }

    /// The current list, in fetch order.
    pub fn all(&self) -> Arc<[CaseRecord]> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Durably replace the whole list. On error the previous list stays
    /// in place, both on disk and in memory.
    pub fn replace_all(&self, records: Vec<CaseRecord>) -> Result<(), StoreError> {
        write_json_atomic(&self.path, &records)?;
        let count = records.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = records.into();
        info!(cases = count, "case store replaced");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
