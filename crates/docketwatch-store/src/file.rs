//! Whole-file JSON persistence with atomic replace.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::StoreError;

/// Directory that holds `path`, treating a bare file name as the current directory.
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir { path: dir, source })
}

/// Serialise `value` to `path` so that a crash leaves either the old or the new
/// file in place, never a truncated one. Returns once the data is on disk.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let dir = parent_dir(path);
    let io_err = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| {
            StoreError::Serialize {
                path: path.to_path_buf(),
                source,
            }
        })?;
        writer.flush().map_err(io_err)?;
    }
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    // Make the rename itself durable.
    #[cfg(unix)]
    File::open(&dir).and_then(|d| d.sync_all()).map_err(io_err)?;

    Ok(())
}

/// Read a JSON store. A missing file yields `None`; a corrupt one is moved
/// aside (so the next write cannot destroy it) and also yields `None`, leaving
/// the caller to start empty. A file that exists but cannot be read is an
/// error, since starting empty would overwrite it on the next write.
pub(crate) fn read_json_or_quarantine<T: DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            let aside = quarantine_path(path);
            warn!(
                path = %path.display(),
                moved_to = %aside.display(),
                error = %e,
                "store corrupt, starting empty"
            );
            if let Err(e) = std::fs::rename(path, &aside) {
                warn!(path = %path.display(), error = %e, "could not move corrupt store aside");
            }
            Ok(None)
        }
    }
}

fn quarantine_path(path: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{stamp}"));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_then_read() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("values.json");
        write_json_atomic(&path, &vec![1u32, 2, 3]).unwrap();
        let read: Option<Vec<u32>> = read_json_or_quarantine(&path).unwrap();
        assert_eq!(read, Some(vec![1, 2, 3]));
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("values.json");
        write_json_atomic(&path, &vec![1u32]).unwrap();
        write_json_atomic(&path, &vec![7u32, 8]).unwrap();
        let read: Option<Vec<u32>> = read_json_or_quarantine(&path).unwrap();
        assert_eq!(read, Some(vec![7, 8]));
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        let read: Option<Vec<u32>> =
            read_json_or_quarantine(&tmp.path().join("absent.json")).unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn corrupt_file_is_moved_aside() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("values.json");
        std::fs::write(&path, b"[1, 2,").unwrap();

        let read: Option<Vec<u32>> = read_json_or_quarantine(&path).unwrap();
        assert!(read.is_none());
        assert!(!path.exists());

        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("values.json.corrupt-"));
    }

    #[test]
    fn unreadable_file_is_an_error_and_left_in_place() {
        let tmp = tempfile::TempDir::new().unwrap();
        // A directory where the file should be fails to read as a file.
        let path = tmp.path().join("values.json");
        std::fs::create_dir(&path).unwrap();

        let err = read_json_or_quarantine::<Vec<u32>>(&path).unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
        assert!(path.is_dir());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn bare_file_name_uses_current_dir() {
        assert_eq!(parent_dir(Path::new("cache.json")), PathBuf::from("."));
    }
}
