//! Small JSON record persistence helpers shared by every store.

use crate::error::{StoreError, StoreResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Reads and parses a record. A missing file is `Ok(None)`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| StoreError::json(path, e))
}

/// Reads a record as loosely typed JSON so callers can try several formats.
pub fn read_value(path: &Path) -> StoreResult<Option<serde_json::Value>> {
    read_json(path)
}

/// Serializes `value` next to `path` and renames it into place, so a crash
/// mid-write never leaves a truncated record behind.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let data = serde_json::to_vec(value).map_err(|e| StoreError::json(path, e))?;
    write_bytes_atomic(path, &data)
}

/// Writes through a unique temp file and renames it into place.
pub fn write_bytes_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let tmp = tmp_path(path);
    fs::write(&tmp, data).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

/// Returns whether a file was actually removed.
pub fn remove_if_exists(path: &Path) -> StoreResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

// Unique per write so concurrent writers of the same record never share a
// scratch file.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    name.push(format!(".{}.{}.tmp", std::process::id(), n));
    path.with_file_name(name)
}
