use crate::errors::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

pub(crate) const LOCK_FILE: &str = ".lock";
pub(crate) const HIGH_WATER_FILE: &str = ".last_id";

/// Exclusive advisory lock on a lock file, released on drop.
///
/// Held across "scan for the next id, then write the document" so two
/// processes allocating in the same kind directory cannot pick the same id.
/// Also serializes read-modify-write of existing documents of that kind.
#[derive(Debug)]
pub struct KindLock {
    file: File,
}

impl KindLock {
    pub fn acquire(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| StoreError::Io(error.to_string()))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|error| StoreError::Io(format!("opening lock {}: {}", path.display(), error)))?;
        file.lock_exclusive()
            .map_err(|error| StoreError::Io(format!("locking {}: {}", path.display(), error)))?;
        Ok(Self { file })
    }
}

impl Drop for KindLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// The id encoded in a document filename (`<positive int>.json`), if any.
pub fn document_id(path: &Path) -> Option<i64> {
    if path.extension().and_then(|value| value.to_str()) != Some("json") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    stem.parse::<i64>().ok().filter(|id| *id > 0)
}

/// One past the highest document id in `dir`, or 1 when there is none.
///
/// Callers must hold the kind's [`KindLock`] until the new document is written.
pub fn next_id(dir: &Path) -> StoreResult<i64> {
    let mut max_id = 0;
    for entry in fs::read_dir(dir).map_err(|error| StoreError::Io(error.to_string()))? {
        let entry = entry.map_err(|error| StoreError::Io(error.to_string()))?;
        if let Some(id) = document_id(&entry.path()) {
            max_id = max_id.max(id);
        }
    }
    id_after(max_id, dir)
}

fn id_after(last: i64, dir: &Path) -> StoreResult<i64> {
    last.checked_add(1)
        .ok_or_else(|| StoreError::Internal(format!("id space exhausted in {}", dir.display())))
}

/// Allocates the id for a new document in `dir`.
///
/// Takes the larger of the directory scan and the recorded high-water mark,
/// so deleting the newest document never frees its id. Callers must hold the
/// kind's [`KindLock`] until the new document is written.
pub fn allocate_id(dir: &Path) -> StoreResult<i64> {
    let scanned = next_id(dir)?;
    let marker = dir.join(HIGH_WATER_FILE);
    let recorded = match fs::read_to_string(&marker) {
        Ok(raw) => match raw.trim().parse::<i64>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(path = %marker.to_string_lossy(), "ignoring unreadable id high-water mark");
                0
            }
        },
        Err(_) => 0,
    };

    let id = scanned.max(id_after(recorded, dir)?);
    fs::write(&marker, id.to_string()).map_err(|error| StoreError::Io(error.to_string()))?;
    Ok(id)
}
