use crate::errors::{StoreError, StoreResult};
use std::path::{Path, PathBuf};

pub const GHIST_DIR: &str = ".ghist";
pub const CONTEXT_FILE: &str = "current_context.json";

/// Walks up from `start` to the first directory containing `.ghist/`.
pub fn find_root(start: &Path) -> StoreResult<PathBuf> {
    let mut dir = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()?.join(start)
    };

    loop {
        if dir.join(GHIST_DIR).is_dir() {
            return Ok(dir);
        }
        if !dir.pop() {
            return Err(StoreError::NotFound(format!(
                "no {} directory found (walked up to filesystem root)",
                GHIST_DIR
            )));
        }
    }
}

pub fn store_dir(root: &Path) -> PathBuf {
    root.join(GHIST_DIR)
}

pub fn context_path(root: &Path) -> PathBuf {
    store_dir(root).join(CONTEXT_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_root_walks_up_to_store_dir() {
        let temp = tempfile::tempdir().expect("temp project root");
        std::fs::create_dir_all(temp.path().join(GHIST_DIR)).expect("create store dir");
        let nested = temp.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).expect("create nested");

        let found = find_root(&nested).expect("root found");
        assert_eq!(found, temp.path());
        assert_eq!(context_path(&found), temp.path().join(".ghist/current_context.json"));
    }

    #[test]
    fn find_root_reports_missing_store() {
        let temp = tempfile::tempdir().expect("temp dir");
        match find_root(temp.path()) {
            Err(error) => assert!(error.is_not_found()),
            // A stray .ghist above the temp dir is the only way to land here.
            Ok(found) => assert!(found.join(GHIST_DIR).is_dir()),
        }
    }
}
