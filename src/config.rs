use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::project::GHIST_DIR;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_LEGACY_DB_FILE: &str = "ghist.sqlite";
pub const DEFAULT_BACKUP_SUFFIX: &str = ".bak";
pub const DEFAULT_RECENT_EVENTS_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct StoreConfig {
    pub store_dir: PathBuf,
    pub legacy_db_file: String,
    pub backup_suffix: String,
    pub poll_interval_ms: u64,
    pub recent_events_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(GHIST_DIR),
            legacy_db_file: DEFAULT_LEGACY_DB_FILE.to_string(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            recent_events_limit: DEFAULT_RECENT_EVENTS_LIMIT,
        }
    }
}

impl StoreConfig {
    pub fn for_store_dir(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            ..Self::default()
        }
    }

    pub fn for_project(root: &Path) -> Self {
        Self::for_store_dir(crate::project::store_dir(root))
    }

    /// Applies `GHIST_DIR` and `GHIST_POLL_INTERVAL_MS` when present.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("GHIST_DIR") {
            if !dir.trim().is_empty() {
                self.store_dir = PathBuf::from(dir);
            }
        }
        if let Ok(raw) = std::env::var("GHIST_POLL_INTERVAL_MS") {
            match raw.trim().parse::<u64>() {
                Ok(value) if value > 0 => self.poll_interval_ms = value,
                _ => {
                    tracing::warn!(value = %raw, "ignoring invalid GHIST_POLL_INTERVAL_MS");
                }
            }
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn legacy_db_path(&self) -> PathBuf {
        self.store_dir.join(&self.legacy_db_file)
    }

    pub fn legacy_backup_path(&self) -> PathBuf {
        self.store_dir
            .join(format!("{}{}", self.legacy_db_file, self.backup_suffix))
    }
}
