use crate::config::StoreConfig;
use crate::errors::{StoreError, StoreResult};
use crate::hub::ChangeHub;
use crate::watcher::{DirectoryWatcher, WatcherHandle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

mod events;
mod ids;
mod migrate;
mod opportunities;
mod settings;
mod summary;
mod tasks;

pub use ids::{allocate_id, document_id, next_id, KindLock};
pub use migrate::{migrate_legacy_database, MigrationReport};
pub use summary::order_milestones;

pub const SETTINGS_FILE: &str = "settings.json";
const SETTINGS_LOCK_FILE: &str = "settings.lock";

/// The document directories under the store root, one per entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKind {
    Task,
    Event,
    Opportunity,
}

impl DocKind {
    pub const ALL: [DocKind; 3] = [DocKind::Task, DocKind::Event, DocKind::Opportunity];

    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::Event => "events",
            Self::Opportunity => "opportunities",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Event => "event",
            Self::Opportunity => "opportunity",
        }
    }
}

#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    config: StoreConfig,
    migration: MigrationReport,
}

impl Store {
    pub fn open(store_dir: &Path) -> StoreResult<Self> {
        Self::open_with(StoreConfig::for_store_dir(store_dir))
    }

    /// Opens the store, converting a legacy database first when one is present.
    pub fn open_with(config: StoreConfig) -> StoreResult<Self> {
        let root = config.store_dir.clone();
        fs::create_dir_all(&root).map_err(|error| StoreError::Io(error.to_string()))?;

        let migration = migrate_legacy_database(&config)?;
        if let Some(backup_error) = migration.backup_error.as_deref() {
            tracing::warn!(
                legacy = %config.legacy_db_path().to_string_lossy(),
                error = %backup_error,
                "legacy database migrated but backup rename failed"
            );
        }

        let store = Self {
            root,
            config,
            migration,
        };
        store.ensure_topology()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    pub fn kind_dir(&self, kind: DocKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn document_path(&self, kind: DocKind, id: i64) -> PathBuf {
        document_path(&self.root, kind, id)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// Directories the live-update server observes.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        vec![self.kind_dir(DocKind::Task), self.kind_dir(DocKind::Event)]
    }

    /// Starts polling the task and event directories at the configured interval.
    pub fn watch(&self, hub: ChangeHub) -> WatcherHandle {
        DirectoryWatcher::spawn(hub, self.watch_dirs(), self.config.poll_interval())
    }

    fn ensure_topology(&self) -> StoreResult<()> {
        for kind in DocKind::ALL {
            let dir = self.kind_dir(kind);
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|error| StoreError::Io(error.to_string()))?;
            }
        }

        let settings = self.settings_path();
        if !settings.exists() {
            fs::write(&settings, "{}").map_err(|error| StoreError::Io(error.to_string()))?;
        }
        Ok(())
    }

    fn lock_kind(&self, kind: DocKind) -> StoreResult<KindLock> {
        KindLock::acquire(&self.kind_dir(kind).join(ids::LOCK_FILE))
    }

    fn lock_settings(&self) -> StoreResult<KindLock> {
        KindLock::acquire(&self.root.join(SETTINGS_LOCK_FILE))
    }

    fn read_document<T: DeserializeOwned>(&self, kind: DocKind, id: i64) -> StoreResult<T> {
        let path = self.document_path(kind, id);
        match read_json_file(&path) {
            Err(StoreError::NotFound(_)) => Err(StoreError::NotFound(format!(
                "{} {} not found",
                kind.label(),
                id
            ))),
            Err(StoreError::Parse(error)) => Err(StoreError::Parse(format!(
                "{} {} is corrupt: {}",
                kind.label(),
                id,
                error
            ))),
            other => other,
        }
    }

    /// Loads every decodable document of a kind, in no particular order.
    fn load_all<T: DeserializeOwned>(&self, kind: DocKind) -> StoreResult<Vec<(PathBuf, T)>> {
        let dir = self.kind_dir(kind);
        let mut docs = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|error| StoreError::Io(error.to_string()))? {
            let entry = entry.map_err(|error| StoreError::Io(error.to_string()))?;
            let path = entry.path();
            if document_id(&path).is_none() {
                continue;
            }
            match read_json_file::<T>(&path) {
                Ok(doc) => docs.push((path, doc)),
                Err(error) => {
                    tracing::warn!(path = %path.to_string_lossy(), error = %error, "skipping malformed document");
                }
            }
        }
        Ok(docs)
    }
}

pub(crate) fn document_path(root: &Path, kind: DocKind, id: i64) -> PathBuf {
    root.join(kind.dir_name()).join(format!("{}.json", id))
}

/// Writes indented JSON through a sibling temp file so readers never see a partial document.
pub(crate) fn write_json_file<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::Io(format!("no parent directory for {}", path.display())))?;
    fs::create_dir_all(parent).map_err(|error| StoreError::Io(error.to_string()))?;

    let bytes = serde_json::to_vec_pretty(value).map_err(|error| StoreError::Internal(error.to_string()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    fs::write(&temp, bytes).map_err(|error| StoreError::Io(error.to_string()))?;
    if let Err(error) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(StoreError::Io(format!("writing {}: {}", path.display(), error)));
    }
    Ok(())
}

pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let bytes = fs::read(path).map_err(|error| match error.kind() {
        ErrorKind::NotFound => StoreError::NotFound(path.display().to_string()),
        _ => StoreError::Io(error.to_string()),
    })?;
    serde_json::from_slice(&bytes).map_err(StoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_layout_and_empty_settings() {
        let temp = tempfile::tempdir().expect("temp store root");
        let store = Store::open(&temp.path().join(".ghist")).expect("store opens");

        for kind in DocKind::ALL {
            assert!(store.kind_dir(kind).is_dir(), "{} dir", kind.dir_name());
        }
        let settings = fs::read_to_string(store.settings_path()).expect("settings written");
        assert_eq!(settings, "{}");
        assert!(!store.migration_report().migrated);
    }

    #[test]
    fn reopening_keeps_existing_settings() {
        let temp = tempfile::tempdir().expect("temp store root");
        let store = Store::open(temp.path()).expect("store opens");
        fs::write(store.settings_path(), r#"{"milestone_order":["v1"]}"#).expect("write settings");

        let reopened = Store::open(temp.path()).expect("store reopens");
        let settings = fs::read_to_string(reopened.settings_path()).expect("settings kept");
        assert!(settings.contains("v1"));
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("tasks").join("1.json");
        write_json_file(&path, &serde_json::json!({"id": 1})).expect("write doc");

        let names: Vec<String> = fs::read_dir(temp.path().join("tasks"))
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["1.json".to_string()]);
        let text = fs::read_to_string(&path).expect("read doc");
        assert!(text.contains("\n  \"id\": 1"));
    }

    #[test]
    fn read_json_distinguishes_missing_from_corrupt() {
        let temp = tempfile::tempdir().expect("temp dir");
        let missing = read_json_file::<serde_json::Value>(&temp.path().join("7.json"));
        assert!(matches!(missing, Err(StoreError::NotFound(_))));

        let corrupt = temp.path().join("8.json");
        fs::write(&corrupt, "{not json").expect("write corrupt");
        let parsed = read_json_file::<serde_json::Value>(&corrupt);
        assert!(matches!(parsed, Err(StoreError::Parse(_))));
    }
}
