use super::{document_path, write_json_file, DocKind, KindLock};
use crate::config::StoreConfig;
use crate::errors::{StoreError, StoreResult};
use crate::models::{task_ref_id, Event, Opportunity, Task, TaskPriority, TaskStatus, TaskType};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Outcome of converting a legacy database into documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub migrated: bool,
    pub tasks: usize,
    pub events: usize,
    pub opportunities: usize,
    pub skipped: usize,
    /// Set when documents were written but the legacy file could not be renamed.
    pub backup_error: Option<String>,
}

impl MigrationReport {
    pub fn written(&self) -> usize {
        self.tasks + self.events + self.opportunities
    }
}

/// Converts `<store_dir>/<legacy_db_file>` into per-record documents, then
/// renames the legacy file to its backup name.
///
/// Re-runnable: rows whose document already exists are skipped, and once the
/// legacy file has been renamed the call is a no-op.
pub fn migrate_legacy_database(config: &StoreConfig) -> StoreResult<MigrationReport> {
    let legacy_path = config.legacy_db_path();
    if !legacy_path.is_file() {
        return Ok(MigrationReport::default());
    }

    let root = config.store_dir.as_path();
    for kind in DocKind::ALL {
        let dir = root.join(kind.dir_name());
        fs::create_dir_all(&dir)
            .map_err(|error| StoreError::Migration(format!("creating {} directory: {}", kind.dir_name(), error)))?;
    }

    let mut report = copy_legacy_rows(&legacy_path, root)?;
    report.migrated = true;

    let backup_path = config.legacy_backup_path();
    if let Err(error) = fs::rename(&legacy_path, &backup_path) {
        report.backup_error = Some(format!(
            "renaming {} to {}: {}",
            legacy_path.display(),
            backup_path.display(),
            error
        ));
    }

    tracing::info!(
        written = report.written(),
        tasks = report.tasks,
        events = report.events,
        opportunities = report.opportunities,
        skipped = report.skipped,
        backup = %backup_path.to_string_lossy(),
        "migrated legacy database to documents"
    );
    Ok(report)
}

/// Owns the connection for the whole copy so it is closed before any rename.
fn copy_legacy_rows(legacy_path: &Path, root: &Path) -> StoreResult<MigrationReport> {
    let conn = Connection::open(legacy_path)
        .map_err(|error| StoreError::Migration(format!("opening legacy database: {}", error)))?;

    let mut report = MigrationReport::default();
    migrate_kind(&conn, root, DocKind::Task, &mut report, read_task)
        .map_err(|error| StoreError::Migration(format!("migrating tasks: {}", error)))?;
    migrate_kind(&conn, root, DocKind::Event, &mut report, read_event)
        .map_err(|error| StoreError::Migration(format!("migrating events: {}", error)))?;
    migrate_kind(&conn, root, DocKind::Opportunity, &mut report, read_opportunity)
        .map_err(|error| StoreError::Migration(format!("migrating opportunities: {}", error)))?;

    drop(conn);
    Ok(report)
}

/// Column list for a legacy table, substituting a literal for columns an
/// older schema version never had.
struct LegacyColumns {
    present: HashSet<String>,
}

impl LegacyColumns {
    fn load(conn: &Connection, table: &str) -> StoreResult<Option<Self>> {
        let exists = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let present = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(Some(Self { present }))
    }

    fn select(&self, columns: &[(&str, &str)]) -> String {
        columns
            .iter()
            .map(|(name, fallback)| {
                if self.present.contains(*name) {
                    format!("\"{}\"", name)
                } else {
                    format!("{} AS \"{}\"", fallback, name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

trait LegacyRecord: Serialize {
    const TABLE: &'static str;
    const COLUMNS: &'static [(&'static str, &'static str)];
    fn id(&self) -> i64;
}

impl LegacyRecord for Task {
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("id", "NULL"),
        ("title", "''"),
        ("description", "''"),
        ("plan", "''"),
        ("status", "'todo'"),
        ("milestone", "''"),
        ("commit_hash", "''"),
        ("priority", "''"),
        ("type", "''"),
        ("ref_id", "''"),
        ("legacy_id", "''"),
        ("created_at", "''"),
        ("updated_at", "''"),
    ];

    fn id(&self) -> i64 {
        self.id
    }
}

impl LegacyRecord for Event {
    const TABLE: &'static str = "events";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("id", "NULL"),
        ("type", "'log'"),
        ("message", "''"),
        ("metadata", "'{}'"),
        ("task_id", "NULL"),
        ("created_at", "''"),
    ];

    fn id(&self) -> i64 {
        self.id
    }
}

impl LegacyRecord for Opportunity {
    const TABLE: &'static str = "opportunities";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("id", "NULL"),
        ("name", "''"),
        ("notes", "''"),
        ("created_at", "''"),
        ("updated_at", "''"),
    ];

    fn id(&self) -> i64 {
        self.id
    }
}

fn migrate_kind<T, F>(
    conn: &Connection,
    root: &Path,
    kind: DocKind,
    report: &mut MigrationReport,
    read_row: F,
) -> StoreResult<()>
where
    T: LegacyRecord,
    F: Fn(&Row<'_>) -> StoreResult<T>,
{
    let Some(columns) = LegacyColumns::load(conn, T::TABLE)? else {
        tracing::info!(table = T::TABLE, "legacy table missing, nothing to migrate");
        return Ok(());
    };

    let _lock = KindLock::acquire(&root.join(kind.dir_name()).join(super::ids::LOCK_FILE))?;
    let sql = format!("SELECT {} FROM {} ORDER BY id", columns.select(T::COLUMNS), T::TABLE);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;

    while let Some(row) = rows.next()? {
        let record = read_row(row)?;
        let path = document_path(root, kind, record.id());
        if path.exists() {
            report.skipped += 1;
            continue;
        }
        write_json_file(&path, &record)?;
        match kind {
            DocKind::Task => report.tasks += 1,
            DocKind::Event => report.events += 1,
            DocKind::Opportunity => report.opportunities += 1,
        }
    }
    Ok(())
}

fn read_task(row: &Row<'_>) -> StoreResult<Task> {
    let id: i64 = row.get("id")?;
    let status: String = row.get("status")?;
    let priority: String = row.get("priority")?;
    let task_type: String = row.get("type")?;
    let ref_id: String = row.get("ref_id")?;
    Ok(Task {
        id,
        title: row.get("title")?,
        description: row.get("description")?,
        plan: row.get("plan")?,
        status: status.parse::<TaskStatus>()?,
        milestone: row.get("milestone")?,
        commit_hash: row.get("commit_hash")?,
        priority: priority.parse::<TaskPriority>()?,
        task_type: task_type.parse::<TaskType>()?,
        ref_id: if ref_id.is_empty() { task_ref_id(id) } else { ref_id },
        legacy_id: row.get("legacy_id")?,
        created_at: parse_legacy_timestamp(&row.get::<_, String>("created_at")?)?,
        updated_at: parse_legacy_timestamp(&row.get::<_, String>("updated_at")?)?,
    })
}

fn read_event(row: &Row<'_>) -> StoreResult<Event> {
    Ok(Event {
        id: row.get("id")?,
        event_type: row.get("type")?,
        message: row.get("message")?,
        metadata: row.get("metadata")?,
        task_id: row.get("task_id")?,
        created_at: parse_legacy_timestamp(&row.get::<_, String>("created_at")?)?,
    })
}

fn read_opportunity(row: &Row<'_>) -> StoreResult<Opportunity> {
    Ok(Opportunity {
        id: row.get("id")?,
        name: row.get("name")?,
        notes: row.get("notes")?,
        created_at: parse_legacy_timestamp(&row.get::<_, String>("created_at")?)?,
        updated_at: parse_legacy_timestamp(&row.get::<_, String>("updated_at")?)?,
    })
}

/// Legacy rows store RFC 3339; SQLite's `datetime()` form is accepted too.
fn parse_legacy_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| StoreError::Migration(format!("unparseable legacy timestamp '{}'", value)))
}
