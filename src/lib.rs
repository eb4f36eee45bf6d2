pub mod config;
pub mod errors;
pub mod hub;
pub mod models;
pub mod project;
pub mod store;
pub mod watcher;

pub use crate::config::StoreConfig;
pub use crate::errors::{StoreError, StoreResult};
pub use crate::hub::{ChangeHub, Subscription, Update};
pub use crate::models::{
    parse_task_ref, task_ref_id, Event, MilestoneInfo, NewEvent, NewOpportunity, NewTask, Opportunity,
    ProjectContext, Settings, StatusSummary, Task, TaskFilter, TaskPatch, TaskPriority, TaskStatus, TaskType,
};
pub use crate::store::{order_milestones, DocKind, MigrationReport, Store};
pub use crate::watcher::{fingerprint, DirectoryWatcher, WatcherHandle};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Installs JSON logging to a daily-rolled `ghist.log` under `log_dir`.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "ghist.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
