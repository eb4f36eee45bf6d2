use crate::hub::ChangeHub;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Summary of the entries in `dirs`: changes whenever an entry is created,
/// removed, resized or touched. Unreadable directories and entries are skipped.
pub fn fingerprint(dirs: &[PathBuf]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for dir in dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        let mut samples: Vec<(String, u64, u128)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                let modified = metadata
                    .modified()
                    .ok()
                    .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                    .map(|elapsed| elapsed.as_nanos())
                    .unwrap_or_default();
                Some((entry.file_name().to_string_lossy().into_owned(), metadata.len(), modified))
            })
            .collect();
        samples.sort();

        dir.hash(&mut hasher);
        samples.hash(&mut hasher);
    }
    hasher.finish()
}

/// Polls directories and broadcasts on the hub whenever their fingerprint moves.
pub struct DirectoryWatcher;

impl DirectoryWatcher {
    /// The baseline fingerprint is taken before this returns, so changes made
    /// right after spawning are still detected. Must be called inside a tokio runtime.
    pub fn spawn(hub: ChangeHub, dirs: Vec<PathBuf>, interval: Duration) -> WatcherHandle {
        let baseline = fingerprint(&dirs);
        let task = tokio::spawn(async move {
            let mut last = baseline;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let sample_dirs = dirs.clone();
                let current = match tokio::task::spawn_blocking(move || fingerprint(&sample_dirs)).await {
                    Ok(value) => value,
                    Err(error) => {
                        tracing::warn!(error = %error, "directory fingerprint task failed");
                        continue;
                    }
                };
                if current != last {
                    last = current;
                    hub.broadcast();
                }
            }
        });
        WatcherHandle { task }
    }
}

/// Stops the polling task when dropped.
#[derive(Debug)]
pub struct WatcherHandle {
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
