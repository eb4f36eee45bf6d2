use super::{allocate_id, write_json_file, DocKind, Store};
use crate::errors::{StoreError, StoreResult};
use crate::models::{task_ref_id, Event, MilestoneInfo, NewTask, Task, TaskFilter, TaskPatch, TaskStatus};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;

impl Store {
    pub fn create_task(&self, input: NewTask) -> StoreResult<Task> {
        let NewTask {
            title,
            description,
            status,
            milestone,
            priority,
            task_type,
            legacy_id,
        } = input;

        if title.trim().is_empty() {
            return Err(StoreError::Invalid("task title is required".to_string()));
        }

        let _lock = self.lock_kind(DocKind::Task)?;
        let id = allocate_id(&self.kind_dir(DocKind::Task))?;
        let now = Utc::now();
        let task = Task {
            id,
            title,
            description,
            plan: String::new(),
            status: status.unwrap_or_default(),
            milestone,
            commit_hash: String::new(),
            priority,
            task_type,
            ref_id: task_ref_id(id),
            legacy_id,
            created_at: now,
            updated_at: now,
        };

        write_json_file(&self.document_path(DocKind::Task, id), &task)?;
        tracing::debug!(task_id = id, ref_id = %task.ref_id, "task created");
        Ok(task)
    }

    pub fn get_task(&self, id: i64) -> StoreResult<Task> {
        self.read_document(DocKind::Task, id)
    }

    /// Tasks matching every set filter field, ascending by id.
    pub fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .load_all::<Task>(DocKind::Task)?
            .into_iter()
            .map(|(_, task)| task)
            .filter(|task| filter.matches(task))
            .collect();
        tasks.sort_by_key(|task| task.id);
        Ok(tasks)
    }

    /// Applies the fields present in `patch`. An empty patch returns the
    /// stored task untouched, `updated_at` included.
    pub fn update_task(&self, id: i64, patch: TaskPatch) -> StoreResult<Task> {
        if patch.is_empty() {
            return self.get_task(id);
        }

        let _lock = self.lock_kind(DocKind::Task)?;
        let mut task = self.get_task(id)?;

        let TaskPatch {
            title,
            description,
            plan,
            status,
            milestone,
            commit_hash,
            priority,
            task_type,
            legacy_id,
        } = patch;

        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = description {
            task.description = description;
        }
        if let Some(plan) = plan {
            task.plan = plan;
        }
        if let Some(status) = status {
            task.status = status;
        }
        if let Some(milestone) = milestone {
            task.milestone = milestone;
        }
        if let Some(commit_hash) = commit_hash {
            task.commit_hash = commit_hash;
        }
        if let Some(priority) = priority {
            task.priority = priority;
        }
        if let Some(task_type) = task_type {
            task.task_type = task_type;
        }
        if let Some(legacy_id) = legacy_id {
            task.legacy_id = legacy_id;
        }

        // Keep updated_at strictly ahead of the previous stamp even on coarse clocks.
        let now = Utc::now();
        task.updated_at = if now > task.updated_at {
            now
        } else {
            task.updated_at + chrono::Duration::microseconds(1)
        };

        write_json_file(&self.document_path(DocKind::Task, id), &task)?;
        Ok(task)
    }

    /// Removes the task, then clears `task_id` on events that referenced it.
    /// Failures while clearing references are logged, never returned.
    pub fn delete_task(&self, id: i64) -> StoreResult<()> {
        {
            let _lock = self.lock_kind(DocKind::Task)?;
            let path = self.document_path(DocKind::Task, id);
            fs::remove_file(&path).map_err(|error| match error.kind() {
                ErrorKind::NotFound => StoreError::NotFound(format!("task {} not found", id)),
                _ => StoreError::Io(error.to_string()),
            })?;
        }

        let cleared = self.clear_event_task_refs(id);
        tracing::debug!(task_id = id, cleared_events = cleared, "task deleted");
        Ok(())
    }

    fn clear_event_task_refs(&self, task_id: i64) -> usize {
        let _lock = match self.lock_kind(DocKind::Event) {
            Ok(lock) => lock,
            Err(error) => {
                tracing::warn!(task_id, error = %error, "could not lock events to clear task references");
                return 0;
            }
        };

        let events = match self.load_all::<Event>(DocKind::Event) {
            Ok(events) => events,
            Err(error) => {
                tracing::warn!(task_id, error = %error, "could not scan events to clear task references");
                return 0;
            }
        };

        let mut cleared = 0;
        for (path, mut event) in events {
            if event.task_id != Some(task_id) {
                continue;
            }
            event.task_id = None;
            match write_json_file(&path, &event) {
                Ok(()) => cleared += 1,
                Err(error) => {
                    tracing::warn!(
                        task_id,
                        event_id = event.id,
                        error = %error,
                        "failed to clear task reference on event"
                    );
                }
            }
        }
        cleared
    }

    /// Count per status present; statuses with no tasks are absent.
    pub fn task_counts_by_status(&self) -> StoreResult<BTreeMap<TaskStatus, usize>> {
        let mut counts = BTreeMap::new();
        for task in self.list_tasks(&TaskFilter::default())? {
            *counts.entry(task.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Totals per non-empty milestone, sorted by milestone name.
    pub fn milestone_info(&self) -> StoreResult<Vec<MilestoneInfo>> {
        let mut by_name: BTreeMap<String, MilestoneInfo> = BTreeMap::new();
        for task in self.list_tasks(&TaskFilter::default())? {
            if task.milestone.is_empty() {
                continue;
            }
            let entry = by_name
                .entry(task.milestone.clone())
                .or_insert_with(|| MilestoneInfo {
                    name: task.milestone.clone(),
                    total: 0,
                    done: 0,
                });
            entry.total += 1;
            if task.status == TaskStatus::Done {
                entry.done += 1;
            }
        }
        Ok(by_name.into_values().collect())
    }
}
