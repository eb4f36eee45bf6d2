use super::{write_json_file, Store};
use crate::errors::StoreResult;
use crate::models::{MilestoneInfo, ProjectContext, StatusSummary, TaskFilter};
use std::collections::HashMap;
use std::path::Path;

impl Store {
    pub fn status_summary(&self, recent_events: usize) -> StoreResult<StatusSummary> {
        let tasks_by_status = self.task_counts_by_status()?;
        Ok(StatusSummary {
            total_tasks: tasks_by_status.values().sum(),
            tasks_by_status,
            milestones: self.milestone_info()?,
            recent_events: self.list_events(recent_events)?,
        })
    }

    pub fn project_context(&self, recent_events: usize) -> StoreResult<ProjectContext> {
        let summary = self.status_summary(recent_events)?;
        Ok(ProjectContext {
            tasks: self.list_tasks(&TaskFilter::default())?,
            recent_events: summary.recent_events.clone(),
            summary,
        })
    }

    /// Writes the context snapshot (`current_context.json`) that agents read.
    pub fn write_project_context(&self, path: &Path) -> StoreResult<ProjectContext> {
        let context = self.project_context(self.config().recent_events_limit)?;
        write_json_file(path, &context)?;
        Ok(context)
    }

    /// Milestone totals arranged by the saved milestone order.
    pub fn ordered_milestones(&self) -> StoreResult<Vec<MilestoneInfo>> {
        let mut by_name: HashMap<String, MilestoneInfo> = self
            .milestone_info()?
            .into_iter()
            .map(|info| (info.name.clone(), info))
            .collect();
        let names: Vec<String> = by_name.keys().cloned().collect();
        let order = self.milestone_order()?;
        Ok(order_milestones(&names, &order)
            .into_iter()
            .filter_map(|name| by_name.remove(&name))
            .collect())
    }
}

/// Saved order first, then unlisted labels alphabetically, with "" always last.
pub fn order_milestones(milestones: &[String], order: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = Vec::with_capacity(milestones.len());
    for name in order {
        if !name.is_empty() && milestones.contains(name) && !ordered.contains(name) {
            ordered.push(name.clone());
        }
    }

    let mut remaining: Vec<String> = milestones
        .iter()
        .filter(|name| !name.is_empty() && !order.contains(*name))
        .cloned()
        .collect();
    remaining.sort();
    remaining.dedup();
    ordered.extend(remaining);

    let unassigned = String::new();
    if milestones.contains(&unassigned) && !ordered.contains(&unassigned) {
        ordered.push(unassigned);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewEvent, NewTask, TaskStatus};

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn order_milestones_puts_saved_order_first() {
        let ordered = order_milestones(&names(&["beta", "", "alpha", "v2", "v1"]), &names(&["v2", "gone", "v1"]));
        assert_eq!(ordered, names(&["v2", "v1", "alpha", "beta", ""]));
    }

    #[test]
    fn unassigned_stays_last_even_when_saved_first() {
        let ordered = order_milestones(&names(&["v1", "", "v2"]), &names(&["", "v2"]));
        assert_eq!(ordered, names(&["v2", "v1", ""]));
    }

    #[test]
    fn order_milestones_without_saved_order_is_alphabetical() {
        let ordered = order_milestones(&names(&["b", "a"]), &[]);
        assert_eq!(ordered, names(&["a", "b"]));
    }

    #[test]
    fn summary_and_context_reflect_store_contents() {
        let root = tempfile::tempdir().expect("temp store root");
        let store = Store::open(root.path()).expect("store opens");
        store
            .create_task(NewTask {
                status: Some(TaskStatus::Done),
                milestone: "v1".to_string(),
                ..NewTask::titled("shipped")
            })
            .expect("task");
        store.create_task(NewTask::titled("pending")).expect("task");
        store.create_event(NewEvent::log("note")).expect("event");

        let summary = store.status_summary(10).expect("summary");
        assert_eq!(summary.total_tasks, 2);
        assert_eq!(summary.tasks_by_status.get(&TaskStatus::Done), Some(&1));
        assert_eq!(summary.milestones.len(), 1);
        assert_eq!(summary.recent_events.len(), 1);

        let path = root.path().join("current_context.json");
        let context = store.write_project_context(&path).expect("context written");
        assert_eq!(context.tasks.len(), 2);
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read context")).expect("json");
        assert_eq!(raw["summary"]["total_tasks"], 2);
        assert_eq!(raw["summary"]["tasks_by_status"]["done"], 1);
    }

    #[test]
    fn ordered_milestones_follow_saved_order() {
        let root = tempfile::tempdir().expect("temp store root");
        let store = Store::open(root.path()).expect("store opens");
        for milestone in ["a", "b", "c"] {
            store
                .create_task(NewTask {
                    milestone: milestone.to_string(),
                    ..NewTask::titled(milestone)
                })
                .expect("task");
        }
        store.set_milestone_order(names(&["c", "a"])).expect("order");

        let ordered: Vec<String> = store
            .ordered_milestones()
            .expect("ordered")
            .into_iter()
            .map(|info| info.name)
            .collect();
        assert_eq!(ordered, names(&["c", "a", "b"]));
    }
}
