use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const TASK_REF_PREFIX: &str = "GHST-";

static TASK_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:ghst-)?(\d+)$").expect("valid task ref regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InPlanning,
    InProgress,
    Done,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InPlanning => "in_planning",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Blocked => "blocked",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "todo" => Ok(Self::Todo),
            "in_planning" => Ok(Self::InPlanning),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "blocked" => Ok(Self::Blocked),
            other => Err(StoreError::Invalid(format!(
                "unknown status '{}': expected todo, in_planning, in_progress, done or blocked",
                other
            ))),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    #[default]
    #[serde(rename = "")]
    Unset,
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "" => Ok(Self::Unset),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(StoreError::Invalid(format!(
                "unknown priority '{}': expected low, medium, high or urgent",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    #[serde(rename = "")]
    Unset,
    Bug,
    Feature,
    Improvement,
    Chore,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Improvement => "improvement",
            Self::Chore => "chore",
        }
    }
}

impl FromStr for TaskType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "" => Ok(Self::Unset),
            "bug" => Ok(Self::Bug),
            "feature" => Ok(Self::Feature),
            "improvement" => Ok(Self::Improvement),
            "chore" => Ok(Self::Chore),
            other => Err(StoreError::Invalid(format!(
                "unknown type '{}': expected bug, feature, improvement or chore",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub plan: String,
    pub status: TaskStatus,
    pub milestone: String,
    pub commit_hash: String,
    pub priority: TaskPriority,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub ref_id: String,
    pub legacy_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    pub metadata: String,
    pub task_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: i64,
    pub name: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Singleton settings document. Unknown keys written by other tools are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone_order: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: Option<TaskStatus>,
    pub milestone: String,
    pub priority: TaskPriority,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub legacy_id: String,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub plan: Option<String>,
    pub status: Option<TaskStatus>,
    pub milestone: Option<String>,
    pub commit_hash: Option<String>,
    pub priority: Option<TaskPriority>,
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub legacy_id: Option<String>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.plan.is_none()
            && self.status.is_none()
            && self.milestone.is_none()
            && self.commit_hash.is_none()
            && self.priority.is_none()
            && self.task_type.is_none()
            && self.legacy_id.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewEvent {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub message: String,
    pub metadata: Option<String>,
    pub task_id: Option<i64>,
}

impl NewEvent {
    pub fn log(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn for_task(mut self, task_id: i64) -> Self {
        self.task_id = Some(task_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewOpportunity {
    pub name: String,
    pub notes: String,
}

/// Task list filter. `None` on a field means the field is not filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub milestone: Option<String>,
    pub priority: Option<TaskPriority>,
    pub task_type: Option<TaskType>,
}

impl TaskFilter {
    /// Builds a filter from raw query strings where "" means unfiltered.
    pub fn from_query(status: &str, milestone: &str, priority: &str, task_type: &str) -> Result<Self, StoreError> {
        Ok(Self {
            status: non_empty(status).map(str::parse::<TaskStatus>).transpose()?,
            milestone: non_empty(milestone).map(ToString::to_string),
            priority: non_empty(priority).map(str::parse::<TaskPriority>).transpose()?,
            task_type: non_empty(task_type).map(str::parse::<TaskType>).transpose()?,
        })
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(milestone) = self.milestone.as_deref() {
            if task.milestone != milestone {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(task_type) = self.task_type {
            if task.task_type != task_type {
                return false;
            }
        }
        true
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneInfo {
    pub name: String,
    pub total: usize,
    pub done: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total_tasks: usize,
    pub tasks_by_status: BTreeMap<TaskStatus, usize>,
    pub milestones: Vec<MilestoneInfo>,
    pub recent_events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub tasks: Vec<Task>,
    pub recent_events: Vec<Event>,
    pub summary: StatusSummary,
}

pub fn task_ref_id(id: i64) -> String {
    format!("{}{}", TASK_REF_PREFIX, id)
}

/// Accepts `19`, `GHST-19` (any case) and surrounding whitespace.
pub fn parse_task_ref(input: &str) -> Result<i64, StoreError> {
    let trimmed = input.trim();
    let captures = TASK_REF_RE
        .captures(trimmed)
        .ok_or_else(|| StoreError::Invalid(format!("invalid task reference '{}'", input)))?;
    captures[1]
        .parse::<i64>()
        .map_err(|_| StoreError::Invalid(format!("invalid task reference '{}'", input)))
}
