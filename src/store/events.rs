use super::{allocate_id, write_json_file, DocKind, Store};
use crate::errors::{StoreError, StoreResult};
use crate::models::{Event, NewEvent};
use chrono::Utc;
use std::cmp::Ordering;

pub const DEFAULT_EVENT_TYPE: &str = "log";
pub const DEFAULT_EVENT_METADATA: &str = "{}";
pub const DEFAULT_EVENT_LIMIT: usize = 20;

impl Store {
    /// Appends an event. An empty or whitespace-only message is rejected here
    /// rather than left to callers.
    pub fn create_event(&self, input: NewEvent) -> StoreResult<Event> {
        let NewEvent {
            event_type,
            message,
            metadata,
            task_id,
        } = input;

        if message.trim().is_empty() {
            return Err(StoreError::Invalid("event message is required".to_string()));
        }

        let _lock = self.lock_kind(DocKind::Event)?;
        let id = allocate_id(&self.kind_dir(DocKind::Event))?;
        let event = Event {
            id,
            event_type: event_type
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
            message,
            metadata: metadata
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_METADATA.to_string()),
            task_id,
            created_at: Utc::now(),
        };

        write_json_file(&self.document_path(DocKind::Event, id), &event)?;
        Ok(event)
    }

    pub fn get_event(&self, id: i64) -> StoreResult<Event> {
        self.read_document(DocKind::Event, id)
    }

    /// Most recent events first, at most `limit` (0 means the default of 20).
    pub fn list_events(&self, limit: usize) -> StoreResult<Vec<Event>> {
        let limit = if limit == 0 { DEFAULT_EVENT_LIMIT } else { limit };
        let mut events = self.all_events()?;
        events.sort_by(newest_first);
        events.truncate(limit);
        Ok(events)
    }

    pub fn list_events_by_task(&self, task_id: i64) -> StoreResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .all_events()?
            .into_iter()
            .filter(|event| event.task_id == Some(task_id))
            .collect();
        events.sort_by(newest_first);
        Ok(events)
    }

    fn all_events(&self) -> StoreResult<Vec<Event>> {
        Ok(self
            .load_all::<Event>(DocKind::Event)?
            .into_iter()
            .map(|(_, event)| event)
            .collect())
    }
}

fn newest_first(a: &Event, b: &Event) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}
