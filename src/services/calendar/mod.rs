pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::models::{CalendarEvent, EventPatch, NewEvent};

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn create_event(&self, event: NewEvent) -> anyhow::Result<CalendarEvent>;

    /// The user's events starting in `[from, to)`, ordered by start.
    async fn list_events_for_user(
        &self,
        user_id: &str,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> anyhow::Result<Vec<CalendarEvent>>;

    async fn update_event(&self, id: &str, patch: EventPatch) -> anyhow::Result<CalendarEvent>;

    async fn delete_event(&self, id: &str) -> anyhow::Result<()>;

    /// Every event overlapping `[from, to)`, ordered by start.
    async fn list_events_between(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> anyhow::Result<Vec<CalendarEvent>>;

    /// Record that a reminder went out for `event_id`; false if one already had.
    ///
    /// Backends without durable storage leave deduplication to the caller.
    async fn mark_reminder_sent(&self, _event_id: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}
