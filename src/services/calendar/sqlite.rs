use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use rusqlite::Connection;

use super::CalendarProvider;
use crate::db::queries;
use crate::models::{CalendarEvent, EventPatch, NewEvent};

/// Studio calendar kept in the local SQLite database.
pub struct SqliteCalendar {
    db: Arc<Mutex<Connection>>,
    offset: FixedOffset,
}

impl SqliteCalendar {
    pub fn new(db: Arc<Mutex<Connection>>, offset: FixedOffset) -> Self {
        Self { db, offset }
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CalendarProvider for SqliteCalendar {
    async fn create_event(&self, event: NewEvent) -> anyhow::Result<CalendarEvent> {
        anyhow::ensure!(event.end > event.start, "event must end after it starts");

        let event = CalendarEvent {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: event.user_id,
            summary: event.summary,
            description: event.description,
            start: event.start.with_timezone(&self.offset),
            end: event.end.with_timezone(&self.offset),
        };
        queries::insert_event(&self.conn(), &event).context("failed to insert event")?;

        tracing::info!(user = %event.user_id, event_id = %event.id, start = %event.start, "event created");
        Ok(event)
    }

    async fn list_events_for_user(
        &self,
        user_id: &str,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> anyhow::Result<Vec<CalendarEvent>> {
        queries::get_events_for_user(&self.conn(), user_id, &from, &to, &self.offset)
    }

    async fn update_event(&self, id: &str, patch: EventPatch) -> anyhow::Result<CalendarEvent> {
        let conn = self.conn();
        let mut event = queries::get_event(&conn, id, &self.offset)?
            .ok_or_else(|| anyhow::anyhow!("event {id} not found"))?;

        if let Some(summary) = patch.summary {
            event.summary = summary;
        }
        if let Some(start) = patch.start {
            event.start = start.with_timezone(&self.offset);
        }
        if let Some(end) = patch.end {
            event.end = end.with_timezone(&self.offset);
        }
        anyhow::ensure!(event.end > event.start, "event must end after it starts");

        queries::update_event(&conn, &event)?;
        tracing::info!(event_id = %id, start = %event.start, "event updated");
        Ok(event)
    }

    async fn delete_event(&self, id: &str) -> anyhow::Result<()> {
        if !queries::delete_event(&self.conn(), id)? {
            anyhow::bail!("event {id} not found");
        }
        tracing::info!(event_id = %id, "event deleted");
        Ok(())
    }

    async fn list_events_between(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> anyhow::Result<Vec<CalendarEvent>> {
        queries::get_events_overlapping(&self.conn(), &from, &to, &self.offset)
    }

    async fn mark_reminder_sent(&self, event_id: &str) -> anyhow::Result<bool> {
        queries::mark_reminder_sent(&self.conn(), event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn calendar() -> SqliteCalendar {
        let conn = db::init_db(":memory:").unwrap();
        SqliteCalendar::new(Arc::new(Mutex::new(conn)), FixedOffset::west_opt(3 * 3600).unwrap())
    }

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn new_event(start: &str, end: &str) -> NewEvent {
        NewEvent {
            user_id: "u1".to_string(),
            summary: "Ensaio fotográfico".to_string(),
            description: None,
            start: at(start),
            end: at(end),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let cal = calendar();
        let created = cal
            .create_event(new_event("2025-05-27T18:00:00Z", "2025-05-27T19:00:00Z"))
            .await
            .unwrap();
        // Returned in the studio offset
        assert_eq!(created.start.to_rfc3339(), "2025-05-27T15:00:00-03:00");

        let events = cal
            .list_events_for_user("u1", at("2025-05-27T00:00:00-03:00"), at("2025-05-28T00:00:00-03:00"))
            .await
            .unwrap();
        assert_eq!(events, vec![created]);
    }

    #[tokio::test]
    async fn test_rejects_inverted_interval() {
        let cal = calendar();
        let result = cal
            .create_event(new_event("2025-05-27T16:00:00-03:00", "2025-05-27T15:00:00-03:00"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_preserves_unpatched_fields() {
        let cal = calendar();
        let created = cal
            .create_event(new_event("2025-05-27T15:00:00-03:00", "2025-05-27T16:00:00-03:00"))
            .await
            .unwrap();

        let updated = cal
            .update_event(
                &created.id,
                EventPatch {
                    start: Some(at("2025-05-28T10:00:00-03:00")),
                    end: Some(at("2025-05-28T11:00:00-03:00")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.summary, "Ensaio fotográfico");
        assert_eq!(updated.duration(), chrono::Duration::hours(1));
    }

    #[tokio::test]
    async fn test_reminder_marked_once() {
        let cal = calendar();
        assert!(cal.mark_reminder_sent("ev1").await.unwrap());
        assert!(!cal.mark_reminder_sent("ev1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_is_error() {
        let cal = calendar();
        assert!(cal.delete_event("nope").await.is_err());
    }
}
