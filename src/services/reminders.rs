//! Day-before appointment reminders and the attendance answers they await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset};

use crate::models::{CalendarEvent, Intent};
use crate::services::calendar::CalendarProvider;
use crate::services::dates;
use crate::services::messaging::{self, MessagingProvider};

/// Reminders go out for events starting this many hours ahead.
const WINDOW_HOURS: (i64, i64) = (23, 25);

#[derive(Debug, Clone, PartialEq)]
pub struct OutstandingReminder {
    pub event_id: String,
    pub user_id: String,
    pub summary: String,
    pub start: DateTime<FixedOffset>,
}

#[derive(Default)]
struct Inner {
    /// event id → reminder awaiting a yes/no
    awaiting: HashMap<String, OutstandingReminder>,
    /// event id → start, kept until the appointment has passed
    sent: HashMap<String, DateTime<FixedOffset>>,
}

/// Events whose reminder is waiting for the client's answer.
#[derive(Default)]
pub struct ReminderRegistry {
    inner: Mutex<Inner>,
}

impl ReminderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, reminder: OutstandingReminder) {
        let mut inner = self.lock();
        inner.sent.insert(reminder.event_id.clone(), reminder.start);
        inner.awaiting.insert(reminder.event_id.clone(), reminder);
    }

    pub fn was_sent(&self, event_id: &str) -> bool {
        self.lock().sent.contains_key(event_id)
    }

    /// Forget reminders for appointments that already started.
    pub fn prune_past(&self, now: DateTime<FixedOffset>) -> usize {
        let mut inner = self.lock();
        let before = inner.sent.len();
        inner.sent.retain(|_, start| *start > now);
        inner.awaiting.retain(|_, r| r.start > now);
        before - inner.sent.len()
    }

    /// The earliest appointment of `user_id` still awaiting an answer.
    pub fn outstanding_for(&self, user_id: &str) -> Option<OutstandingReminder> {
        self.lock()
            .awaiting
            .values()
            .filter(|r| r.user_id == user_id)
            .min_by_key(|r| r.start)
            .cloned()
    }

    pub fn remove(&self, event_id: &str) -> Option<OutstandingReminder> {
        self.lock().awaiting.remove(event_id)
    }

    pub fn awaiting_len(&self) -> usize {
        self.lock().awaiting.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn reminder_message(event: &CalendarEvent, business_name: &str) -> String {
    format!(
        "Olá! Aqui é da {business_name}. Passando para lembrar do seu {} amanhã, {} às {}. Você confirma presença?",
        event.summary.to_lowercase(),
        dates::format_day(event.start.date_naive()),
        dates::format_time(event.start.time()),
    )
}

pub fn acknowledgement(reminder: &OutstandingReminder, attending: bool) -> String {
    if attending {
        format!(
            "Maravilha, presença confirmada! Te esperamos {} às {}.",
            dates::format_day(reminder.start.date_naive()),
            dates::format_time(reminder.start.time()),
        )
    } else {
        "Obrigado por avisar! Vou informar o estúdio. Se quiser remarcar, é só me dizer.".to_string()
    }
}

pub fn admin_notice(reminder: &OutstandingReminder, attending: bool) -> String {
    let answer = if attending { "confirmou" } else { "NÃO confirmou" };
    format!(
        "Lembrete: {} {answer} presença em {} ({} às {}).",
        reminder.user_id,
        reminder.summary,
        dates::format_day(reminder.start.date_naive()),
        dates::format_time(reminder.start.time()),
    )
}

/// Map a classified answer onto attendance; `None` when it is not a yes/no.
pub fn attendance(intent: Option<Intent>) -> Option<bool> {
    match intent {
        Some(Intent::Confirmation) => Some(true),
        Some(Intent::Rejection) => Some(false),
        _ => None,
    }
}

pub struct ReminderDispatcher {
    calendar: Arc<dyn CalendarProvider>,
    messaging: Arc<dyn MessagingProvider>,
    registry: Arc<ReminderRegistry>,
    business_name: String,
}

impl ReminderDispatcher {
    pub fn new(
        calendar: Arc<dyn CalendarProvider>,
        messaging: Arc<dyn MessagingProvider>,
        registry: Arc<ReminderRegistry>,
        business_name: String,
    ) -> Self {
        Self {
            calendar,
            messaging,
            registry,
            business_name,
        }
    }

    /// Events starting 23 to 25 hours after `now` not yet reminded in this process.
    pub async fn due_events(&self, now: DateTime<FixedOffset>) -> anyhow::Result<Vec<CalendarEvent>> {
        let (from, to) = (now + Duration::hours(WINDOW_HOURS.0), now + Duration::hours(WINDOW_HOURS.1));
        let events = self.calendar.list_events_between(from, to).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.start >= from && e.start < to && !self.registry.was_sent(&e.id))
            .collect())
    }

    /// Send one reminder unless the calendar already recorded it.
    pub async fn send_reminder(&self, event: &CalendarEvent) -> anyhow::Result<bool> {
        if !self.calendar.mark_reminder_sent(&event.id).await? {
            tracing::debug!(event_id = %event.id, "reminder already sent");
            return Ok(false);
        }

        let body = reminder_message(event, &self.business_name);
        if !messaging::deliver_text(self.messaging.as_ref(), &event.user_id, &body).await {
            tracing::warn!(user = %event.user_id, event_id = %event.id, "reminder not delivered");
            return Ok(false);
        }

        self.registry.register(OutstandingReminder {
            event_id: event.id.clone(),
            user_id: event.user_id.clone(),
            summary: event.summary.clone(),
            start: event.start,
        });
        tracing::info!(user = %event.user_id, event_id = %event.id, "reminder sent");
        Ok(true)
    }

    pub fn registry(&self) -> &Arc<ReminderRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scheduling::testing::{at, event, MemoryCalendar};
    use async_trait::async_trait;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String)>>);

    #[async_trait]
    impl MessagingProvider for Outbox {
        async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn dispatcher(events: Vec<CalendarEvent>) -> (ReminderDispatcher, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::default());
        let dispatcher = ReminderDispatcher::new(
            Arc::new(MemoryCalendar::with(events)),
            outbox.clone(),
            Arc::new(ReminderRegistry::new()),
            "Estúdio Luz".to_string(),
        );
        (dispatcher, outbox)
    }

    #[tokio::test]
    async fn test_reminds_window_once() {
        let (dispatcher, outbox) = dispatcher(vec![
            event("ev1", "u1", "Ensaio gestante", "2025-05-21T10:00:00-03:00"),
            event("ev2", "u2", "Book", "2025-05-21T15:00:00-03:00"),
            event("ev3", "u3", "Ensaio", "2025-05-20T15:00:00-03:00"),
        ]);
        let now = at("2025-05-20T10:00:00-03:00");

        let due = dispatcher.due_events(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert!(dispatcher.send_reminder(&due[0]).await.unwrap());
        assert!(dispatcher.due_events(now).await.unwrap().is_empty());

        let sent = outbox.0.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "u1");
        assert!(sent[0].1.contains("Estúdio Luz") && sent[0].1.contains("10:00"));

        let outstanding = dispatcher.registry().outstanding_for("u1").unwrap();
        assert_eq!(outstanding.event_id, "ev1");
        assert!(dispatcher.registry().outstanding_for("u2").is_none());
    }

    #[test]
    fn test_outstanding_is_earliest_and_removable() {
        let registry = ReminderRegistry::new();
        for (id, start) in [("b", "2025-05-22T10:00:00-03:00"), ("a", "2025-05-21T10:00:00-03:00")] {
            registry.register(OutstandingReminder {
                event_id: id.to_string(),
                user_id: "u1".to_string(),
                summary: "Ensaio".to_string(),
                start: at(start),
            });
        }
        assert_eq!(registry.outstanding_for("u1").unwrap().event_id, "a");
        registry.remove("a");
        assert_eq!(registry.outstanding_for("u1").unwrap().event_id, "b");
        assert!(registry.was_sent("a"));
    }

    #[test]
    fn test_prune_forgets_started_appointments() {
        let registry = ReminderRegistry::new();
        for (id, start) in [("past", "2025-05-20T09:00:00-03:00"), ("next", "2025-05-21T10:00:00-03:00")] {
            registry.register(OutstandingReminder {
                event_id: id.to_string(),
                user_id: "u1".to_string(),
                summary: "Ensaio".to_string(),
                start: at(start),
            });
        }

        assert_eq!(registry.prune_past(at("2025-05-20T10:00:00-03:00")), 1);
        assert!(!registry.was_sent("past"));
        assert!(registry.was_sent("next"));
        assert_eq!(registry.awaiting_len(), 1);
        assert_eq!(registry.outstanding_for("u1").unwrap().event_id, "next");
    }

    #[test]
    fn test_attendance_mapping() {
        assert_eq!(attendance(Some(Intent::Confirmation)), Some(true));
        assert_eq!(attendance(Some(Intent::Rejection)), Some(false));
        assert_eq!(attendance(Some(Intent::Schedule)), None);
    }
}
