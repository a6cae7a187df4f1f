use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationType {
    /// Playback was interrupted and the user was asked whether to continue.
    None,
    ScheduleCreate,
    ScheduleModify,
    ScheduleCancel,
}

/// Everything needed to commit a staged scheduling action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetails {
    Create {
        summary: String,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    },
    Modify {
        event_id: String,
        summary: String,
        old_start: DateTime<FixedOffset>,
        new_start: DateTime<FixedOffset>,
        new_end: DateTime<FixedOffset>,
    },
    Cancel {
        event_id: String,
        summary: String,
        start: DateTime<FixedOffset>,
    },
}

impl EventDetails {
    pub fn confirmation_type(&self) -> ConfirmationType {
        match self {
            EventDetails::Create { .. } => ConfirmationType::ScheduleCreate,
            EventDetails::Modify { .. } => ConfirmationType::ScheduleModify,
            EventDetails::Cancel { .. } => ConfirmationType::ScheduleCancel,
        }
    }

    /// Start of the slot a create or modify would occupy.
    pub fn target_start(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            EventDetails::Create { start, .. } => Some(*start),
            EventDetails::Modify { new_start, .. } => Some(*new_start),
            EventDetails::Cancel { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingResponse {
    /// Distinguishes this reply from one that later replaced it.
    pub id: uuid::Uuid,
    pub full_response: String,
    pub sent_parts: Vec<String>,
    pub remaining_parts: Vec<String>,
    pub current_part_index: usize,
    pub is_paused: bool,
    pub is_waiting_for_confirmation: bool,
    pub confirmation_type: ConfirmationType,
    pub event_details: Option<EventDetails>,
    pub last_interaction: Instant,
}

impl PendingResponse {
    pub fn new(full_response: &str, parts: Vec<String>, now: Instant) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            full_response: full_response.to_string(),
            sent_parts: Vec::new(),
            remaining_parts: parts,
            current_part_index: 0,
            is_paused: false,
            is_waiting_for_confirmation: false,
            confirmation_type: ConfirmationType::None,
            event_details: None,
            last_interaction: now,
        }
    }

    /// A reply that ends by asking the user to confirm a scheduling action.
    ///
    /// Starts waiting for the answer once its last part has been delivered.
    pub fn staged(full_response: &str, parts: Vec<String>, details: EventDetails, now: Instant) -> Self {
        let mut pending = Self::new(full_response, parts, now);
        pending.confirmation_type = details.confirmation_type();
        pending.event_details = Some(details);
        pending
    }

    pub fn is_staged(&self) -> bool {
        self.event_details.is_some()
    }

    /// Every part sent; staged replies now wait for the yes/no.
    pub fn finish_delivery(&mut self) {
        self.is_paused = false;
        if let Some(details) = &self.event_details {
            self.is_waiting_for_confirmation = true;
            self.confirmation_type = details.confirmation_type();
        }
    }

    /// Pause mid-playback and ask whether to go on.
    pub fn interrupt(&mut self) {
        self.is_paused = true;
        self.is_waiting_for_confirmation = true;
        self.confirmation_type = ConfirmationType::None;
    }

    pub fn resume(&mut self, now: Instant) {
        self.is_paused = false;
        self.is_waiting_for_confirmation = false;
        if let Some(details) = &self.event_details {
            self.confirmation_type = details.confirmation_type();
        }
        self.last_interaction = now;
    }

    /// An open question nobody answered within `max_idle`.
    pub fn is_stale(&self, now: Instant, max_idle: Duration) -> bool {
        self.is_waiting_for_confirmation && now.saturating_duration_since(self.last_interaction) >= max_idle
    }

    pub fn is_finished(&self) -> bool {
        self.remaining_parts.is_empty() && !self.is_staged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> EventDetails {
        let start = DateTime::parse_from_rfc3339("2025-05-27T15:00:00-03:00").unwrap();
        EventDetails::Create {
            summary: "Ensaio fotográfico".to_string(),
            start,
            end: start + chrono::Duration::hours(1),
        }
    }

    #[test]
    fn test_staged_waits_only_after_delivery() {
        let mut pending = PendingResponse::staged("ok?", vec!["ok?".to_string()], details(), Instant::now());
        assert!(!pending.is_waiting_for_confirmation);
        assert_eq!(pending.confirmation_type, ConfirmationType::ScheduleCreate);

        pending.remaining_parts.clear();
        pending.finish_delivery();
        assert!(pending.is_waiting_for_confirmation);
        assert!(!pending.is_finished());
    }

    #[test]
    fn test_interrupt_then_resume_restores_staging() {
        let mut pending = PendingResponse::staged("a\n\nb", vec!["a".into(), "b".into()], details(), Instant::now());
        pending.interrupt();
        assert!(pending.is_paused);
        assert_eq!(pending.confirmation_type, ConfirmationType::None);

        pending.resume(Instant::now());
        assert!(!pending.is_waiting_for_confirmation);
        assert_eq!(pending.confirmation_type, ConfirmationType::ScheduleCreate);
    }

    #[test]
    fn test_unanswered_question_goes_stale() {
        let start = Instant::now();
        let mut pending = PendingResponse::staged("ok?", vec![], details(), start);
        let idle = Duration::from_secs(30 * 60);
        assert!(!pending.is_stale(start + idle, idle));

        pending.finish_delivery();
        assert!(!pending.is_stale(start + Duration::from_secs(60), idle));
        assert!(pending.is_stale(start + idle, idle));
    }

    #[test]
    fn test_target_start_skips_cancel() {
        let start = DateTime::parse_from_rfc3339("2025-05-27T15:00:00-03:00").unwrap();
        assert_eq!(details().target_start(), Some(start));
        let cancel = EventDetails::Cancel {
            event_id: "ev1".into(),
            summary: "Ensaio".into(),
            start,
        };
        assert_eq!(cancel.target_start(), None);
    }

    #[test]
    fn test_plain_reply_finishes() {
        let mut pending = PendingResponse::new("oi", vec!["oi".into()], Instant::now());
        assert!(!pending.is_finished());
        pending.remaining_parts.clear();
        assert!(pending.is_finished());
    }
}
