use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATE_HISTORY_LIMIT: usize = 10;
pub const MESSAGE_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogState {
    Initial,
    Greeting,
    AwaitingDate,
    AwaitingTime,
    SuggestingSlots,
    ConfirmingAppointment,
    AppointmentConfirmed,
    ListingAppointments,
    SelectingAppointmentToModify,
    SelectingAppointmentToCancel,
    ConfirmingCancellation,
    AwaitingNewDateTime,
    ConfirmingModification,
    HandlingComplaint,
    Farewell,
    Idle,
}

impl DialogState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogState::Initial => "INITIAL",
            DialogState::Greeting => "GREETING",
            DialogState::AwaitingDate => "AWAITING_DATE",
            DialogState::AwaitingTime => "AWAITING_TIME",
            DialogState::SuggestingSlots => "SUGGESTING_SLOTS",
            DialogState::ConfirmingAppointment => "CONFIRMING_APPOINTMENT",
            DialogState::AppointmentConfirmed => "APPOINTMENT_CONFIRMED",
            DialogState::ListingAppointments => "LISTING_APPOINTMENTS",
            DialogState::SelectingAppointmentToModify => "SELECTING_APPOINTMENT_TO_MODIFY",
            DialogState::SelectingAppointmentToCancel => "SELECTING_APPOINTMENT_TO_CANCEL",
            DialogState::ConfirmingCancellation => "CONFIRMING_CANCELLATION",
            DialogState::AwaitingNewDateTime => "AWAITING_NEW_DATE_TIME",
            DialogState::ConfirmingModification => "CONFIRMING_MODIFICATION",
            DialogState::HandlingComplaint => "HANDLING_COMPLAINT",
            DialogState::Farewell => "FAREWELL",
            DialogState::Idle => "IDLE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: DialogState,
    pub to: DialogState,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

/// Well-known keys of [`ConversationState::context`].
pub mod context_keys {
    pub const MENTIONED_DATE: &str = "mentioned_date";
    pub const SELECTED_DATE: &str = "selected_date";
    pub const SELECTED_TIME: &str = "selected_time";
    pub const OFFERED_SLOT: &str = "offered_slot";
    pub const APPOINTMENTS: &str = "appointments";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: String,
    pub current_state: DialogState,
    pub previous_state: Option<DialogState>,
    pub state_history: VecDeque<StateTransition>,
    pub context: HashMap<String, serde_json::Value>,
    pub messages: Vec<ConversationMessage>,
    /// History carried over from before the last idle reset.
    pub previous_history: Vec<StateTransition>,
    pub last_update_time: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            current_state: DialogState::Initial,
            previous_state: None,
            state_history: VecDeque::with_capacity(STATE_HISTORY_LIMIT),
            context: HashMap::new(),
            messages: Vec::new(),
            previous_history: Vec::new(),
            last_update_time: now,
        }
    }

    pub fn transition(&mut self, to: DialogState, reason: &str, now: DateTime<Utc>) {
        let from = self.current_state;
        if self.state_history.len() == STATE_HISTORY_LIMIT {
            self.state_history.pop_front();
        }
        self.state_history.push_back(StateTransition {
            from,
            to,
            reason: reason.to_string(),
            at: now,
        });
        self.previous_state = Some(from);
        self.current_state = to;
        self.last_update_time = now;
    }

    pub fn push_message(&mut self, role: &str, content: &str) {
        self.messages.push(ConversationMessage {
            role: role.to_string(),
            content: content.to_string(),
        });
        if self.messages.len() > MESSAGE_HISTORY_LIMIT {
            let excess = self.messages.len() - MESSAGE_HISTORY_LIMIT;
            self.messages.drain(..excess);
        }
    }

    /// Back to `Initial`, keeping what happened before in `previous_history`.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.previous_history.extend(self.state_history.drain(..));
        if self.previous_history.len() > STATE_HISTORY_LIMIT {
            let excess = self.previous_history.len() - STATE_HISTORY_LIMIT;
            self.previous_history.drain(..excess);
        }
        self.previous_state = Some(self.current_state);
        self.current_state = DialogState::Initial;
        self.context.clear();
        self.messages.clear();
        self.last_update_time = now;
    }

    pub fn is_idle_since(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - self.last_update_time >= timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let now = Utc::now();
        let mut conv = ConversationState::new("u1", now);
        for i in 0..15 {
            let to = if i % 2 == 0 { DialogState::AwaitingDate } else { DialogState::Idle };
            conv.transition(to, "test", now);
        }
        assert_eq!(conv.state_history.len(), STATE_HISTORY_LIMIT);
        assert_eq!(conv.current_state, DialogState::AwaitingDate);
        assert_eq!(conv.previous_state, Some(DialogState::Idle));
    }

    #[test]
    fn test_reset_preserves_history() {
        let now = Utc::now();
        let mut conv = ConversationState::new("u1", now);
        conv.transition(DialogState::Greeting, "greeting", now);
        conv.transition(DialogState::AwaitingDate, "schedule", now);
        conv.context
            .insert(context_keys::MENTIONED_DATE.to_string(), serde_json::json!("2025-05-27"));
        conv.push_message("user", "oi");

        conv.reset(now);

        assert_eq!(conv.current_state, DialogState::Initial);
        assert!(conv.state_history.is_empty());
        assert_eq!(conv.previous_history.len(), 2);
        assert!(conv.context.is_empty());
        assert!(conv.messages.is_empty());
    }

    #[test]
    fn test_previous_history_is_bounded_across_resets() {
        let now = Utc::now();
        let mut conv = ConversationState::new("u1", now);
        for round in 0..8 {
            conv.transition(DialogState::AwaitingDate, &format!("round {round}"), now);
            conv.transition(DialogState::AwaitingTime, &format!("round {round}"), now);
            conv.reset(now);
        }
        assert_eq!(conv.previous_history.len(), STATE_HISTORY_LIMIT);
        assert_eq!(conv.previous_history.last().map(|t| t.reason.as_str()), Some("round 7"));
    }

    #[test]
    fn test_message_history_is_bounded() {
        let mut conv = ConversationState::new("u1", Utc::now());
        for i in 0..30 {
            conv.push_message("user", &format!("msg {i}"));
        }
        assert_eq!(conv.messages.len(), MESSAGE_HISTORY_LIMIT);
        assert_eq!(conv.messages[0].content, "msg 10");
    }
}
