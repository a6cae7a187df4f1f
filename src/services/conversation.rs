use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::conversation::context_keys;
use crate::models::{Classification, ConversationMessage, ConversationState, DialogState, Intent};
use crate::services::dates;
use crate::services::intent::ACT_DIRECTLY;
use crate::services::store::SessionStore;

/// Per-user dialog phase, history and context facts.
pub struct ConversationTracker {
    store: Arc<dyn SessionStore<ConversationState>>,
    idle_timeout: chrono::Duration,
}

impl ConversationTracker {
    pub fn new(store: Arc<dyn SessionStore<ConversationState>>, idle_timeout: chrono::Duration) -> Self {
        Self { store, idle_timeout }
    }

    pub fn get(&self, user_id: &str) -> Option<ConversationState> {
        self.store.get(user_id)
    }

    pub fn state_of(&self, user_id: &str) -> DialogState {
        self.store
            .get(user_id)
            .map(|c| c.current_state)
            .unwrap_or(DialogState::Initial)
    }

    /// Run `f` on the user's conversation, creating it on first use.
    pub fn with(&self, user_id: &str, now: DateTime<Utc>, f: impl FnOnce(&mut ConversationState)) {
        let mut f = Some(f);
        self.store.update(user_id, &mut |slot| {
            let conv = slot.get_or_insert_with(|| ConversationState::new(user_id, now));
            if let Some(f) = f.take() {
                f(conv);
            }
        });
    }

    pub fn record(&self, user_id: &str, role: &str, content: &str, now: DateTime<Utc>) {
        self.with(user_id, now, |conv| {
            conv.push_message(role, content);
            conv.last_update_time = now;
        });
    }

    pub fn history(&self, user_id: &str) -> Vec<ConversationMessage> {
        self.store.get(user_id).map(|c| c.messages).unwrap_or_default()
    }

    pub fn transition(&self, user_id: &str, to: DialogState, reason: &str, now: DateTime<Utc>) {
        self.with(user_id, now, |conv| {
            if conv.current_state != to {
                tracing::debug!(user = %user_id, from = conv.current_state.as_str(), to = to.as_str(), reason, "dialog transition");
            }
            conv.transition(to, reason, now);
        });
    }

    pub fn set_context(&self, user_id: &str, key: &str, value: serde_json::Value, now: DateTime<Utc>) {
        self.with(user_id, now, |conv| {
            conv.context.insert(key.to_string(), value);
        });
    }

    pub fn context(&self, user_id: &str, key: &str) -> Option<serde_json::Value> {
        self.store.get(user_id).and_then(|c| c.context.get(key).cloned())
    }

    pub fn remove_context(&self, user_id: &str, key: &str, now: DateTime<Utc>) {
        self.with(user_id, now, |conv| {
            conv.context.remove(key);
        });
    }

    /// Move the dialog along for a classification the caller trusts.
    pub fn apply_intent(
        &self,
        user_id: &str,
        classification: &Classification,
        text: &str,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) {
        let Some(intent) = classification.main_intent else {
            return;
        };
        if classification.confidence < ACT_DIRECTLY {
            return;
        }

        let mentioned = dates::extract_date(text, today);
        let has_time = dates::extract_time(text).is_some();

        self.with(user_id, now, |conv| {
            if let Some(date) = mentioned {
                conv.context.insert(
                    context_keys::MENTIONED_DATE.to_string(),
                    serde_json::json!(date.format("%Y-%m-%d").to_string()),
                );
            }

            let next = match intent {
                Intent::Greeting => Some(DialogState::Greeting),
                Intent::Farewell => Some(DialogState::Farewell),
                Intent::Schedule if mentioned.is_none() => Some(DialogState::AwaitingDate),
                Intent::Schedule if !has_time => Some(DialogState::AwaitingTime),
                Intent::Reschedule => Some(DialogState::SelectingAppointmentToModify),
                Intent::Cancel => Some(DialogState::SelectingAppointmentToCancel),
                Intent::List => Some(DialogState::ListingAppointments),
                _ => None,
            };
            if let Some(next) = next {
                conv.transition(next, classification.context.unwrap_or("intent"), now);
            } else {
                conv.last_update_time = now;
            }
        });
    }

    /// Reset (not delete) conversations idle longer than the timeout.
    pub fn reset_idle(&self, now: DateTime<Utc>) -> usize {
        let mut reset = 0;
        for user_id in self.store.keys() {
            self.store.update(&user_id, &mut |slot| {
                if let Some(conv) = slot.as_mut() {
                    if conv.current_state != DialogState::Initial && conv.is_idle_since(now, self.idle_timeout) {
                        conv.reset(now);
                        reset += 1;
                    }
                }
            });
        }
        if reset > 0 {
            tracing::info!(count = reset, "reset idle conversations");
        }
        reset
    }

    pub fn clear(&self, user_id: &str, now: DateTime<Utc>) {
        self.with(user_id, now, |conv| conv.reset(now));
    }
}
