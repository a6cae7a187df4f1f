//! Scheduling dialog engine.
//!
//! Each marker kind has its own handler returning a [`DialogOutcome`]; the
//! engine only dispatches. Nothing is written to the calendar until a staged
//! action is confirmed through [`SchedulingEngine::commit`].

mod cancel;
mod create;
mod flexible;
mod followup;
mod list;
mod modify;
pub mod slots;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use rand::seq::SliceRandom;

use crate::models::conversation::context_keys;
use crate::models::{CalendarEvent, ConfirmationType, DialogState, EventDetails, EventPatch, NewEvent};
use crate::services::calendar::CalendarProvider;
use crate::services::dates;
use crate::services::markers::Marker;

use self::slots::SlotCache;

pub const SESSION_SUMMARY: &str = "Ensaio fotográfico";

/// Inputs every handler needs about the current turn.
pub struct DialogContext<'a> {
    pub user_id: &'a str,
    /// The user's merged batch, as typed.
    pub user_text: &'a str,
    pub now: DateTime<FixedOffset>,
}

impl DialogContext<'_> {
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn offset(&self) -> FixedOffset {
        *self.now.offset()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SetContext(&'static str, serde_json::Value),
    ClearContext(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogOutcome {
    pub next_state: Option<DialogState>,
    pub reply: String,
    /// Present when the reply asks the user to confirm an action.
    pub staged: Option<EventDetails>,
    pub effects: Vec<Effect>,
}

impl DialogOutcome {
    pub fn reply(reply: impl Into<String>) -> Self {
        Self {
            next_state: None,
            reply: reply.into(),
            staged: None,
            effects: Vec::new(),
        }
    }

    pub fn with_state(mut self, state: DialogState) -> Self {
        self.next_state = Some(state);
        self
    }

    pub fn staging(mut self, details: EventDetails) -> Self {
        self.staged = Some(details);
        self
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

pub struct SchedulingEngine {
    calendar: Arc<dyn CalendarProvider>,
    slot_cache: SlotCache,
    session: chrono::Duration,
}

impl SchedulingEngine {
    pub fn new(calendar: Arc<dyn CalendarProvider>, session_minutes: i64) -> Self {
        Self {
            calendar,
            slot_cache: SlotCache::new(slots::SLOT_CACHE_TTL),
            session: chrono::Duration::minutes(session_minutes),
        }
    }

    /// Run the handler for `marker`. `Marker::None` yields `None`.
    pub async fn handle(&self, marker: Marker, ctx: &DialogContext<'_>) -> anyhow::Result<Option<DialogOutcome>> {
        let outcome = match marker {
            Marker::Create { date, time } => create::handle(self, ctx, date, time).await?,
            Marker::Modify { old, new } => modify::handle(self, ctx, old, new).await?,
            Marker::Cancel { at } => cancel::handle(self, ctx, at).await?,
            Marker::List => list::handle(self, ctx).await?,
            Marker::Flexible => flexible::handle(self, ctx).await?,
            Marker::FollowUp { time, date, feedback } => {
                followup::handle(self, ctx, date, time, &feedback).await?
            }
            Marker::None => return Ok(None),
        };
        tracing::info!(
            user = %ctx.user_id,
            next_state = outcome.next_state.map(|s| s.as_str()).unwrap_or("-"),
            staged = outcome.staged.is_some(),
            "scheduling marker handled"
        );
        Ok(Some(outcome))
    }

    /// Write a confirmed action to the calendar; returns the user-facing confirmation.
    pub async fn commit(&self, user_id: &str, details: &EventDetails) -> anyhow::Result<String> {
        match details {
            EventDetails::Create { summary, start, end } => {
                let event = self
                    .calendar
                    .create_event(NewEvent {
                        user_id: user_id.to_string(),
                        summary: summary.clone(),
                        description: Some(format!("Agendado pelo WhatsApp ({user_id})")),
                        start: *start,
                        end: *end,
                    })
                    .await?;
                self.slot_cache.invalidate_date(start.date_naive());
                tracing::info!(user = %user_id, event_id = %event.id, "appointment committed");
                Ok(format!(
                    "Prontinho! Seu {} está confirmado para {} às {}. Qualquer coisa é só chamar!",
                    summary.to_lowercase(),
                    dates::format_day(start.date_naive()),
                    dates::format_time(start.time()),
                ))
            }
            EventDetails::Modify {
                event_id,
                summary,
                old_start,
                new_start,
                new_end,
            } => {
                self.calendar
                    .update_event(
                        event_id,
                        EventPatch {
                            start: Some(*new_start),
                            end: Some(*new_end),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.slot_cache.invalidate_date(old_start.date_naive());
                self.slot_cache.invalidate_date(new_start.date_naive());
                tracing::info!(user = %user_id, event_id = %event_id, "appointment moved");
                Ok(format!(
                    "Feito! Seu {} foi remarcado para {} às {}.",
                    summary.to_lowercase(),
                    dates::format_day(new_start.date_naive()),
                    dates::format_time(new_start.time()),
                ))
            }
            EventDetails::Cancel { event_id, summary, start } => {
                self.calendar.delete_event(event_id).await?;
                self.slot_cache.invalidate_date(start.date_naive());
                tracing::info!(user = %user_id, event_id = %event_id, "appointment cancelled");
                Ok(format!(
                    "Pronto, cancelei seu {} de {} às {}. Se quiser marcar outra data, é só me avisar.",
                    summary.to_lowercase(),
                    dates::format_day(start.date_naive()),
                    dates::format_time(start.time()),
                ))
            }
        }
    }

    pub fn evict_expired_slots(&self, now: tokio::time::Instant) -> usize {
        self.slot_cache.evict_expired(now)
    }

    pub fn calendar(&self) -> &Arc<dyn CalendarProvider> {
        &self.calendar
    }

    async fn events_for_day(&self, user_id: &str, date: NaiveDate, offset: &FixedOffset) -> anyhow::Result<Vec<CalendarEvent>> {
        let (from, to) = slots::day_bounds(offset, date);
        self.calendar.list_events_for_user(user_id, from, to).await
    }

    /// Studio-wide events of one day, through the slot cache.
    async fn busy_on(
        &self,
        user_id: &str,
        date: NaiveDate,
        period: Option<dates::Period>,
        offset: &FixedOffset,
    ) -> anyhow::Result<Vec<CalendarEvent>> {
        let key = SlotCache::key(user_id, date, period);
        let now = tokio::time::Instant::now();
        if let Some(events) = self.slot_cache.get(&key, now) {
            return Ok(events);
        }
        let (from, to) = slots::day_bounds(offset, date);
        let events = self.calendar.list_events_between(from, to).await?;
        self.slot_cache.put(key, events.clone(), now);
        Ok(events)
    }
}

/// What to say when the user declines a staged action.
pub fn discarded_message(kind: ConfirmationType) -> &'static str {
    match kind {
        ConfirmationType::ScheduleCreate => {
            "Tudo bem, não fiz o agendamento. Se quiser outro dia ou horário, é só me dizer!"
        }
        ConfirmationType::ScheduleModify => "Certo, mantive seu horário como estava.",
        ConfirmationType::ScheduleCancel => "Combinado, seu agendamento continua de pé.",
        ConfirmationType::None => "Tudo bem!",
    }
}

/// Ask again for a staged action without dropping it.
pub fn reprompt_message(details: &EventDetails) -> String {
    match details {
        EventDetails::Create { start, .. } => format!(
            "Só para confirmar: posso agendar seu ensaio para {} às {}? Responda sim ou não.",
            dates::format_day(start.date_naive()),
            dates::format_time(start.time()),
        ),
        EventDetails::Modify { new_start, .. } => format!(
            "Posso remarcar para {} às {}? Responda sim ou não.",
            dates::format_day(new_start.date_naive()),
            dates::format_time(new_start.time()),
        ),
        EventDetails::Cancel { start, .. } => format!(
            "Confirma o cancelamento de {} às {}? Responda sim ou não.",
            dates::format_day(start.date_naive()),
            dates::format_time(start.time()),
        ),
    }
}

pub(crate) fn pick<'a>(options: &[&'a str]) -> &'a str {
    options.choose(&mut rand::thread_rng()).copied().unwrap_or_default()
}

pub(crate) fn slot_effect(at: &DateTime<FixedOffset>) -> Effect {
    Effect::SetContext(
        context_keys::OFFERED_SLOT,
        serde_json::json!(at.naive_local().format("%Y-%m-%dT%H:%M").to_string()),
    )
}

pub(crate) fn selection_effects(at: &DateTime<FixedOffset>) -> [Effect; 2] {
    [
        Effect::SetContext(
            context_keys::SELECTED_DATE,
            serde_json::json!(at.date_naive().format("%Y-%m-%d").to_string()),
        ),
        Effect::SetContext(context_keys::SELECTED_TIME, serde_json::json!(dates::format_time(at.time()))),
    ]
}
