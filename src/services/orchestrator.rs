//! Ties batching, dialog state, scheduling and playback together.
//!
//! Inbound messages are either answers to a waiting question (resolved right
//! away) or new content (queued and flushed by the debounce timer). A flush
//! merges the batch, runs it through the intent classifier and the reply
//! generator, hands any scheduling marker to the engine and plays the
//! resulting text back.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::PacingConfig;
use crate::errors::AppError;
use crate::models::conversation::context_keys;
use crate::models::{
    CalendarEvent, ConfirmationIntent, ConfirmationType, ConversationState, DialogState, EventDetails, Intent,
    PendingResponse, QueuedMessage,
};
use crate::services::ai::confirmation::ConfirmationResolver;
use crate::services::ai::reply::{self, ReplyContext};
use crate::services::ai::LlmProvider;
use crate::services::batching::{FlushReason, FlushSignal, MessageBatcher};
use crate::services::calendar::CalendarProvider;
use crate::services::clock::Clock;
use crate::services::conversation::ConversationTracker;
use crate::services::intent::{self, ACT_DIRECTLY, BYPASS_PIPELINE};
use crate::services::intervention::{self, InterventionController, PauseChange, PauseStatus};
use crate::services::markers::{self, Marker};
use crate::services::messaging::{self, MessagingProvider};
use crate::services::playback::Playback;
use crate::services::reminders::{self, ReminderDispatcher, ReminderRegistry};
use crate::services::scheduling::{self, DialogContext, DialogOutcome, Effect, SchedulingEngine};
use crate::services::store::{InMemoryStore, SessionStore};
use crate::services::timers::TimerRegistry;

const APOLOGY_TIMEOUT: &str =
    "Desculpe, estou demorando mais do que deveria para responder. Pode me mandar sua mensagem de novo daqui a pouco?";
const APOLOGY_FAILURE: &str = "Desculpe, tive um probleminha técnico agora. Pode tentar de novo em alguns minutos?";
const APOLOGY_CALENDAR: &str =
    "Desculpe, não consegui acessar a agenda agora. Pode tentar de novo em alguns minutos?";
const RESTATE: &str =
    "Não consegui entender direitinho o dia e o horário. Pode me dizer de novo, por exemplo \"dia 27 às 15h\"?";
const SLOT_PASSED: &str =
    "Esse horário já passou, então não consegui confirmar. Qual outro dia ou horário funciona para você?";
const PLAYBACK_DECLINED: &str = "Tudo bem! Se precisar de mais alguma coisa, é só chamar.";

const GREETINGS: &[&str] = &[
    "Oi! Tudo bem? Aqui é da {business}. Como posso te ajudar?",
    "Olá! Que bom falar com você. Em que posso ajudar hoje?",
    "Oi, tudo bem? Quer agendar um ensaio ou tirar alguma dúvida?",
];
const THANKS: &[&str] = &[
    "Imagina! Qualquer coisa é só chamar.",
    "Por nada! Estou por aqui se precisar.",
    "Eu que agradeço! Até mais.",
];
const FAREWELLS: &[&str] = &[
    "Até logo! Foi um prazer falar com você.",
    "Tchau! Quando quiser, é só chamar.",
    "Até mais! Um abraço da equipe {business}.",
];

/// Timing marks older than this are dropped for users with nothing queued.
const STALE_TIMING: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug)]
pub struct Settings {
    pub business_name: String,
    pub admin_id: Option<String>,
    pub pacing: PacingConfig,
    pub session_minutes: i64,
    pub idle_timeout: chrono::Duration,
}

/// External capabilities the orchestrator drives.
pub struct Collaborators {
    pub llm: Arc<dyn LlmProvider>,
    pub messaging: Arc<dyn MessagingProvider>,
    pub calendar: Arc<dyn CalendarProvider>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub pause: PauseStatus,
    pub active_timers: usize,
    pub pending_responses: usize,
    pub awaiting_reminders: usize,
}

pub struct Orchestrator {
    settings: Settings,
    clock: Arc<dyn Clock>,
    llm: Arc<dyn LlmProvider>,
    messaging: Arc<dyn MessagingProvider>,
    batcher: Arc<MessageBatcher>,
    playback: Playback,
    pending: Arc<dyn SessionStore<PendingResponse>>,
    conversations: ConversationTracker,
    engine: SchedulingEngine,
    resolver: ConfirmationResolver,
    intervention: InterventionController,
    reminders: ReminderDispatcher,
}

impl Orchestrator {
    pub fn new(deps: Collaborators, settings: Settings) -> (Arc<Self>, mpsc::UnboundedReceiver<FlushSignal>) {
        let pending: Arc<dyn SessionStore<PendingResponse>> = Arc::new(InMemoryStore::new());
        let conversations: Arc<dyn SessionStore<ConversationState>> = Arc::new(InMemoryStore::new());
        let queues: Arc<dyn SessionStore<Vec<QueuedMessage>>> = Arc::new(InMemoryStore::new());

        let (batcher, flush_rx) = MessageBatcher::new(settings.pacing.clone(), queues, TimerRegistry::new());
        let batcher = Arc::new(batcher);
        let playback = Playback::new(
            settings.pacing.clone(),
            deps.messaging.clone(),
            pending.clone(),
            batcher.clone(),
        );
        let reminders = ReminderDispatcher::new(
            deps.calendar.clone(),
            deps.messaging.clone(),
            Arc::new(ReminderRegistry::new()),
            settings.business_name.clone(),
        );

        let orchestrator = Self {
            clock: deps.clock,
            resolver: ConfirmationResolver::new(deps.llm.clone()),
            llm: deps.llm,
            messaging: deps.messaging,
            batcher,
            playback,
            pending,
            conversations: ConversationTracker::new(conversations, settings.idle_timeout),
            engine: SchedulingEngine::new(deps.calendar, settings.session_minutes),
            intervention: InterventionController::new(),
            reminders,
            settings,
        };
        (Arc::new(orchestrator), flush_rx)
    }

    /// Consume flush signals until every sender is gone. Each flush runs in
    /// its own task; the batcher's flush guard keeps one per user.
    pub async fn run_dispatcher(self: Arc<Self>, mut flush_rx: mpsc::UnboundedReceiver<FlushSignal>) {
        while let Some(signal) = flush_rx.recv().await {
            let this = self.clone();
            tokio::spawn(async move { this.process_flush(signal).await });
        }
        tracing::info!("flush dispatcher stopped");
    }

    pub async fn handle_inbound(&self, from: &str, body: &str, message_ref: Option<String>) {
        let body = body.trim();
        if body.is_empty() {
            return;
        }
        if let Some(r) = message_ref.as_deref() {
            self.messaging.remember_inbound(from, r);
        }

        let now = Instant::now();
        if self.intervention.check_expiry(now) {
            self.notify_admin("A pausa de intervenção terminou. Voltei a responder os clientes.").await;
        }

        if self.is_admin(from) {
            self.handle_admin(from, body, now).await;
            return;
        }

        if self.intervention.is_paused(now) {
            tracing::debug!(user = %from, "intervention pause active, message not processed");
            return;
        }

        let waiting = self.open_question(from, now);
        if let Some(pending) = waiting {
            if let Some(_guard) = self.batcher.begin_flush(from) {
                self.batcher.cancel_confirmation_timeout(from);
                self.resolve_pending(from, pending, body, message_ref).await;
            } else {
                self.batcher.enqueue(from, body, message_ref);
                return;
            }
            self.rearm_if_queued(from);
            return;
        }

        tracing::debug!(user = %from, intent = ?intent::classify(body).main_intent, "inbound message");
        self.batcher.enqueue(from, body, message_ref);
    }

    pub fn handle_typing(&self, from: &str) {
        self.batcher.on_typing(from);
    }

    pub async fn process_flush(&self, signal: FlushSignal) {
        let user_id = signal.user_id.as_str();
        let Some(_guard) = self.batcher.begin_flush(user_id) else {
            tracing::debug!(user = %user_id, "flush already in flight, retrying later");
            self.batcher.arm_debounce(user_id, self.settings.pacing.base_delay);
            return;
        };

        let batch = self.batcher.drain(user_id);
        if batch.is_empty() {
            return;
        }

        let now = Instant::now();
        if self.intervention.is_paused(now) {
            tracing::info!(user = %user_id, dropped = batch.len(), "intervention pause active, batch dropped");
            self.batcher.cancel_debounce(user_id);
            self.batcher.cancel_confirmation_timeout(user_id);
            return;
        }

        let waiting = self.open_question(user_id, now);
        if let Some(pending) = waiting {
            match signal.reason {
                FlushReason::Debounce => {
                    tracing::info!(user = %user_id, queued = batch.len(), "question still open, holding batch");
                    self.batcher.requeue_front(user_id, batch);
                    self.batcher.arm_confirmation_timeout(user_id);
                }
                FlushReason::ConfirmationTimeout => {
                    let (text, message_ref) = merge(batch);
                    tracing::info!(user = %user_id, "confirmation timeout, reading held batch as the answer");
                    self.resolve_pending(user_id, pending, &text, message_ref).await;
                }
            }
            return;
        }

        let (text, _) = merge(batch);
        tracing::info!(user = %user_id, len = text.len(), reason = ?signal.reason, "processing batch");
        self.process_batch(user_id, &text).await;
    }

    /// One downstream pass over a merged batch.
    pub async fn process_batch(&self, user_id: &str, text: &str) {
        let now = self.clock.now();
        let utc = now.with_timezone(&Utc);
        let previous_state = self.conversations.state_of(user_id);

        self.conversations.record(user_id, "user", text, utc);
        let classification = intent::classify(text);
        self.conversations.apply_intent(user_id, &classification, text, now.date_naive(), utc);

        if classification.confidence >= ACT_DIRECTLY {
            if let Some(attending) = reminders::attendance(classification.main_intent) {
                if let Some(reminder) = self.reminders.registry().outstanding_for(user_id) {
                    self.reminders.registry().remove(&reminder.event_id);
                    tracing::info!(user = %user_id, event_id = %reminder.event_id, attending, "reminder answered");
                    self.notify_admin(&reminders::admin_notice(&reminder, attending)).await;
                    self.respond(user_id, &reminders::acknowledgement(&reminder, attending), None).await;
                    return;
                }
            }
        }

        if let Some(quick) = self.quick_reply(text, classification.main_intent, classification.confidence) {
            tracing::debug!(user = %user_id, "quick reply");
            self.respond(user_id, &quick, None).await;
            return;
        }

        let ctx = DialogContext {
            user_id,
            user_text: text,
            now,
        };

        if previous_state == DialogState::SuggestingSlots && classification.is(Intent::Confirmation, ACT_DIRECTLY) {
            if let Some(slot) = self.offered_slot(user_id) {
                let marker = Marker::Create {
                    date: Some(slot.date()),
                    time: Some(slot.time()),
                };
                tracing::info!(user = %user_id, slot = %slot, "accepting offered slot");
                self.run_marker(user_id, marker, &ctx, None).await;
                return;
            }
        }

        let generated = match self.generate(user_id, text, now).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(user = %user_id, error = %e, "reply generation failed");
                let apology = match e {
                    AppError::UpstreamTimeout(_) => APOLOGY_TIMEOUT,
                    _ => APOLOGY_FAILURE,
                };
                self.apologize(user_id, apology).await;
                return;
            }
        };

        match markers::parse_marker(&generated) {
            Ok(Marker::None) => self.respond(user_id, &generated, None).await,
            Ok(marker) => {
                let stripped = markers::strip_markers(&generated);
                self.run_marker(user_id, marker, &ctx, Some(stripped)).await;
            }
            Err(e) => {
                let malformed = AppError::MalformedMarker(e.to_string());
                tracing::warn!(user = %user_id, error = %malformed, "stripping unusable marker");
                let stripped = markers::strip_markers(&generated);
                let text = if stripped.is_empty() { RESTATE } else { stripped.as_str() };
                self.respond(user_id, text, None).await;
            }
        }
    }

    /// Reminder for one appointment, recorded in the user's history.
    pub async fn send_reminder(&self, event: &CalendarEvent) -> anyhow::Result<bool> {
        let sent = self.reminders.send_reminder(event).await?;
        if sent {
            let body = reminders::reminder_message(event, &self.settings.business_name);
            self.conversations.record(&event.user_id, "assistant", &body, Utc::now());
        }
        Ok(sent)
    }

    pub async fn dispatch_reminders(&self) -> anyhow::Result<usize> {
        let now = self.clock.now();
        let pruned = self.reminders.registry().prune_past(now);
        if pruned > 0 {
            tracing::debug!(pruned, "past reminders forgotten");
        }
        let mut sent = 0;
        for event in self.reminders.due_events(now).await? {
            if self.send_reminder(&event).await? {
                sent += 1;
            }
        }
        if sent > 0 {
            tracing::info!(sent, "appointment reminders dispatched");
        }
        Ok(sent)
    }

    /// Housekeeping run by the minute sweep.
    pub async fn sweep(&self) {
        let now = Instant::now();
        if self.intervention.check_expiry(now) {
            self.notify_admin("A pausa de intervenção terminou. Voltei a responder os clientes.").await;
        }
        let evicted = self.engine.evict_expired_slots(now);
        let expired = self
            .pending
            .keys()
            .iter()
            .filter(|user_id| self.expire_if_stale(user_id, now))
            .count();
        let reset = self.conversations.reset_idle(self.clock.now().with_timezone(&Utc));
        let forgotten = self.batcher.evict_stale(now, STALE_TIMING);
        tracing::debug!(evicted, expired, reset, forgotten, "sweep finished");
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            pause: self.intervention.status(Instant::now()),
            active_timers: self.batcher.timers().active_count(),
            pending_responses: self.pending.keys().len(),
            awaiting_reminders: self.reminders.registry().awaiting_len(),
        }
    }

    pub fn resume_from_pause(&self) -> bool {
        self.intervention.resume()
    }

    pub fn conversation(&self, user_id: &str) -> Option<ConversationState> {
        self.conversations.get(user_id)
    }

    pub fn pending_for(&self, user_id: &str) -> Option<PendingResponse> {
        self.pending.get(user_id)
    }

    pub fn batcher(&self) -> &MessageBatcher {
        &self.batcher
    }

    async fn run_marker(&self, user_id: &str, marker: Marker, ctx: &DialogContext<'_>, fallback: Option<String>) {
        match self.engine.handle(marker, ctx).await {
            Ok(Some(outcome)) => self.apply_outcome(user_id, outcome).await,
            Ok(None) => {
                if let Some(text) = fallback.filter(|t| !t.is_empty()) {
                    self.respond(user_id, &text, None).await;
                }
            }
            Err(e) => {
                let e = AppError::Calendar(e.to_string());
                tracing::error!(user = %user_id, error = %e, "scheduling failed");
                self.apologize(user_id, APOLOGY_CALENDAR).await;
            }
        }
    }

    async fn apply_outcome(&self, user_id: &str, outcome: DialogOutcome) {
        let now = self.clock.now().with_timezone(&Utc);
        for effect in outcome.effects {
            match effect {
                Effect::SetContext(key, value) => self.conversations.set_context(user_id, key, value, now),
                Effect::ClearContext(key) => self.conversations.remove_context(user_id, key, now),
            }
        }
        if let Some(state) = outcome.next_state {
            self.conversations.transition(user_id, state, "scheduling", now);
        }
        self.respond(user_id, &outcome.reply, outcome.staged).await;
    }

    /// Answer to a waiting question. The caller holds the user's flush guard.
    async fn resolve_pending(&self, user_id: &str, pending: PendingResponse, text: &str, message_ref: Option<String>) {
        let now = self.clock.now().with_timezone(&Utc);
        let question = pending.sent_parts.last().map(String::as_str);
        let verdict = self.resolver.resolve(question, text).await;
        tracing::info!(user = %user_id, kind = ?pending.confirmation_type, verdict = ?verdict, "resolving open question");

        match (pending.confirmation_type, verdict) {
            (ConfirmationType::None, ConfirmationIntent::Confirmation) => {
                self.playback.resume(user_id).await;
            }
            (ConfirmationType::None, ConfirmationIntent::Rejection) => {
                self.pending.delete(user_id);
                self.conversations.record(user_id, "user", text, now);
                self.say(user_id, PLAYBACK_DECLINED).await;
            }
            (ConfirmationType::None, ConfirmationIntent::Confusion) => {
                self.pending.delete(user_id);
                self.batcher.enqueue(user_id, text, message_ref);
            }
            (_, ConfirmationIntent::Confirmation) => {
                self.pending.delete(user_id);
                self.conversations.record(user_id, "user", text, now);
                let Some(details) = pending.event_details else {
                    return;
                };
                self.commit(user_id, &details).await;
            }
            (kind, ConfirmationIntent::Rejection) => {
                self.pending.delete(user_id);
                self.conversations.record(user_id, "user", text, now);
                self.conversations.transition(user_id, DialogState::Initial, "staged action declined", now);
                self.respond(user_id, scheduling::discarded_message(kind), None).await;
            }
            (ConfirmationType::ScheduleCreate, ConfirmationIntent::Confusion) => {
                // A staged booking survives unrelated messages.
                self.conversations.record(user_id, "user", text, now);
                if let Some(details) = &pending.event_details {
                    self.say(user_id, &scheduling::reprompt_message(details)).await;
                }
            }
            (_, ConfirmationIntent::Confusion) => {
                self.pending.delete(user_id);
                self.batcher.enqueue(user_id, text, message_ref);
            }
        }
    }

    async fn commit(&self, user_id: &str, details: &EventDetails) {
        let local_now = self.clock.now();
        let now = local_now.with_timezone(&Utc);
        if details.target_start().map(|start| start <= local_now).unwrap_or(false) {
            tracing::info!(user = %user_id, "staged slot already passed, not committing");
            self.conversations.transition(user_id, DialogState::AwaitingDate, "staged slot passed", now);
            self.respond(user_id, SLOT_PASSED, None).await;
            return;
        }
        match self.engine.commit(user_id, details).await {
            Ok(confirmation) => {
                let next = match details {
                    EventDetails::Cancel { .. } => DialogState::Initial,
                    _ => DialogState::AppointmentConfirmed,
                };
                self.conversations.transition(user_id, next, "staged action committed", now);
                for key in [context_keys::SELECTED_DATE, context_keys::SELECTED_TIME, context_keys::OFFERED_SLOT] {
                    self.conversations.remove_context(user_id, key, now);
                }
                self.respond(user_id, &confirmation, None).await;
            }
            Err(e) => {
                let e = AppError::Calendar(e.to_string());
                tracing::error!(user = %user_id, error = %e, "commit failed");
                self.apologize(user_id, APOLOGY_CALENDAR).await;
            }
        }
    }

    async fn generate(&self, user_id: &str, text: &str, now: chrono::DateTime<chrono::FixedOffset>) -> Result<String, AppError> {
        let conversation = self.conversations.get(user_id);
        // The merged batch is passed separately; drop its copy from history.
        let mut history = conversation.as_ref().map(|c| c.messages.clone()).unwrap_or_default();
        history.pop();

        let mut notes = Vec::new();
        if let Some(slot) = self.offered_slot(user_id) {
            notes.push(format!("Último horário oferecido: {}", slot.format("%Y-%m-%d %H:%M")));
        }
        if let Some(date) = self.conversations.context(user_id, context_keys::MENTIONED_DATE) {
            notes.push(format!("Data mencionada pelo cliente: {}", date.as_str().unwrap_or_default()));
        }
        let ctx = ReplyContext {
            business_name: &self.settings.business_name,
            now,
            state: conversation.map(|c| c.current_state).unwrap_or(DialogState::Initial),
            notes,
        };

        let limit = self.settings.pacing.reply_timeout;
        match tokio::time::timeout(limit, reply::generate_reply(self.llm.as_ref(), &history, text, &ctx)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(AppError::Ai(e.to_string())),
            Err(_) => Err(AppError::UpstreamTimeout(limit.as_secs())),
        }
    }

    fn quick_reply(&self, text: &str, intent: Option<Intent>, confidence: f32) -> Option<String> {
        if confidence < BYPASS_PIPELINE || text.trim().lines().count() > 1 {
            return None;
        }
        let options = match intent? {
            Intent::Greeting => GREETINGS,
            Intent::Thanks => THANKS,
            Intent::Farewell => FAREWELLS,
            _ => return None,
        };
        Some(scheduling::pick(options).replace("{business}", &self.settings.business_name))
    }

    fn offered_slot(&self, user_id: &str) -> Option<NaiveDateTime> {
        let value = self.conversations.context(user_id, context_keys::OFFERED_SLOT)?;
        NaiveDateTime::parse_from_str(value.as_str()?, "%Y-%m-%dT%H:%M").ok()
    }

    async fn handle_admin(&self, from: &str, body: &str, now: Instant) {
        let command = body.trim().to_lowercase();
        let reply = if command.starts_with('#') {
            match command.as_str() {
                "#status" => status_text(&self.intervention.status(now)),
                "#retomar" | "#resume" => {
                    if self.intervention.resume() {
                        "Pausa encerrada. Voltei a responder os clientes.".to_string()
                    } else {
                        "Não havia pausa ativa.".to_string()
                    }
                }
                _ => "Comandos: #status, #retomar".to_string(),
            }
        } else {
            match self.intervention.on_admin_message(now) {
                PauseChange::Entered { duration, .. } => format!(
                    "Entendido, vou pausar as respostas automáticas por {}.",
                    intervention::minutes_label(duration)
                ),
                PauseChange::Escalated { level, duration } => format!(
                    "Pausa estendida (nível {level}): mais {} sem respostas automáticas.",
                    intervention::minutes_label(duration)
                ),
                PauseChange::AtCap { remaining } => format!(
                    "A pausa já está no máximo. Restam {}.",
                    intervention::minutes_label(remaining)
                ),
            }
        };
        messaging::deliver_text(self.messaging.as_ref(), from, &reply).await;
    }

    fn is_admin(&self, from: &str) -> bool {
        self.settings
            .admin_id
            .as_deref()
            .map(|admin| same_identity(admin, from))
            .unwrap_or(false)
    }

    async fn notify_admin(&self, text: &str) {
        if let Some(admin) = self.settings.admin_id.as_deref() {
            messaging::deliver_text(self.messaging.as_ref(), admin, text).await;
        }
    }

    /// Play back `text`, recording it in the conversation.
    async fn respond(&self, user_id: &str, text: &str, staged: Option<EventDetails>) {
        self.conversations
            .record(user_id, "assistant", text, self.clock.now().with_timezone(&Utc));
        let outcome = self.playback.deliver(user_id, text, staged).await;
        tracing::debug!(user = %user_id, outcome = ?outcome, "reply delivered");
    }

    /// Single message without playback; leaves any pending reply untouched.
    async fn say(&self, user_id: &str, text: &str) {
        self.conversations
            .record(user_id, "assistant", text, self.clock.now().with_timezone(&Utc));
        messaging::deliver_text(self.messaging.as_ref(), user_id, text).await;
    }

    async fn apologize(&self, user_id: &str, text: &str) {
        self.pending.delete(user_id);
        self.conversations.clear(user_id, self.clock.now().with_timezone(&Utc));
        messaging::deliver_text(self.messaging.as_ref(), user_id, text).await;
    }

    /// The question the user still owes an answer to, if it is not stale.
    fn open_question(&self, user_id: &str, now: Instant) -> Option<PendingResponse> {
        let pending = self.pending.get(user_id).filter(|p| p.is_waiting_for_confirmation)?;
        if self.expire_if_stale(user_id, now) {
            return None;
        }
        Some(pending)
    }

    /// Drop a question left unanswered for longer than the idle timeout.
    fn expire_if_stale(&self, user_id: &str, now: Instant) -> bool {
        let max_idle = self.settings.idle_timeout.to_std().unwrap_or(Duration::MAX);
        let mut expired = None;
        self.pending.update(user_id, &mut |slot| {
            if slot.as_ref().map(|p| p.is_stale(now, max_idle)).unwrap_or(false) {
                expired = slot.take();
            }
        });
        let Some(pending) = expired else {
            return false;
        };
        self.batcher.cancel_confirmation_timeout(user_id);
        self.conversations.transition(
            user_id,
            DialogState::Initial,
            "open question expired",
            self.clock.now().with_timezone(&Utc),
        );
        tracing::info!(user = %user_id, kind = ?pending.confirmation_type, "unanswered question expired");
        true
    }

    fn rearm_if_queued(&self, user_id: &str) {
        if self.batcher.has_queued(user_id) {
            self.batcher.arm_debounce(user_id, self.settings.pacing.base_delay);
        }
    }
}

/// Contents joined by newline in arrival order, plus the latest message ref.
fn merge(batch: Vec<QueuedMessage>) -> (String, Option<String>) {
    let message_ref = batch.iter().rev().find_map(|m| m.raw_ref.clone());
    let text = batch.into_iter().map(|m| m.content).collect::<Vec<_>>().join("\n");
    (text, message_ref)
}

/// Compare identities by their digits, ignoring `whatsapp:` and `+`.
fn same_identity(a: &str, b: &str) -> bool {
    let digits = |s: &str| s.chars().filter(char::is_ascii_digit).collect::<String>();
    let (a, b) = (digits(a), digits(b));
    !a.is_empty() && a == b
}

fn status_text(status: &PauseStatus) -> String {
    match (status.paused, status.level, status.remaining_secs) {
        (true, Some(level), Some(secs)) => format!(
            "Pausa ativa (nível {level}), restam {}.",
            intervention::minutes_label(Duration::from_secs(secs))
        ),
        _ => "Sem pausa ativa. Estou respondendo os clientes normalmente.".to_string(),
    }
}
