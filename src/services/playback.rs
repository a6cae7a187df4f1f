//! Part-by-part delivery of a reply with simulated typing.

use std::sync::Arc;

use tokio::time::Instant;
use uuid::Uuid;

use crate::config::PacingConfig;
use crate::models::{EventDetails, PendingResponse};
use crate::services::batching::MessageBatcher;
use crate::services::messaging::{self, MessagingProvider};
use crate::services::segmentation;
use crate::services::store::SessionStore;

pub const CONTINUE_PROMPT: &str =
    "Vi que você mandou uma mensagem enquanto eu respondia. Quer que eu continue de onde parei?";

/// What the loop does next, decided atomically against the stored pending.
enum Step {
    Send(String),
    Interrupted,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    /// Stopped to ask whether to continue.
    Interrupted,
    /// Replaced by a newer reply or cleared by a resolution.
    Superseded,
    DeliveryFailed,
}

pub struct Playback {
    pacing: PacingConfig,
    messaging: Arc<dyn MessagingProvider>,
    pending: Arc<dyn SessionStore<PendingResponse>>,
    batcher: Arc<MessageBatcher>,
}

impl Playback {
    pub fn new(
        pacing: PacingConfig,
        messaging: Arc<dyn MessagingProvider>,
        pending: Arc<dyn SessionStore<PendingResponse>>,
        batcher: Arc<MessageBatcher>,
    ) -> Self {
        Self {
            pacing,
            messaging,
            pending,
            batcher,
        }
    }

    /// Segment `text`, replace any pending reply and play it back.
    pub async fn deliver(&self, user_id: &str, text: &str, details: Option<EventDetails>) -> PlaybackOutcome {
        let parts = segmentation::segment(text, self.pacing.segment_max_len);
        if parts.is_empty() {
            return PlaybackOutcome::Completed;
        }

        let now = Instant::now();
        let pending = match details {
            Some(details) => PendingResponse::staged(text, parts, details, now),
            None => PendingResponse::new(text, parts, now),
        };
        let id = pending.id;
        tracing::debug!(user = %user_id, parts = pending.remaining_parts.len(), staged = pending.is_staged(), "starting playback");
        self.pending.set(user_id, pending);

        self.run(user_id, id).await
    }

    /// Continue an interrupted reply after the user said yes.
    pub async fn resume(&self, user_id: &str) -> PlaybackOutcome {
        let mut resumed = None;
        let now = Instant::now();
        self.pending.update(user_id, &mut |slot| {
            if let Some(pending) = slot.as_mut() {
                pending.resume(now);
                resumed = Some(pending.id);
            }
        });
        match resumed {
            Some(id) => {
                tracing::info!(user = %user_id, "resuming playback");
                self.run(user_id, id).await
            }
            None => PlaybackOutcome::Superseded,
        }
    }

    async fn run(&self, user_id: &str, id: Uuid) -> PlaybackOutcome {
        loop {
            match self.next_step(user_id, id) {
                Step::Done => return PlaybackOutcome::Completed,
                Step::Interrupted => {
                    tracing::info!(user = %user_id, "playback interrupted by newer message");
                    if !messaging::deliver_text(self.messaging.as_ref(), user_id, CONTINUE_PROMPT).await {
                        self.drop_if_current(user_id, id);
                        return PlaybackOutcome::DeliveryFailed;
                    }
                    return PlaybackOutcome::Interrupted;
                }
                Step::Send(part) => {
                    messaging::typing_indicator(self.messaging.as_ref(), user_id, true).await;
                    tokio::time::sleep(segmentation::random_typing_duration(&part, &self.pacing)).await;

                    if !self.is_current(user_id, id) {
                        messaging::typing_indicator(self.messaging.as_ref(), user_id, false).await;
                        return PlaybackOutcome::Superseded;
                    }

                    let sent = messaging::deliver_text(self.messaging.as_ref(), user_id, &part).await;
                    messaging::typing_indicator(self.messaging.as_ref(), user_id, false).await;
                    if !sent {
                        self.drop_if_current(user_id, id);
                        return PlaybackOutcome::DeliveryFailed;
                    }

                    if self.mark_sent(user_id, id, part) {
                        tokio::time::sleep(segmentation::random_gap(&self.pacing)).await;
                    }
                }
            }
        }
    }

    fn next_step(&self, user_id: &str, id: Uuid) -> Step {
        let last_inbound = self.batcher.last_message_at(user_id);
        let mut step = Step::Done;

        self.pending.update(user_id, &mut |slot| {
            let Some(pending) = slot.as_mut() else {
                return;
            };
            if pending.id != id || pending.is_paused {
                return;
            }

            if pending.remaining_parts.is_empty() {
                pending.finish_delivery();
                if pending.is_finished() {
                    *slot = None;
                }
                return;
            }

            let newer_message = last_inbound.map(|t| t > pending.last_interaction).unwrap_or(false);
            if newer_message && !pending.sent_parts.is_empty() {
                pending.interrupt();
                step = Step::Interrupted;
                return;
            }

            step = Step::Send(pending.remaining_parts[0].clone());
        });

        step
    }

    /// Move the part to `sent_parts`; true when more parts remain.
    fn mark_sent(&self, user_id: &str, id: Uuid, part: String) -> bool {
        let mut more = false;
        let mut part = Some(part);
        self.pending.update(user_id, &mut |slot| {
            if let Some(pending) = slot.as_mut().filter(|p| p.id == id) {
                if !pending.remaining_parts.is_empty() {
                    pending.remaining_parts.remove(0);
                }
                pending.sent_parts.extend(part.take());
                pending.current_part_index += 1;
                more = !pending.remaining_parts.is_empty();
            }
        });
        more
    }

    fn is_current(&self, user_id: &str, id: Uuid) -> bool {
        self.pending.get(user_id).map(|p| p.id == id).unwrap_or(false)
    }

    fn drop_if_current(&self, user_id: &str, id: Uuid) {
        self.pending.update(user_id, &mut |slot| {
            if slot.as_ref().map(|p| p.id == id).unwrap_or(false) {
                *slot = None;
            }
        });
    }
}
