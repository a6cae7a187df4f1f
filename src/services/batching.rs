//! Per-user debounce queue.
//!
//! Inbound messages are buffered and a single flush is signalled after an
//! adaptive delay. Timers never process anything themselves: firing sends a
//! [`FlushSignal`] to whoever owns the receiver.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::PacingConfig;
use crate::models::QueuedMessage;
use crate::services::store::{InMemoryStore, SessionStore};
use crate::services::timers::{TimerPurpose, TimerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Debounce,
    ConfirmationTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushSignal {
    pub user_id: String,
    pub reason: FlushReason,
}

/// Delay before flushing, given the previous message and typing signal times.
pub fn compute_delay(
    pacing: &PacingConfig,
    now: Instant,
    last_message: Option<Instant>,
    last_typing: Option<Instant>,
) -> Duration {
    if let Some(typing) = last_typing {
        if now.saturating_duration_since(typing) < pacing.typing_window {
            return pacing.typing_reset_delay;
        }
    }
    if let Some(last) = last_message {
        if now.saturating_duration_since(last) < pacing.rapid_threshold {
            return pacing.max_delay;
        }
    }
    pacing.base_delay
}

pub struct MessageBatcher {
    pacing: PacingConfig,
    queues: Arc<dyn SessionStore<Vec<QueuedMessage>>>,
    last_message: InMemoryStore<Instant>,
    last_typing: InMemoryStore<Instant>,
    timers: TimerRegistry,
    flushing: Arc<Mutex<HashSet<String>>>,
    flush_tx: mpsc::UnboundedSender<FlushSignal>,
}

impl MessageBatcher {
    pub fn new(
        pacing: PacingConfig,
        queues: Arc<dyn SessionStore<Vec<QueuedMessage>>>,
        timers: TimerRegistry,
    ) -> (Self, mpsc::UnboundedReceiver<FlushSignal>) {
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        let batcher = Self {
            pacing,
            queues,
            last_message: InMemoryStore::new(),
            last_typing: InMemoryStore::new(),
            timers,
            flushing: Arc::new(Mutex::new(HashSet::new())),
            flush_tx,
        };
        (batcher, flush_rx)
    }

    pub fn enqueue(&self, user_id: &str, content: &str, raw_ref: Option<String>) {
        self.enqueue_at(user_id, content, raw_ref, Instant::now());
    }

    pub fn enqueue_at(&self, user_id: &str, content: &str, raw_ref: Option<String>, now: Instant) {
        let message = QueuedMessage {
            content: content.to_string(),
            timestamp: now,
            raw_ref,
        };
        self.queues.update(user_id, &mut |slot| {
            slot.get_or_insert_with(Vec::new).push(message.clone());
        });

        let previous = self.last_message.get(user_id);
        self.last_message.set(user_id, now);

        // Expired but unconsumed timer: the message rides along with that flush.
        if self.timers.is_due(user_id, TimerPurpose::Debounce, now) {
            tracing::debug!(user = %user_id, "message joined due batch");
            return;
        }

        let delay = compute_delay(&self.pacing, now, previous, self.last_typing.get(user_id));
        tracing::debug!(user = %user_id, delay_ms = delay.as_millis() as u64, "message queued");
        self.arm_debounce(user_id, delay);
    }

    /// "User is typing": postpone a pending flush without draining early.
    pub fn on_typing(&self, user_id: &str) {
        self.on_typing_at(user_id, Instant::now());
    }

    pub fn on_typing_at(&self, user_id: &str, now: Instant) {
        self.last_typing.set(user_id, now);
        if !self.has_queued(user_id) {
            return;
        }
        let delay = compute_delay(&self.pacing, now, self.last_message.get(user_id), Some(now));
        tracing::debug!(user = %user_id, delay_ms = delay.as_millis() as u64, "typing, debounce re-armed");
        self.arm_debounce(user_id, delay);
    }

    pub fn arm_debounce(&self, user_id: &str, delay: Duration) {
        let tx = self.flush_tx.clone();
        let user = user_id.to_string();
        self.timers.arm(user_id, TimerPurpose::Debounce, delay, move || async move {
            let _ = tx.send(FlushSignal {
                user_id: user,
                reason: FlushReason::Debounce,
            });
        });
    }

    pub fn arm_confirmation_timeout(&self, user_id: &str) {
        let tx = self.flush_tx.clone();
        let user = user_id.to_string();
        self.timers.arm(
            user_id,
            TimerPurpose::ConfirmationTimeout,
            self.pacing.confirmation_timeout,
            move || async move {
                let _ = tx.send(FlushSignal {
                    user_id: user,
                    reason: FlushReason::ConfirmationTimeout,
                });
            },
        );
    }

    pub fn cancel_debounce(&self, user_id: &str) -> bool {
        self.timers.cancel(user_id, TimerPurpose::Debounce)
    }

    pub fn cancel_confirmation_timeout(&self, user_id: &str) -> bool {
        self.timers.cancel(user_id, TimerPurpose::ConfirmationTimeout)
    }

    /// Empty the queue before any processing starts.
    pub fn drain(&self, user_id: &str) -> Vec<QueuedMessage> {
        self.queues.delete(user_id).unwrap_or_default()
    }

    /// Put a drained batch back ahead of anything that arrived meanwhile.
    pub fn requeue_front(&self, user_id: &str, mut batch: Vec<QueuedMessage>) {
        if batch.is_empty() {
            return;
        }
        self.queues.update(user_id, &mut |slot| {
            let newer = slot.take().unwrap_or_default();
            let mut merged = std::mem::take(&mut batch);
            merged.extend(newer);
            *slot = Some(merged);
        });
    }

    pub fn has_queued(&self, user_id: &str) -> bool {
        self.queues.get(user_id).map(|q| !q.is_empty()).unwrap_or(false)
    }

    pub fn queued_len(&self, user_id: &str) -> usize {
        self.queues.get(user_id).map(|q| q.len()).unwrap_or(0)
    }

    pub fn last_message_at(&self, user_id: &str) -> Option<Instant> {
        self.last_message.get(user_id)
    }

    /// Claim the single flush slot for a user; `None` while one is in flight.
    pub fn begin_flush(&self, user_id: &str) -> Option<FlushGuard> {
        let mut flushing = self.flushing.lock().unwrap_or_else(|e| e.into_inner());
        if !flushing.insert(user_id.to_string()) {
            return None;
        }
        Some(FlushGuard {
            flushing: self.flushing.clone(),
            user_id: user_id.to_string(),
        })
    }

    pub fn is_flushing(&self, user_id: &str) -> bool {
        self.flushing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(user_id)
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// Forget timing marks older than `max_age` for users with nothing queued.
    pub fn evict_stale(&self, now: Instant, max_age: Duration) -> usize {
        let mut evicted = 0;
        for user_id in self.last_message.keys() {
            let stale = self
                .last_message
                .get(&user_id)
                .map(|t| now.saturating_duration_since(t) >= max_age)
                .unwrap_or(false);
            if stale && !self.has_queued(&user_id) {
                self.last_message.delete(&user_id);
                self.last_typing.delete(&user_id);
                evicted += 1;
            }
        }
        evicted
    }
}

/// Releases the user's flush slot when dropped.
pub struct FlushGuard {
    flushing: Arc<Mutex<HashSet<String>>>,
    user_id: String,
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        self.flushing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.user_id);
    }
}
