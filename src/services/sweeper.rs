//! Periodic housekeeping owned by one background task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::services::orchestrator::Orchestrator;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const REMINDER_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Handle to the running sweep task.
pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Every minute: pause expiry, slot cache eviction, idle conversation
    /// reset. Every hour: appointment reminders.
    pub fn start(orchestrator: Arc<Orchestrator>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
            sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut reminders = tokio::time::interval(REMINDER_INTERVAL);
            reminders.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = sweep.tick() => orchestrator.sweep().await,
                    _ = reminders.tick() => {
                        if let Err(e) = orchestrator.dispatch_reminders().await {
                            tracing::error!(error = %e, "reminder dispatch failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        Self { shutdown_tx, handle }
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "sweeper task ended abnormally");
        }
    }
}
