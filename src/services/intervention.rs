//! Admin-triggered global pause of autonomous replies.
//!
//! Each admin message escalates the pause one level (10, 45, then 60
//! minutes). The third level is a cap: further admin messages only report
//! what is left. Expiry is detected both by the periodic sweep and lazily on
//! the next inbound message.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

const LEVEL_DURATIONS: [Duration; 3] = [
    Duration::from_secs(10 * 60),
    Duration::from_secs(45 * 60),
    Duration::from_secs(60 * 60),
];

#[derive(Debug, Clone, Copy)]
struct Pause {
    level: u8,
    until: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseChange {
    Entered { level: u8, duration: Duration },
    Escalated { level: u8, duration: Duration },
    /// Already at the last level; nothing was extended.
    AtCap { remaining: Duration },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PauseStatus {
    pub paused: bool,
    pub level: Option<u8>,
    pub remaining_secs: Option<u64>,
}

#[derive(Default)]
pub struct InterventionController {
    pause: Mutex<Option<Pause>>,
}

impl InterventionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_admin_message(&self, now: Instant) -> PauseChange {
        let mut pause = self.lock();
        let current = pause.filter(|p| now < p.until);

        let change = match current {
            None => {
                let duration = LEVEL_DURATIONS[0];
                *pause = Some(Pause { level: 1, until: now + duration });
                PauseChange::Entered { level: 1, duration }
            }
            Some(p) if (p.level as usize) < LEVEL_DURATIONS.len() => {
                let level = p.level + 1;
                let duration = LEVEL_DURATIONS[level as usize - 1];
                *pause = Some(Pause { level, until: now + duration });
                PauseChange::Escalated { level, duration }
            }
            Some(p) => PauseChange::AtCap {
                remaining: p.until.saturating_duration_since(now),
            },
        };
        tracing::info!(change = ?change, "intervention pause updated");
        change
    }

    /// Clear an expired pause; true only on the call that cleared it.
    pub fn check_expiry(&self, now: Instant) -> bool {
        let mut pause = self.lock();
        match *pause {
            Some(p) if now >= p.until => {
                *pause = None;
                tracing::info!(level = p.level, "intervention pause expired");
                true
            }
            _ => false,
        }
    }

    pub fn is_paused(&self, now: Instant) -> bool {
        self.lock().map(|p| now < p.until).unwrap_or(false)
    }

    /// Lift the pause early; true when one was active.
    pub fn resume(&self) -> bool {
        let cleared = self.lock().take().is_some();
        if cleared {
            tracing::info!("intervention pause lifted by admin");
        }
        cleared
    }

    pub fn status(&self, now: Instant) -> PauseStatus {
        match self.lock().filter(|p| now < p.until) {
            Some(p) => PauseStatus {
                paused: true,
                level: Some(p.level),
                remaining_secs: Some(p.until.saturating_duration_since(now).as_secs()),
            },
            None => PauseStatus {
                paused: false,
                level: None,
                remaining_secs: None,
            },
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Pause>> {
        self.pause.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Whole minutes, rounded up.
pub fn minutes_label(duration: Duration) -> String {
    let minutes = duration.as_secs().div_ceil(60);
    if minutes == 1 {
        "1 minuto".to_string()
    } else {
        format!("{minutes} minutos")
    }
}
