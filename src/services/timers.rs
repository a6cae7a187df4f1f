use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
    Debounce,
    ConfirmationTimeout,
}

struct ArmedTimer {
    generation: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// At most one live timer per `(user, purpose)`.
#[derive(Clone, Default)]
pub struct TimerRegistry {
    timers: Arc<Mutex<HashMap<(String, TimerPurpose), ArmedTimer>>>,
    next_generation: Arc<AtomicU64>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any timer of the same purpose and run `on_fire` after `delay`.
    ///
    /// `on_fire` only runs if the timer is still the current one when the
    /// delay elapses; firing consumes the registry entry.
    pub fn arm<F, Fut>(&self, user_id: &str, purpose: TimerPurpose, delay: Duration, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + delay;
        let key = (user_id.to_string(), purpose);

        let mut timers = self.lock();
        if let Some(previous) = timers.remove(&key) {
            previous.handle.abort();
        }

        let registry = self.clone();
        let fire_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if registry.consume(&fire_key, generation) {
                // Detached: aborting this timer later must not abort the flush.
                tokio::spawn(on_fire());
            }
        });

        timers.insert(
            key,
            ArmedTimer {
                generation,
                deadline,
                handle,
            },
        );
    }

    pub fn cancel(&self, user_id: &str, purpose: TimerPurpose) -> bool {
        match self.lock().remove(&(user_id.to_string(), purpose)) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, user_id: &str, purpose: TimerPurpose) -> bool {
        self.lock().contains_key(&(user_id.to_string(), purpose))
    }

    /// Armed with a deadline at or before `now` but not yet consumed by its task.
    pub fn is_due(&self, user_id: &str, purpose: TimerPurpose, now: Instant) -> bool {
        self.lock()
            .get(&(user_id.to_string(), purpose))
            .map(|t| t.deadline <= now)
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    pub fn count_for(&self, user_id: &str, purpose: TimerPurpose) -> usize {
        self.lock()
            .keys()
            .filter(|(user, p)| user == user_id && *p == purpose)
            .count()
    }

    pub fn cancel_all(&self) {
        for (_, timer) in self.lock().drain() {
            timer.handle.abort();
        }
    }

    fn consume(&self, key: &(String, TimerPurpose), generation: u64) -> bool {
        let mut timers = self.lock();
        match timers.get(key) {
            Some(timer) if timer.generation == generation => {
                timers.remove(key);
                true
            }
            _ => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, TimerPurpose), ArmedTimer>> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let fired = fired.clone();
            registry.arm("u1", TimerPurpose::Debounce, Duration::from_secs(5), move || async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(registry.count_for("u1", TimerPurpose::Debounce), 1);
        }

        tokio::time::sleep(Duration::from_secs(6)).await;
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!registry.is_armed("u1", TimerPurpose::Debounce));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purposes_are_independent() {
        let registry = TimerRegistry::new();
        registry.arm("u1", TimerPurpose::Debounce, Duration::from_secs(5), || async {});
        registry.arm("u1", TimerPurpose::ConfirmationTimeout, Duration::from_secs(30), || async {});
        assert_eq!(registry.active_count(), 2);

        assert!(registry.cancel("u1", TimerPurpose::Debounce));
        assert!(!registry.cancel("u1", TimerPurpose::Debounce));
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_due_at_deadline() {
        let registry = TimerRegistry::new();
        let start = Instant::now();
        registry.arm("u1", TimerPurpose::Debounce, Duration::from_secs(5), || async {});

        assert!(!registry.is_due("u1", TimerPurpose::Debounce, start));
        assert!(!registry.is_due("u1", TimerPurpose::Debounce, start + Duration::from_millis(4999)));
        assert!(registry.is_due("u1", TimerPurpose::Debounce, start + Duration::from_secs(5)));
    }
}
