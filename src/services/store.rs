//! Per-user session storage.
//!
//! Every piece of per-user orchestration state (conversation, pending reply,
//! message queue) lives behind a [`SessionStore`], so a persistent or shared
//! backend can replace the in-memory map without touching call sites.

use std::collections::HashMap;
use std::sync::Mutex;

pub trait SessionStore<V>: Send + Sync {
    fn get(&self, user_id: &str) -> Option<V>;

    fn set(&self, user_id: &str, value: V);

    fn delete(&self, user_id: &str) -> Option<V>;

    /// Atomic read-modify-write. Returning `None` from the slot removes the entry.
    fn update(&self, user_id: &str, f: &mut dyn FnMut(&mut Option<V>));

    fn keys(&self) -> Vec<String>;
}

pub struct InMemoryStore<V> {
    entries: Mutex<HashMap<String, V>>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, V>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send> SessionStore<V> for InMemoryStore<V> {
    fn get(&self, user_id: &str) -> Option<V> {
        self.lock().get(user_id).cloned()
    }

    fn set(&self, user_id: &str, value: V) {
        self.lock().insert(user_id.to_string(), value);
    }

    fn delete(&self, user_id: &str) -> Option<V> {
        self.lock().remove(user_id)
    }

    fn update(&self, user_id: &str, f: &mut dyn FnMut(&mut Option<V>)) {
        let mut entries = self.lock();
        let mut slot = entries.remove(user_id);
        f(&mut slot);
        if let Some(value) = slot {
            entries.insert(user_id.to_string(), value);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}
