//! Candidate session slots and the short-lived cache of fetched events.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike};
use tokio::time::Instant;

use crate::models::CalendarEvent;
use crate::services::dates::Period;

pub const MORNING_SLOTS: [u32; 3] = [9, 10, 11];
pub const AFTERNOON_SLOTS: [u32; 4] = [14, 15, 16, 17];

pub const SLOT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

pub fn slot_hours(period: Option<Period>) -> Vec<u32> {
    match period {
        Some(Period::Morning) => MORNING_SLOTS.to_vec(),
        Some(Period::Afternoon) => AFTERNOON_SLOTS.to_vec(),
        None => MORNING_SLOTS.iter().chain(AFTERNOON_SLOTS.iter()).copied().collect(),
    }
}

pub fn period_of(time: NaiveTime) -> Period {
    if time.hour() < 12 {
        Period::Morning
    } else {
        Period::Afternoon
    }
}

pub fn local(offset: &FixedOffset, date: NaiveDate, time: NaiveTime) -> DateTime<FixedOffset> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .unwrap_or_else(|| offset.from_utc_datetime(&date.and_time(time)))
}

/// `[00:00, next 00:00)` of `date` in the studio offset.
pub fn day_bounds(offset: &FixedOffset, date: NaiveDate) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
    let start = local(offset, date, NaiveTime::MIN);
    (start, start + chrono::Duration::days(1))
}

/// Slot starts of `date` that are in the future and clash with no event.
pub fn free_slots(
    offset: &FixedOffset,
    date: NaiveDate,
    hours: &[u32],
    session: chrono::Duration,
    events: &[CalendarEvent],
    now: DateTime<FixedOffset>,
) -> Vec<DateTime<FixedOffset>> {
    hours
        .iter()
        .filter_map(|h| NaiveTime::from_hms_opt(*h, 0, 0))
        .map(|t| local(offset, date, t))
        .filter(|start| *start > now)
        .filter(|start| {
            let end = *start + session;
            !events.iter().any(|e| e.overlaps(start, &end))
        })
        .collect()
}

pub fn window_label(period: Option<Period>) -> &'static str {
    match period {
        Some(Period::Morning) => "morning",
        Some(Period::Afternoon) => "afternoon",
        None => "all",
    }
}

struct CachedEvents {
    fetched_at: Instant,
    events: Vec<CalendarEvent>,
}

/// Events per `user:date:window`, kept for [`SLOT_CACHE_TTL`].
pub struct SlotCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedEvents>>,
}

impl SlotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn key(user_id: &str, date: NaiveDate, period: Option<Period>) -> String {
        format!("{user_id}:{date}:{}", window_label(period))
    }

    pub fn get(&self, key: &str, now: Instant) -> Option<Vec<CalendarEvent>> {
        let entries = self.lock();
        entries
            .get(key)
            .filter(|c| now.saturating_duration_since(c.fetched_at) < self.ttl)
            .map(|c| c.events.clone())
    }

    pub fn put(&self, key: String, events: Vec<CalendarEvent>, now: Instant) {
        self.lock().insert(key, CachedEvents { fetched_at: now, events });
    }

    /// Drop every window of `date`, for all users.
    pub fn invalidate_date(&self, date: NaiveDate) {
        let needle = format!(":{date}:");
        self.lock().retain(|key, _| !key.contains(&needle));
    }

    pub fn evict_expired(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, c| now.saturating_duration_since(c.fetched_at) < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedEvents>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
