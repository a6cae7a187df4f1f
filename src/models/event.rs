use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    pub user_id: String,
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl CalendarEvent {
    /// Half-open interval overlap: touching intervals do not collide.
    pub fn overlaps(&self, start: &DateTime<FixedOffset>, end: &DateTime<FixedOffset>) -> bool {
        *start < self.end && *end > self.start
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewEvent {
    pub user_id: String,
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventPatch {
    pub summary: Option<String>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn event(start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            id: "e1".to_string(),
            user_id: "u1".to_string(),
            summary: "Ensaio".to_string(),
            description: None,
            start: at(start),
            end: at(end),
        }
    }

    #[test]
    fn test_overlap_inside() {
        let e = event("2025-05-27T10:00:00-03:00", "2025-05-27T11:00:00-03:00");
        assert!(e.overlaps(&at("2025-05-27T10:30:00-03:00"), &at("2025-05-27T11:30:00-03:00")));
    }

    #[test]
    fn test_adjacent_does_not_overlap() {
        let e = event("2025-05-27T10:00:00-03:00", "2025-05-27T11:00:00-03:00");
        assert!(!e.overlaps(&at("2025-05-27T11:00:00-03:00"), &at("2025-05-27T12:00:00-03:00")));
        assert!(!e.overlaps(&at("2025-05-27T09:00:00-03:00"), &at("2025-05-27T10:00:00-03:00")));
    }
}
