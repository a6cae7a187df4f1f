use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::CalendarEvent;

const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn to_utc_string(dt: &DateTime<FixedOffset>) -> String {
    dt.with_timezone(&Utc).format(UTC_FORMAT).to_string()
}

fn from_utc_string(s: &str, offset: &FixedOffset) -> anyhow::Result<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(s, UTC_FORMAT)?;
    Ok(naive.and_utc().with_timezone(offset))
}

// ── Events ──

pub fn insert_event(conn: &Connection, event: &CalendarEvent) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO events (id, user_id, summary, description, start_utc, end_utc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.id,
            event.user_id,
            event.summary,
            event.description,
            to_utc_string(&event.start),
            to_utc_string(&event.end),
        ],
    )?;
    Ok(())
}

pub fn get_event(
    conn: &Connection,
    id: &str,
    offset: &FixedOffset,
) -> anyhow::Result<Option<CalendarEvent>> {
    let result = conn.query_row(
        "SELECT id, user_id, summary, description, start_utc, end_utc FROM events WHERE id = ?1",
        params![id],
        |row| Ok(parse_event_row(row, offset)),
    );

    match result {
        Ok(event) => Ok(Some(event?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_events_for_user(
    conn: &Connection,
    user_id: &str,
    from: &DateTime<FixedOffset>,
    to: &DateTime<FixedOffset>,
    offset: &FixedOffset,
) -> anyhow::Result<Vec<CalendarEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, summary, description, start_utc, end_utc
         FROM events WHERE user_id = ?1 AND start_utc >= ?2 AND start_utc < ?3
         ORDER BY start_utc ASC",
    )?;

    let rows = stmt.query_map(
        params![user_id, to_utc_string(from), to_utc_string(to)],
        |row| Ok(parse_event_row(row, offset)),
    )?;

    let mut events = vec![];
    for row in rows {
        events.push(row??);
    }
    Ok(events)
}

/// Events overlapping `[from, to)`.
pub fn get_events_overlapping(
    conn: &Connection,
    from: &DateTime<FixedOffset>,
    to: &DateTime<FixedOffset>,
    offset: &FixedOffset,
) -> anyhow::Result<Vec<CalendarEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, summary, description, start_utc, end_utc
         FROM events WHERE start_utc < ?2 AND end_utc > ?1
         ORDER BY start_utc ASC",
    )?;

    let rows = stmt.query_map(params![to_utc_string(from), to_utc_string(to)], |row| {
        Ok(parse_event_row(row, offset))
    })?;

    let mut events = vec![];
    for row in rows {
        events.push(row??);
    }
    Ok(events)
}

pub fn update_event(conn: &Connection, event: &CalendarEvent) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE events SET summary = ?1, start_utc = ?2, end_utc = ?3 WHERE id = ?4",
        params![
            event.summary,
            to_utc_string(&event.start),
            to_utc_string(&event.end),
            event.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_event(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM events WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

fn parse_event_row(row: &rusqlite::Row, offset: &FixedOffset) -> anyhow::Result<CalendarEvent> {
    let start_str: String = row.get(4)?;
    let end_str: String = row.get(5)?;

    Ok(CalendarEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        summary: row.get(2)?,
        description: row.get(3)?,
        start: from_utc_string(&start_str, offset)?,
        end: from_utc_string(&end_str, offset)?,
    })
}

// ── Reminders ──

/// Records the reminder; false when one was already sent for the event.
pub fn mark_reminder_sent(conn: &Connection, event_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO reminders_sent (event_id) VALUES (?1)",
        params![event_id],
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    fn event(id: &str, user: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            user_id: user.to_string(),
            summary: "Ensaio fotográfico".to_string(),
            description: None,
            start: at(start),
            end: at(end),
        }
    }

    #[test]
    fn test_stored_in_utc_returned_in_offset() {
        let conn = setup_db();
        insert_event(&conn, &event("e1", "u1", "2025-05-27T15:00:00-03:00", "2025-05-27T16:00:00-03:00")).unwrap();

        let raw: String = conn
            .query_row("SELECT start_utc FROM events WHERE id = 'e1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(raw, "2025-05-27T18:00:00Z");

        let loaded = get_event(&conn, "e1", &brt()).unwrap().unwrap();
        assert_eq!(loaded.start, at("2025-05-27T15:00:00-03:00"));
        assert_eq!(loaded.start.offset(), &brt());
    }

    #[test]
    fn test_user_range_is_half_open() {
        let conn = setup_db();
        insert_event(&conn, &event("e1", "u1", "2025-05-27T09:00:00-03:00", "2025-05-27T10:00:00-03:00")).unwrap();
        insert_event(&conn, &event("e2", "u1", "2025-05-28T00:00:00-03:00", "2025-05-28T01:00:00-03:00")).unwrap();
        insert_event(&conn, &event("e3", "u2", "2025-05-27T11:00:00-03:00", "2025-05-27T12:00:00-03:00")).unwrap();

        let events = get_events_for_user(
            &conn,
            "u1",
            &at("2025-05-27T00:00:00-03:00"),
            &at("2025-05-28T00:00:00-03:00"),
            &brt(),
        )
        .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "e1");
    }

    #[test]
    fn test_overlapping_spans_users() {
        let conn = setup_db();
        insert_event(&conn, &event("e1", "u1", "2025-05-27T09:00:00-03:00", "2025-05-27T10:00:00-03:00")).unwrap();
        insert_event(&conn, &event("e2", "u2", "2025-05-27T14:00:00-03:00", "2025-05-27T15:00:00-03:00")).unwrap();

        let events = get_events_overlapping(
            &conn,
            &at("2025-05-27T09:30:00-03:00"),
            &at("2025-05-27T14:00:00-03:00"),
            &brt(),
        )
        .unwrap();
        assert_eq!(events.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["e1"]);
    }

    #[test]
    fn test_update_and_delete() {
        let conn = setup_db();
        let mut e = event("e1", "u1", "2025-05-27T09:00:00-03:00", "2025-05-27T10:00:00-03:00");
        insert_event(&conn, &e).unwrap();

        e.start = at("2025-05-28T10:00:00-03:00");
        e.end = at("2025-05-28T11:00:00-03:00");
        assert!(update_event(&conn, &e).unwrap());
        assert_eq!(get_event(&conn, "e1", &brt()).unwrap().unwrap().start, e.start);

        assert!(delete_event(&conn, "e1").unwrap());
        assert!(!delete_event(&conn, "e1").unwrap());
        assert!(get_event(&conn, "e1", &brt()).unwrap().is_none());
    }

    #[test]
    fn test_reminder_sent_once() {
        let conn = setup_db();
        assert!(mark_reminder_sent(&conn, "e1").unwrap());
        assert!(!mark_reminder_sent(&conn, "e1").unwrap());
    }
}
