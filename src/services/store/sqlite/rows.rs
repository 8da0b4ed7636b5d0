use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::event::CalendarEvent;

const COLUMNS: &str = "id, summary, start_datetime, end_datetime, color_id, recurrence,
     recurrence_exceptions, recurring_event_id, original_start_time";

/// One row of the events table: an event plus the series exceptions kept
/// alongside it.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct StoredEvent {
    pub event: CalendarEvent,
    /// Original starts removed from a series (deleted or detached instances).
    pub exceptions: Vec<DateTime<Local>>,
}

impl StoredEvent {
    pub fn new(event: CalendarEvent) -> Self {
        Self {
            event,
            exceptions: Vec::new(),
        }
    }
}

pub(super) fn to_utc_text(value: DateTime<Local>) -> String {
    value
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn to_local_datetime(index: usize, value: String) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn serialize_recurrence(lines: &[String]) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    serde_json::to_string(lines).ok()
}

fn serialize_exceptions(exceptions: &[DateTime<Local>]) -> Option<String> {
    if exceptions.is_empty() {
        return None;
    }
    let serialized: Vec<String> = exceptions.iter().map(|dt| to_utc_text(*dt)).collect();
    serde_json::to_string(&serialized).ok()
}

fn deserialize_list(index: usize, json: Option<String>) -> rusqlite::Result<Vec<String>> {
    let Some(json) = json else {
        return Ok(Vec::new());
    };
    serde_json::from_str(&json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn map_event_row(row: &Row) -> rusqlite::Result<StoredEvent> {
    let exceptions = deserialize_list(6, row.get(6)?)?
        .into_iter()
        .map(|value| to_local_datetime(6, value))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let original_start_time = row
        .get::<_, Option<String>>(8)?
        .map(|value| to_local_datetime(8, value))
        .transpose()?;

    Ok(StoredEvent {
        event: CalendarEvent {
            id: row.get(0)?,
            summary: row.get(1)?,
            start: to_local_datetime(2, row.get(2)?)?,
            end: to_local_datetime(3, row.get(3)?)?,
            color_id: row.get(4)?,
            recurrence: deserialize_list(5, row.get(5)?)?,
            recurring_event_id: row.get(7)?,
            original_start_time,
        },
        exceptions,
    })
}

pub(super) fn insert(conn: &Connection, stored: &StoredEvent) -> Result<()> {
    let event = &stored.event;
    conn.execute(
        "INSERT INTO events (
            id, summary, start_datetime, end_datetime, color_id, recurrence,
            recurrence_exceptions, recurring_event_id, original_start_time
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            event.id,
            event.summary,
            to_utc_text(event.start),
            to_utc_text(event.end),
            event.color_id,
            serialize_recurrence(&event.recurrence),
            serialize_exceptions(&stored.exceptions),
            event.recurring_event_id,
            event.original_start_time.map(to_utc_text),
        ],
    )
    .with_context(|| format!("Failed to insert event {}", event.id))?;
    Ok(())
}

pub(super) fn update(conn: &Connection, stored: &StoredEvent) -> Result<()> {
    let event = &stored.event;
    let rows = conn
        .execute(
            "UPDATE events SET
                summary = ?2, start_datetime = ?3, end_datetime = ?4, color_id = ?5,
                recurrence = ?6, recurrence_exceptions = ?7, recurring_event_id = ?8,
                original_start_time = ?9, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1",
            params![
                event.id,
                event.summary,
                to_utc_text(event.start),
                to_utc_text(event.end),
                event.color_id,
                serialize_recurrence(&event.recurrence),
                serialize_exceptions(&stored.exceptions),
                event.recurring_event_id,
                event.original_start_time.map(to_utc_text),
            ],
        )
        .with_context(|| format!("Failed to update event {}", event.id))?;

    if rows == 0 {
        anyhow::bail!("Event {} disappeared during update", event.id);
    }
    Ok(())
}

pub(super) fn load(conn: &Connection, id: &str) -> Result<Option<StoredEvent>> {
    let sql = format!("SELECT {} FROM events WHERE id = ?1", COLUMNS);
    conn.query_row(&sql, [id], map_event_row)
        .optional()
        .with_context(|| format!("Failed to load event {}", id))
}

/// Rows that may contribute to `[start, end)`: plain events overlapping the
/// range and every series master starting before its end.
pub(super) fn in_range(
    conn: &Connection,
    start: DateTime<Local>,
    end: DateTime<Local>,
) -> Result<Vec<StoredEvent>> {
    let sql = format!(
        "SELECT {} FROM events
         WHERE (start_datetime < ?2 AND end_datetime > ?1)
            OR (recurrence IS NOT NULL AND start_datetime < ?2)
         ORDER BY start_datetime ASC",
        COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![to_utc_text(start), to_utc_text(end)], map_event_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to query events in range")?;
    Ok(rows)
}

pub(super) fn delete(conn: &Connection, id: &str) -> Result<usize> {
    conn.execute("DELETE FROM events WHERE id = ?1", [id])
        .with_context(|| format!("Failed to delete event {}", id))
}

/// Remove detached instances of a series, optionally only those whose
/// original start is at or after `from`.
pub(super) fn delete_overrides(
    conn: &Connection,
    master_id: &str,
    from: Option<DateTime<Local>>,
) -> Result<usize> {
    let removed = match from {
        Some(from) => conn.execute(
            "DELETE FROM events WHERE recurring_event_id = ?1 AND original_start_time >= ?2",
            params![master_id, to_utc_text(from)],
        ),
        None => conn.execute(
            "DELETE FROM events WHERE recurring_event_id = ?1",
            [master_id],
        ),
    }
    .with_context(|| format!("Failed to delete overrides of {}", master_id))?;
    Ok(removed)
}
