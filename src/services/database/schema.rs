use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    create_events_table(conn)?;
    create_event_indexes(conn)?;
    Ok(())
}

// Datetimes are stored as UTC RFC 3339 so that text comparison orders them.
fn create_events_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            summary TEXT NOT NULL,
            start_datetime TEXT NOT NULL,
            end_datetime TEXT NOT NULL,
            color_id TEXT,
            recurrence TEXT,
            recurrence_exceptions TEXT,
            recurring_event_id TEXT,
            original_start_time TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create events table")?;

    Ok(())
}

fn create_event_indexes(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_start ON events(start_datetime)",
        [],
    )
    .context("Failed to create events start index")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_series ON events(recurring_event_id)",
        [],
    )
    .context("Failed to create events series index")?;

    Ok(())
}
