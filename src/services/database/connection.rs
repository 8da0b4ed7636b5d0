use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::schema;

const IN_MEMORY: &str = ":memory:";

/// Owns the SQLite connection behind the local event store.
pub struct Database {
    conn: Connection,
    location: String,
}

impl Database {
    /// Open (or create) the event database at `path`; ":memory:" gives a
    /// throwaway store.
    pub fn new(path: &str) -> Result<Self> {
        let conn = if path == IN_MEMORY {
            Connection::open_in_memory().context("Failed to open in-memory database")?
        } else {
            let conn = Connection::open(path)
                .with_context(|| format!("Failed to open database at {}", path))?;
            conn.busy_timeout(Duration::from_secs(5))
                .context("Failed to set busy timeout")?;
            conn
        };

        conn.execute("PRAGMA foreign_keys = ON", [])
            .context("Failed to enable foreign keys")?;

        log::debug!("Opened event database at {}", path);
        Ok(Self {
            conn,
            location: path.to_string(),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(IN_MEMORY)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Path the database was opened from, or ":memory:".
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Create the events table and its indexes if missing.
    pub fn initialize_schema(&self) -> Result<()> {
        schema::initialize_schema(&self.conn)
            .with_context(|| format!("Failed to initialize schema in {}", self.location))
    }
}
