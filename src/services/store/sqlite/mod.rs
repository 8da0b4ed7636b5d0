//! SQLite-backed [`EventStore`].
//!
//! Series masters are stored once and expanded on read. Editing or deleting
//! a single occurrence records its original start as an exception on the
//! master; edits are then stored as a standalone override row that keeps the
//! occurrence id.

mod rows;

use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local};
use rusqlite::Connection;
use uuid::Uuid;

use self::rows::StoredEvent;
use super::{delete_scope_with, DeletionMode, EventStore, ScopedDeletion, StoreError};
use crate::models::event::{CalendarEvent, EventPatch, NewEvent};
use crate::services::database::Database;
use crate::services::recurrence::expand::{expand_event, parse_instance_id};

pub struct SqliteEventStore {
    db: Mutex<Database>,
}

impl SqliteEventStore {
    /// Wrap an open database, creating the schema if needed.
    pub fn new(db: Database) -> Result<Self> {
        db.initialize_schema()?;
        Ok(Self { db: Mutex::new(db) })
    }

    pub fn open(path: &str) -> Result<Self> {
        Self::new(Database::new(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Database::in_memory()?)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        f(db.connection())
    }
}

fn not_found(id: &str) -> anyhow::Error {
    StoreError::NotFound(id.to_string()).into()
}

/// The occurrence of `master` that originally started at `original_start`,
/// unless it was removed from the series.
fn find_instance(master: &StoredEvent, original_start: DateTime<Local>) -> Option<CalendarEvent> {
    expand_event(
        &master.event,
        &master.exceptions,
        original_start,
        original_start + Duration::seconds(1),
    )
    .into_iter()
    .find(|event| event.original_start_time == Some(original_start))
}

/// Resolve an instance id to its master row and the generated occurrence.
fn load_instance(conn: &Connection, id: &str) -> Result<Option<(StoredEvent, CalendarEvent)>> {
    let Some((master_id, original_start)) = parse_instance_id(id) else {
        return Ok(None);
    };
    let Some(master) = rows::load(conn, master_id)? else {
        return Ok(None);
    };
    Ok(find_instance(&master, original_start).map(|instance| (master, instance)))
}

fn list_sync(
    conn: &Connection,
    range_start: DateTime<Local>,
    range_end: DateTime<Local>,
) -> Result<Vec<CalendarEvent>> {
    let mut events: Vec<CalendarEvent> = rows::in_range(conn, range_start, range_end)?
        .iter()
        .flat_map(|stored| expand_event(&stored.event, &stored.exceptions, range_start, range_end))
        .collect();
    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    Ok(events)
}

fn get_sync(conn: &Connection, id: &str) -> Result<CalendarEvent> {
    if let Some(stored) = rows::load(conn, id)? {
        return Ok(stored.event);
    }
    load_instance(conn, id)?
        .map(|(_, instance)| instance)
        .ok_or_else(|| not_found(id))
}

fn create_sync(conn: &Connection, event: NewEvent) -> Result<CalendarEvent> {
    event.validate().map_err(|e| anyhow!(e))?;

    let created = CalendarEvent {
        id: Uuid::new_v4().simple().to_string(),
        summary: event.summary,
        start: event.start,
        end: event.end,
        color_id: event.color_id,
        recurrence: event
            .recurrence
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect(),
        recurring_event_id: None,
        original_start_time: None,
    };
    rows::insert(conn, &StoredEvent::new(created.clone()))?;
    log::info!("Created event {} ({})", created.id, created.summary);
    Ok(created)
}

fn update_sync(conn: &Connection, id: &str, patch: &EventPatch) -> Result<CalendarEvent> {
    if let Some(mut stored) = rows::load(conn, id)? {
        if stored.event.is_instance() && patch.recurrence.is_some() {
            anyhow::bail!("Recurrence can only be changed on the series, not on {}", id);
        }
        patch.apply_to(&mut stored.event).map_err(|e| anyhow!(e))?;
        rows::update(conn, &stored)?;
        return Ok(stored.event);
    }

    let Some((mut master, mut instance)) = load_instance(conn, id)? else {
        return Err(not_found(id));
    };
    if patch.recurrence.is_some() {
        anyhow::bail!("Recurrence can only be changed on the series, not on {}", id);
    }
    patch.apply_to(&mut instance).map_err(|e| anyhow!(e))?;

    let original_start = instance
        .original_start_time
        .ok_or_else(|| anyhow!("Instance {} has no original start", id))?;
    master.exceptions.push(original_start);

    let tx = conn
        .unchecked_transaction()
        .context("Failed to start override transaction")?;
    rows::insert(&tx, &StoredEvent::new(instance.clone()))?;
    rows::update(&tx, &master)?;
    tx.commit().context("Failed to commit override")?;

    log::info!("Detached occurrence {} from series {}", id, master.event.id);
    Ok(instance)
}

fn delete_sync(conn: &Connection, id: &str) -> Result<()> {
    if let Some(stored) = rows::load(conn, id)? {
        rows::delete(conn, id)?;
        if stored.event.rrule().is_some() {
            let removed = rows::delete_overrides(conn, id, None)?;
            log::info!("Deleted series {} and {} override(s)", id, removed);
        } else {
            log::info!("Deleted event {}", id);
        }
        return Ok(());
    }

    let Some((mut master, instance)) = load_instance(conn, id)? else {
        return Err(not_found(id));
    };
    if let Some(original_start) = instance.original_start_time {
        master.exceptions.push(original_start);
        rows::update(conn, &master)?;
    }
    log::info!("Excluded occurrence {} from series {}", id, master.event.id);
    Ok(())
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn list_events(
        &self,
        range_start: DateTime<Local>,
        range_end: DateTime<Local>,
    ) -> Result<Vec<CalendarEvent>> {
        let events = self.with_conn(|conn| list_sync(conn, range_start, range_end))?;
        log::debug!(
            "Listed {} event(s) between {} and {}",
            events.len(),
            range_start,
            range_end
        );
        Ok(events)
    }

    async fn get_event(&self, id: &str) -> Result<CalendarEvent> {
        self.with_conn(|conn| get_sync(conn, id))
    }

    async fn create_event(&self, event: NewEvent) -> Result<CalendarEvent> {
        self.with_conn(|conn| create_sync(conn, event))
    }

    async fn update_event(&self, id: &str, patch: EventPatch) -> Result<CalendarEvent> {
        self.with_conn(|conn| update_sync(conn, id, &patch))
    }

    async fn delete_event(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| delete_sync(conn, id))
    }

    async fn delete_recurring_scope(&self, request: ScopedDeletion) -> Result<()> {
        delete_scope_with(self, &request).await?;

        if request.mode == DeletionMode::Following {
            if let (Some(master_id), Some(original_start)) = (
                request.recurring_event_id.as_deref(),
                request.original_start_time,
            ) {
                let removed = self
                    .with_conn(|conn| rows::delete_overrides(conn, master_id, Some(original_start)))?;
                log::info!(
                    "Truncated series {} at {} ({} override(s) removed)",
                    master_id,
                    original_start,
                    removed
                );
            }
        }
        Ok(())
    }
}
