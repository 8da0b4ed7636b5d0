//! Local copy of the events in the visible range.
//!
//! Drag previews and commits are written here first so the grid reflects a
//! change before the store confirms it. The store stays authoritative: a
//! refetch replaces everything held here.

use std::collections::HashMap;

use chrono::{DateTime, Local, NaiveDate};

use crate::error::EngineResult;
use crate::models::event::CalendarEvent;
use crate::services::store::EventStore;
use crate::utils::date::start_of_day;

#[derive(Debug, Default, Clone)]
pub struct OptimisticEventCache {
    events: HashMap<String, CalendarEvent>,
    visible_range: Option<(DateTime<Local>, DateTime<Local>)>,
}

impl OptimisticEventCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CalendarEvent> {
        self.events.get(id)
    }

    /// All cached events ordered by start, then id.
    pub fn events(&self) -> Vec<&CalendarEvent> {
        let mut events: Vec<&CalendarEvent> = self.events.values().collect();
        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        events
    }

    /// Cached events overlapping the local day `date`.
    pub fn events_on(&self, date: NaiveDate) -> Vec<&CalendarEvent> {
        let (Some(day_start), Some(day_end)) = (
            start_of_day(date),
            date.succ_opt().and_then(start_of_day),
        ) else {
            return Vec::new();
        };
        self.events()
            .into_iter()
            .filter(|event| event.overlaps(day_start, day_end))
            .collect()
    }

    pub fn visible_range(&self) -> Option<(DateTime<Local>, DateTime<Local>)> {
        self.visible_range
    }

    pub fn set_visible_range(&mut self, start: DateTime<Local>, end: DateTime<Local>) {
        self.visible_range = Some((start, end));
    }

    /// Replace every cached event with `events`.
    pub fn replace_all(&mut self, events: Vec<CalendarEvent>) {
        self.events = events
            .into_iter()
            .map(|event| (event.id.clone(), event))
            .collect();
    }

    /// Insert or overwrite with the canonical copy returned by the store.
    pub fn reconcile(&mut self, event: CalendarEvent) {
        self.events.insert(event.id.clone(), event);
    }

    /// Move an event to new times ahead of confirmation. Returns `false` when
    /// the event is not cached.
    pub fn apply_optimistic(
        &mut self,
        id: &str,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> bool {
        match self.events.get_mut(id) {
            Some(event) => {
                event.start = start;
                event.end = end;
                true
            }
            None => false,
        }
    }

    /// Put back the times captured before an optimistic change.
    pub fn rollback(&mut self, id: &str, start: DateTime<Local>, end: DateTime<Local>) -> bool {
        let restored = self.apply_optimistic(id, start, end);
        if restored {
            log::debug!("Rolled back event {} to {} - {}", id, start, end);
        } else {
            log::warn!("Cannot roll back event {}: no longer cached", id);
        }
        restored
    }

    pub fn remove(&mut self, id: &str) -> Option<CalendarEvent> {
        self.events.remove(id)
    }

    /// Reload the visible range from the store. A cache with no visible range
    /// is left untouched.
    pub async fn refetch(&mut self, store: &dyn EventStore) -> EngineResult<usize> {
        let Some((start, end)) = self.visible_range else {
            log::debug!("Skipping refetch: no visible range");
            return Ok(0);
        };
        let events = store.list_events(start, end).await?;
        let count = events.len();
        self.replace_all(events);
        log::debug!("Refetched {} event(s)", count);
        Ok(count)
    }

    /// Point the cache at a new range and load it.
    pub async fn load_range(
        &mut self,
        store: &dyn EventStore,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> EngineResult<usize> {
        self.set_visible_range(start, end);
        self.refetch(store).await
    }
}
