//! Event editor state and saving.
//!
//! A draft holds what the editor dialog shows: start and end dates with
//! wall-clock times, and a single [`RecurrenceSpec`]. The recurrence string
//! is only built when the draft is saved.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime};

use crate::error::{EngineError, EngineResult};
use crate::models::event::{validate_times, CalendarEvent, EventPatch, NewEvent};
use crate::models::recurrence::RecurrenceSpec;
use crate::services::cache::OptimisticEventCache;
use crate::services::geometry::TimeGridGeometry;
use crate::services::store::EventStore;
use crate::utils::date::local_datetime;

pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub summary: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_date: NaiveDate,
    /// Midnight on `date` itself means the end of that day.
    pub end_time: NaiveTime,
    pub color_id: Option<String>,
    pub recurrence: RecurrenceSpec,
}

impl EventDraft {
    /// Draft for editing an existing event.
    pub fn from_event(event: &CalendarEvent) -> Self {
        Self {
            summary: event.summary.clone(),
            date: event.start.date_naive(),
            start_time: event.start.time(),
            end_date: event.end.date_naive(),
            end_time: event.end.time(),
            color_id: event.color_id.clone(),
            recurrence: RecurrenceSpec::from_recurrence(&event.recurrence, event.start),
        }
    }

    /// Untitled, non-repeating draft covering `start..end`.
    pub fn for_slot(start: DateTime<Local>, end: DateTime<Local>) -> Self {
        Self {
            summary: String::new(),
            date: start.date_naive(),
            start_time: start.time(),
            end_date: end.date_naive(),
            end_time: end.time(),
            color_id: None,
            recurrence: RecurrenceSpec::None,
        }
    }

    /// One-slot draft for a click at `offset_px` in the column for `date`.
    pub fn quick_create(geometry: &TimeGridGeometry, date: NaiveDate, offset_px: f64) -> Option<Self> {
        let (start, end) = geometry.quick_create_range(date, offset_px)?;
        Some(Self::for_slot(start, end))
    }

    pub fn title(&self) -> String {
        let trimmed = self.summary.trim();
        if trimmed.is_empty() {
            UNTITLED.to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Concrete start and end, rejecting non-existent local times and an
    /// end that is not after the start.
    pub fn resolve_times(&self) -> Result<(DateTime<Local>, DateTime<Local>), String> {
        let start = local_datetime(self.date, self.start_time)
            .ok_or_else(|| format!("{} {} does not exist in the local time zone", self.date, self.start_time))?;

        let end_date = if self.end_date == self.date
            && self.end_time == NaiveTime::MIN
            && self.start_time != NaiveTime::MIN
        {
            self.date + Duration::days(1)
        } else {
            self.end_date
        };
        let end = local_datetime(end_date, self.end_time)
            .ok_or_else(|| format!("{} {} does not exist in the local time zone", end_date, self.end_time))?;

        validate_times(start, end)?;
        Ok((start, end))
    }

    pub fn to_new_event(&self) -> Result<NewEvent, String> {
        let (start, end) = self.resolve_times()?;
        Ok(NewEvent {
            summary: self.title(),
            start,
            end,
            color_id: self.color_id.clone(),
            recurrence: self.recurrence.to_recurrence(start),
        })
    }

    /// Patch turning `original` into this draft. Occurrences of a series
    /// never carry a recurrence change; EXDATE and RDATE lines of a master
    /// are kept.
    pub fn to_patch(&self, original: &CalendarEvent) -> Result<EventPatch, String> {
        let (start, end) = self.resolve_times()?;
        let recurrence = if original.is_instance() {
            None
        } else {
            let lines = self.recurrence.merge_into(&original.recurrence, start);
            (lines != original.recurrence).then_some(lines)
        };
        Ok(EventPatch {
            summary: Some(self.title()),
            start: Some(start),
            end: Some(end),
            color_id: self.color_id.clone(),
            recurrence,
        })
    }

    /// Create or update the event in the store and bring the cache in line.
    ///
    /// Validation failures return before any store call. Saves touching a
    /// series reload the visible range; anything else is reconciled in place.
    pub async fn save(
        &self,
        existing: Option<&CalendarEvent>,
        cache: &mut OptimisticEventCache,
        store: &dyn EventStore,
    ) -> EngineResult<CalendarEvent> {
        let (saved, touches_series) = match existing {
            Some(original) => {
                let patch = self.to_patch(original).map_err(EngineError::Validation)?;
                let touches_series = original.is_recurring()
                    || original.is_instance()
                    || patch.recurrence.is_some();
                let saved = store.update_event(&original.id, patch).await.map_err(|err| {
                    log::error!("Failed to update event {}: {:#}", original.id, err);
                    EngineError::from(err)
                })?;
                if saved.id != original.id {
                    cache.remove(&original.id);
                }
                (saved, touches_series)
            }
            None => {
                let new_event = self.to_new_event().map_err(EngineError::Validation)?;
                let saved = store.create_event(new_event).await.map_err(|err| {
                    log::error!("Failed to create event: {:#}", err);
                    EngineError::from(err)
                })?;
                let touches_series = saved.is_recurring();
                (saved, touches_series)
            }
        };

        log::info!("Saved event {} ({})", saved.id, saved.summary);
        if touches_series {
            cache.refetch(store).await?;
        } else {
            cache.reconcile(saved.clone());
        }
        Ok(saved)
    }
}
