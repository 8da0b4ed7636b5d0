// Event module
// Calendar event model as exchanged with the event store

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Wire marker that prefixes every recurrence rule entry.
pub const RRULE_MARKER: &str = "RRULE:";

/// A calendar event, either a standalone event, a recurring master, or a
/// materialized instance of a master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    /// Ordered rule lines; at most one `RRULE:` entry is meaningful.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrence: Vec<String>,
    /// Master id when this event is a materialized instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<String>,
    /// Scheduled start of the instance before any per-occurrence override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_start_time: Option<DateTime<Local>>,
}

impl CalendarEvent {
    /// Create a new event with required fields
    ///
    /// # Examples
    /// ```
    /// use calendar_engine::models::event::CalendarEvent;
    /// use chrono::Local;
    ///
    /// let start = Local::now();
    /// let end = start + chrono::Duration::hours(1);
    /// let event = CalendarEvent::new("evt-1", "Team Meeting", start, end).unwrap();
    /// assert!(!event.is_recurring());
    /// ```
    pub fn new(
        id: impl Into<String>,
        summary: impl Into<String>,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> Result<Self, String> {
        let event = Self {
            id: id.into(),
            summary: summary.into(),
            start,
            end,
            color_id: None,
            recurrence: Vec::new(),
            recurring_event_id: None,
            original_start_time: None,
        };
        event.validate()?;
        Ok(event)
    }

    /// Validate the event
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Event id cannot be empty".to_string());
        }
        validate_times(self.start, self.end)
    }

    /// Part of a recurring series, either as master or as instance.
    pub fn is_recurring(&self) -> bool {
        self.recurring_event_id.is_some() || self.recurrence.iter().any(|r| !r.trim().is_empty())
    }

    /// Materialized occurrence of some master.
    pub fn is_instance(&self) -> bool {
        self.recurring_event_id.is_some()
    }

    /// The first `RRULE:` entry of the recurrence list, if any.
    pub fn rrule(&self) -> Option<&str> {
        find_rrule(&self.recurrence)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    /// Half-open overlap test against `[range_start, range_end)`.
    pub fn overlaps(&self, range_start: DateTime<Local>, range_end: DateTime<Local>) -> bool {
        self.start < range_end && self.end > range_start
    }
}

/// Returns the first entry that carries the `RRULE:` marker (case-insensitive).
pub fn find_rrule(recurrence: &[String]) -> Option<&str> {
    recurrence
        .iter()
        .map(|r| r.trim())
        .find(|r| {
            r.get(..RRULE_MARKER.len())
                .map_or(false, |prefix| prefix.eq_ignore_ascii_case(RRULE_MARKER))
        })
}

/// Shared end-after-start check used by events, drafts and patches.
pub fn validate_times(start: DateTime<Local>, end: DateTime<Local>) -> Result<(), String> {
    if end <= start {
        return Err("Event end time must be after start time".to_string());
    }
    Ok(())
}

/// Payload for `EventStore::create_event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub summary: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrence: Vec<String>,
}

impl NewEvent {
    /// Create a builder for constructing events with optional fields
    pub fn builder() -> NewEventBuilder {
        NewEventBuilder::new()
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_times(self.start, self.end)
    }
}

/// Builder for creating events with optional fields
#[derive(Default)]
pub struct NewEventBuilder {
    summary: Option<String>,
    start: Option<DateTime<Local>>,
    end: Option<DateTime<Local>>,
    color_id: Option<String>,
    recurrence: Vec<String>,
}

impl NewEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn start(mut self, start: DateTime<Local>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: DateTime<Local>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn color_id(mut self, color_id: impl Into<String>) -> Self {
        self.color_id = Some(color_id.into());
        self
    }

    /// Set the recurrence rule (RRULE format)
    pub fn rrule(mut self, rule: impl Into<String>) -> Self {
        self.recurrence = vec![rule.into()];
        self
    }

    pub fn build(self) -> Result<NewEvent, String> {
        let summary = self.summary.ok_or("Event summary is required")?;
        let start = self.start.ok_or("Event start time is required")?;
        let end = self.end.ok_or("Event end time is required")?;

        let event = NewEvent {
            summary,
            start,
            end,
            color_id: self.color_id,
            recurrence: self.recurrence,
        };
        event.validate()?;
        Ok(event)
    }
}

/// Partial update for `EventStore::update_event`; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    /// `Some(vec![])` clears the recurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
}

impl EventPatch {
    pub fn times(start: Option<DateTime<Local>>, end: Option<DateTime<Local>>) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.color_id.is_none()
            && self.recurrence.is_none()
    }

    /// Apply the supplied fields to `event`, rejecting a result whose end is
    /// not after its start.
    pub fn apply_to(&self, event: &mut CalendarEvent) -> Result<(), String> {
        let start = self.start.unwrap_or(event.start);
        let end = self.end.unwrap_or(event.end);
        validate_times(start, end)?;

        event.start = start;
        event.end = end;
        if let Some(ref summary) = self.summary {
            event.summary = summary.clone();
        }
        if let Some(ref color_id) = self.color_id {
            event.color_id = Some(color_id.clone());
        }
        if let Some(ref recurrence) = self.recurrence {
            event.recurrence = recurrence.clone();
        }
        Ok(())
    }
}
