use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

use super::input::{EventHandle, GridPoint};
use crate::models::event::{CalendarEvent, EventPatch};
use crate::models::settings::DragSettings;
use crate::services::geometry::TimeGridGeometry;
use crate::utils::date::MINUTES_PER_DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DragKind {
    /// Pointer is down on the body but has not moved far enough to drag.
    PendingMove,
    Move,
    ResizeStart,
    ResizeEnd,
}

impl DragKind {
    pub fn from_handle(handle: EventHandle) -> Self {
        match handle {
            EventHandle::Body => Self::PendingMove,
            EventHandle::Top => Self::ResizeStart,
            EventHandle::Bottom => Self::ResizeEnd,
        }
    }
}

/// State of one in-progress gesture on an event.
///
/// Every proposed time is derived from the snapshot taken at pointer-down
/// and the current delta, never from the previous preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragSession {
    pub event_id: String,
    pub kind: DragKind,
    pub pointer_id: u64,
    pub origin: GridPoint,
    pub original_start: DateTime<Local>,
    pub original_end: DateTime<Local>,
    /// Snapped vertical delta in minutes.
    pub delta_minutes: i64,
    /// Whole-day column shift; moves only.
    pub day_delta: i64,
}

impl DragSession {
    pub fn begin(event: &CalendarEvent, handle: EventHandle, pointer_id: u64, origin: GridPoint) -> Self {
        Self {
            event_id: event.id.clone(),
            kind: DragKind::from_handle(handle),
            pointer_id,
            origin,
            original_start: event.start,
            original_end: event.end,
            delta_minutes: 0,
            day_delta: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.kind == DragKind::PendingMove
    }

    /// Session after the pointer moved to `point`. A pending move is
    /// promoted once the vertical travel exceeds the move threshold or the
    /// pointer crosses into another day column.
    pub fn advance(
        &self,
        point: GridPoint,
        geometry: &TimeGridGeometry,
        settings: &DragSettings,
    ) -> Self {
        let mut next = self.clone();
        let dy = point.y - self.origin.y;
        let dy = if dy.is_finite() { dy } else { 0.0 };
        let day_delta = match self.kind {
            DragKind::PendingMove | DragKind::Move => {
                geometry.column_at(point.x) as i64 - geometry.column_at(self.origin.x) as i64
            }
            DragKind::ResizeStart | DragKind::ResizeEnd => 0,
        };

        if next.kind == DragKind::PendingMove {
            let threshold_px = settings.move_threshold_minutes * geometry.pixels_per_minute();
            if dy.abs() <= threshold_px && day_delta == 0 {
                return next;
            }
            next.kind = DragKind::Move;
        }

        next.delta_minutes = geometry.snap(geometry.pixels_to_minutes(dy));
        next.day_delta = day_delta;
        next
    }

    fn total_delta(&self) -> Duration {
        Duration::minutes(self.delta_minutes + self.day_delta * MINUTES_PER_DAY)
    }

    /// Times implied by the current delta. Resizes never shrink the event
    /// below the minimum duration.
    pub fn proposed_times(&self, settings: &DragSettings) -> (DateTime<Local>, DateTime<Local>) {
        let (start, end) = (self.original_start, self.original_end);
        if self.delta_minutes == 0 && self.day_delta == 0 {
            return (start, end);
        }

        let min_duration = Duration::minutes(settings.min_duration_minutes as i64);
        let delta = self.total_delta();
        match self.kind {
            DragKind::PendingMove => (start, end),
            DragKind::Move => (start + delta, end + delta),
            DragKind::ResizeEnd => (start, (end + delta).max(start + min_duration)),
            DragKind::ResizeStart => ((start + delta).min(end - min_duration), end),
        }
    }

    /// Change to send to the store when the pointer is released, or `None`
    /// when the gesture ends where it started.
    pub fn finish(&self, settings: &DragSettings) -> Option<DragCommit> {
        if self.is_pending() {
            return None;
        }
        let (start, end) = self.proposed_times(settings);
        if start == self.original_start && end == self.original_end {
            return None;
        }
        Some(DragCommit {
            event_id: self.event_id.clone(),
            kind: self.kind,
            original_start: self.original_start,
            original_end: self.original_end,
            start,
            end,
        })
    }
}

/// A finished drag awaiting confirmation from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragCommit {
    pub event_id: String,
    pub kind: DragKind,
    pub original_start: DateTime<Local>,
    pub original_end: DateTime<Local>,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl DragCommit {
    /// Only the fields the gesture changed.
    pub fn patch(&self) -> EventPatch {
        match self.kind {
            DragKind::ResizeStart => EventPatch::times(Some(self.start), None),
            DragKind::ResizeEnd => EventPatch::times(None, Some(self.end)),
            DragKind::Move | DragKind::PendingMove => {
                EventPatch::times(Some(self.start), Some(self.end))
            }
        }
    }
}
