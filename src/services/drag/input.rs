use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Position in grid coordinates: `x` from the left edge of the first day
/// column, `y` from the top of the column (local midnight).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
}

impl GridPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// Which part of an event block the pointer went down on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventHandle {
    /// Body - moves the event
    Body,
    /// Top edge - adjusts start time
    Top,
    /// Bottom edge - adjusts end time
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PointerTarget {
    #[serde(rename_all = "camelCase")]
    Event { event_id: String, handle: EventHandle },
    /// Empty grid area in the column for `date`.
    Slot { date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerInput {
    pub phase: PointerPhase,
    pub pointer_id: u64,
    pub point: GridPoint,
    #[serde(default)]
    pub target: Option<PointerTarget>,
    pub at: DateTime<Local>,
}

impl PointerInput {
    pub fn new(phase: PointerPhase, pointer_id: u64, point: GridPoint, at: DateTime<Local>) -> Self {
        Self {
            phase,
            pointer_id,
            point,
            target: None,
            at,
        }
    }

    pub fn down(pointer_id: u64, point: GridPoint, at: DateTime<Local>) -> Self {
        Self::new(PointerPhase::Down, pointer_id, point, at)
    }

    pub fn moved(pointer_id: u64, point: GridPoint, at: DateTime<Local>) -> Self {
        Self::new(PointerPhase::Move, pointer_id, point, at)
    }

    pub fn up(pointer_id: u64, point: GridPoint, at: DateTime<Local>) -> Self {
        Self::new(PointerPhase::Up, pointer_id, point, at)
    }

    pub fn cancel(pointer_id: u64, at: DateTime<Local>) -> Self {
        Self::new(PointerPhase::Cancel, pointer_id, GridPoint::default(), at)
    }

    pub fn on_event(mut self, event_id: impl Into<String>, handle: EventHandle) -> Self {
        self.target = Some(PointerTarget::Event {
            event_id: event_id.into(),
            handle,
        });
        self
    }

    pub fn on_slot(mut self, date: NaiveDate) -> Self {
        self.target = Some(PointerTarget::Slot { date });
        self
    }
}
