// Test fixtures - reusable test data
// Provides consistent dates, events and gestures across the integration tests

#![allow(dead_code)]

use calendar_engine::models::event::NewEvent;
use calendar_engine::services::drag::{EventHandle, GridPoint, PointerInput};
use chrono::{DateTime, Local, NaiveDate, TimeZone};

/// Sample dates for testing
pub mod dates {
    use super::*;

    /// Local wall-clock time in January 2025 (no DST transitions).
    pub fn jan(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 1, day, hour, minute, 0)
            .single()
            .unwrap()
    }

    /// Monday Jan 13, 2025 - first column of the test week
    pub fn week_start() -> DateTime<Local> {
        jan(13, 0, 0)
    }

    pub fn week_end() -> DateTime<Local> {
        jan(20, 0, 0)
    }

    pub fn column_date(column: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 13 + column).unwrap()
    }
}

/// Sample events for testing
pub mod events {
    use super::*;

    /// One-hour review on Tuesday at 09:00
    pub fn review() -> NewEvent {
        NewEvent::builder()
            .summary("Review")
            .start(dates::jan(14, 9, 0))
            .end(dates::jan(14, 10, 0))
            .color_id("3")
            .build()
            .unwrap()
    }

    /// Daily 15 minute standup starting Monday at 09:00
    pub fn daily_standup() -> NewEvent {
        NewEvent::builder()
            .summary("Standup")
            .start(dates::jan(13, 9, 0))
            .end(dates::jan(13, 9, 15))
            .rrule("RRULE:FREQ=DAILY;INTERVAL=1")
            .build()
            .unwrap()
    }
}

/// Pointer gestures in grid coordinates (100px columns, 1.6px per minute)
pub mod gestures {
    use super::*;

    pub const COLUMN_WIDTH: f64 = 100.0;
    pub const PIXELS_PER_MINUTE: f64 = 1.6;

    pub fn point(column: u32, minutes: f64) -> GridPoint {
        GridPoint::new(column as f64 * COLUMN_WIDTH + 50.0, minutes * PIXELS_PER_MINUTE)
    }

    pub fn grab(event_id: &str, handle: EventHandle, at: GridPoint) -> PointerInput {
        PointerInput::down(1, at, dates::jan(20, 12, 0)).on_event(event_id, handle)
    }

    pub fn drag_to(at: GridPoint) -> PointerInput {
        PointerInput::moved(1, at, dates::jan(20, 12, 0))
    }

    pub fn release(at: GridPoint) -> PointerInput {
        PointerInput::up(1, at, dates::jan(20, 12, 0))
    }
}
