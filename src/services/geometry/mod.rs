//! Pixel/time mapping for the day and week time grids.
//!
//! Offsets are measured in pixels from the top of a day column, which
//! corresponds to local midnight.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::models::event::CalendarEvent;
use crate::models::settings::GridSettings;
use crate::utils::date::{
    local_datetime, minutes_since_midnight, start_of_day, time_from_minutes, MINUTES_PER_DAY,
};

// Keeps exact slot boundaries from flooring into the previous slot.
const FLOOR_EPSILON: f64 = 1e-6;

/// Vertical placement of an event within one day column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventBlock {
    pub top: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeGridGeometry {
    hour_height_px: f64,
    slot_minutes: i64,
    snap_minutes: i64,
    days_in_view: usize,
    container_width: Option<f64>,
}

impl Default for TimeGridGeometry {
    fn default() -> Self {
        Self::new(&GridSettings::default())
    }
}

impl TimeGridGeometry {
    pub fn new(settings: &GridSettings) -> Self {
        Self {
            hour_height_px: settings.hour_height_px,
            slot_minutes: settings.quick_create_slot_minutes.clamp(1, 24 * 60) as i64,
            snap_minutes: settings.snap_minutes.max(1) as i64,
            days_in_view: settings.days_in_view.max(1) as usize,
            container_width: None,
        }
    }

    /// Width of the area holding the day columns; enables [`Self::column_at`].
    pub fn with_container_width(mut self, width: f64) -> Self {
        self.set_container_width(width);
        self
    }

    pub fn set_container_width(&mut self, width: f64) {
        self.container_width = (width.is_finite() && width > 0.0).then_some(width);
    }

    pub fn hour_height(&self) -> f64 {
        self.hour_height_px
    }

    pub fn pixels_per_minute(&self) -> f64 {
        self.hour_height_px / 60.0
    }

    pub fn slot_minutes(&self) -> i64 {
        self.slot_minutes
    }

    pub fn days_in_view(&self) -> usize {
        self.days_in_view
    }

    /// Full height of one day column.
    pub fn grid_height(&self) -> f64 {
        24.0 * self.hour_height_px
    }

    /// Whole minutes covered by a vertical pixel distance.
    pub fn pixels_to_minutes(&self, pixels: f64) -> i64 {
        if !pixels.is_finite() {
            return 0;
        }
        (pixels / self.pixels_per_minute()).round() as i64
    }

    pub fn minutes_to_pixels(&self, minutes: i64) -> f64 {
        minutes as f64 * self.pixels_per_minute()
    }

    /// Round a minute delta to the nearest snap interval.
    pub fn snap(&self, minutes: i64) -> i64 {
        let snap = self.snap_minutes;
        (minutes as f64 / snap as f64).round() as i64 * snap
    }

    /// Time of day under a vertical offset, floored to the quick-create slot
    /// and clamped so a full slot still fits before midnight.
    pub fn offset_to_time_of_day(&self, offset_px: f64) -> NaiveTime {
        let offset = if offset_px.is_finite() { offset_px } else { 0.0 };
        let raw = (offset / self.pixels_per_minute() + FLOOR_EPSILON).floor() as i64;
        let floored = raw.div_euclid(self.slot_minutes) * self.slot_minutes;
        let latest = MINUTES_PER_DAY - self.slot_minutes;
        time_from_minutes(floored.clamp(0, latest))
    }

    pub fn time_of_day_to_offset(&self, time: NaiveTime) -> f64 {
        self.minutes_to_pixels(minutes_since_midnight(time))
    }

    /// Offset of an instant within its own local day.
    pub fn time_to_offset(&self, at: DateTime<Local>) -> f64 {
        self.time_of_day_to_offset(at.time())
    }

    /// Start and end of the block a quick-create click at `offset_px` makes.
    pub fn quick_create_range(
        &self,
        date: NaiveDate,
        offset_px: f64,
    ) -> Option<(DateTime<Local>, DateTime<Local>)> {
        let start = local_datetime(date, self.offset_to_time_of_day(offset_px))?;
        Some((start, start + Duration::minutes(self.slot_minutes)))
    }

    pub fn column_width(&self) -> Option<f64> {
        self.container_width
            .map(|width| width / self.days_in_view as f64)
    }

    /// Day column under a horizontal position, clamped to the visible days.
    /// Always zero until a container width is known.
    pub fn column_at(&self, x: f64) -> usize {
        let Some(width) = self.column_width() else {
            return 0;
        };
        if !x.is_finite() || x <= 0.0 {
            return 0;
        }
        ((x / width).floor() as usize).min(self.days_in_view - 1)
    }

    /// Placement of the part of `event` that falls on `date`.
    pub fn event_block(&self, event: &CalendarEvent, date: NaiveDate) -> Option<EventBlock> {
        let day_start = start_of_day(date)?;
        let day_end = date
            .succ_opt()
            .and_then(start_of_day)
            .unwrap_or(day_start + Duration::days(1));

        let segment_start = event.start.max(day_start);
        let segment_end = event.end.min(day_end);
        if segment_start >= segment_end {
            return None;
        }

        let top = if segment_start == day_start {
            0.0
        } else {
            self.time_to_offset(segment_start)
        };
        let minutes = (segment_end - segment_start).num_minutes();
        Some(EventBlock {
            top,
            height: self.minutes_to_pixels(minutes),
        })
    }

    /// Column index and vertical offset of the current-time line, when
    /// `now` falls on one of the displayed dates.
    pub fn now_indicator(&self, now: DateTime<Local>, dates: &[NaiveDate]) -> Option<(usize, f64)> {
        let day_index = dates.iter().position(|d| *d == now.date_naive())?;
        let time = now.time();
        let minutes = time.hour() as f64 * 60.0 + time.minute() as f64;
        Some((day_index, minutes * self.pixels_per_minute()))
    }
}
