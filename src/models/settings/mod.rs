// Settings module
// Tunables for the time grid and the drag interaction

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub grid: GridSettings,
    pub drag: DragSettings,
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), String> {
        self.grid.validate()?;
        self.drag.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Height of one hour row in pixels.
    pub hour_height_px: f64,
    /// Block length (and flooring granularity) used by quick-create.
    pub quick_create_slot_minutes: u32,
    /// Drag deltas are rounded to this many minutes.
    pub snap_minutes: u32,
    pub days_in_view: u32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            hour_height_px: 96.0,
            quick_create_slot_minutes: 60,
            snap_minutes: 15,
            days_in_view: 7,
        }
    }
}

impl GridSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !self.hour_height_px.is_finite() || self.hour_height_px <= 0.0 {
            return Err("Hour height must be a positive number of pixels".to_string());
        }
        if self.quick_create_slot_minutes == 0 || self.quick_create_slot_minutes > 24 * 60 {
            return Err("Quick-create slot must be between 1 and 1440 minutes".to_string());
        }
        if self.snap_minutes == 0 {
            return Err("Snap interval must be at least 1 minute".to_string());
        }
        if self.days_in_view == 0 {
            return Err("At least one day column is required".to_string());
        }
        Ok(())
    }
}

/// What happens to the optimistic value when a drag commit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitFailurePolicy {
    /// Restore the start/end captured when the drag began.
    #[default]
    Rollback,
    /// Leave the dragged times visible until the next refetch.
    KeepOptimistic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragSettings {
    /// Grid-equivalent distance a pending move must exceed to become a drag.
    pub move_threshold_minutes: f64,
    pub min_duration_minutes: u32,
    /// Window after a drag during which a grid click is ignored.
    pub click_suppression_ms: u64,
    pub commit_failure_policy: CommitFailurePolicy,
}

impl Default for DragSettings {
    fn default() -> Self {
        Self {
            move_threshold_minutes: 2.0,
            min_duration_minutes: 15,
            click_suppression_ms: 250,
            commit_failure_policy: CommitFailurePolicy::Rollback,
        }
    }
}

impl DragSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !self.move_threshold_minutes.is_finite() || self.move_threshold_minutes < 0.0 {
            return Err("Move threshold must be zero or more minutes".to_string());
        }
        if self.min_duration_minutes == 0 {
            return Err("Minimum duration must be at least 1 minute".to_string());
        }
        Ok(())
    }
}
