use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::input::{PointerInput, PointerPhase, PointerTarget};
use super::session::{DragCommit, DragKind, DragSession};
use crate::error::{EngineError, EngineResult};
use crate::models::event::CalendarEvent;
use crate::models::settings::{CommitFailurePolicy, DragSettings, EngineSettings};
use crate::services::cache::OptimisticEventCache;
use crate::services::geometry::TimeGridGeometry;
use crate::services::store::EventStore;

/// Everything the controller remembers between pointer inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragState {
    pub session: Option<DragSession>,
    /// When the last real drag (not a plain click) was released.
    pub last_drag_finished_at: Option<DateTime<Local>>,
}

impl DragState {
    /// Whether a grid click at `at` falls inside the post-drag window.
    pub fn suppresses_click(&self, at: DateTime<Local>, settings: &DragSettings) -> bool {
        let Some(finished) = self.last_drag_finished_at else {
            return false;
        };
        let elapsed = at - finished;
        elapsed >= Duration::zero()
            && elapsed < Duration::milliseconds(settings.click_suppression_ms as i64)
    }
}

/// What one pointer input asks the host to do.
#[derive(Debug, Clone, PartialEq)]
pub enum DragEffect {
    None,
    Started { event_id: String, kind: DragKind },
    Preview {
        event_id: String,
        start: DateTime<Local>,
        end: DateTime<Local>,
    },
    /// Gesture aborted; put the snapshot back.
    Restore {
        event_id: String,
        start: DateTime<Local>,
        end: DateTime<Local>,
    },
    Commit(DragCommit),
    /// Drag released with no net change; `start`/`end` are the snapshot.
    Unchanged {
        event_id: String,
        start: DateTime<Local>,
        end: DateTime<Local>,
    },
    EventClick { event_id: String },
    SlotClick { date: NaiveDate, offset_y: f64 },
    ClickSuppressed,
    /// Pointer-down while another session is active.
    Rejected { active_event_id: String },
}

/// Pure state transition for one pointer input.
///
/// `target_event` is the cached event under a pointer-down, if any.
pub fn transition(
    state: &DragState,
    input: &PointerInput,
    target_event: Option<&CalendarEvent>,
    geometry: &TimeGridGeometry,
    settings: &DragSettings,
) -> (DragState, DragEffect) {
    let mut next = state.clone();

    if let Some(session) = &state.session {
        if input.phase == PointerPhase::Down {
            let effect = DragEffect::Rejected {
                active_event_id: session.event_id.clone(),
            };
            return (next, effect);
        }
        if input.pointer_id != session.pointer_id {
            return (next, DragEffect::None);
        }

        let effect = match input.phase {
            PointerPhase::Down => DragEffect::None,
            PointerPhase::Move => {
                let advanced = session.advance(input.point, geometry, settings);
                let effect = if advanced.is_pending() {
                    DragEffect::None
                } else {
                    let (start, end) = advanced.proposed_times(settings);
                    DragEffect::Preview {
                        event_id: advanced.event_id.clone(),
                        start,
                        end,
                    }
                };
                next.session = Some(advanced);
                effect
            }
            PointerPhase::Up => {
                let released = session.advance(input.point, geometry, settings);
                next.session = None;
                if released.is_pending() {
                    DragEffect::EventClick {
                        event_id: released.event_id,
                    }
                } else {
                    next.last_drag_finished_at = Some(input.at);
                    match released.finish(settings) {
                        Some(commit) => DragEffect::Commit(commit),
                        None => DragEffect::Unchanged {
                            event_id: released.event_id.clone(),
                            start: released.original_start,
                            end: released.original_end,
                        },
                    }
                }
            }
            PointerPhase::Cancel => {
                next.session = None;
                DragEffect::Restore {
                    event_id: session.event_id.clone(),
                    start: session.original_start,
                    end: session.original_end,
                }
            }
        };
        return (next, effect);
    }

    let effect = match (input.phase, &input.target) {
        (PointerPhase::Down, Some(PointerTarget::Event { event_id, handle })) => {
            match target_event.filter(|event| &event.id == event_id) {
                Some(event) => {
                    let session = DragSession::begin(event, *handle, input.pointer_id, input.point);
                    let effect = DragEffect::Started {
                        event_id: session.event_id.clone(),
                        kind: session.kind,
                    };
                    next.session = Some(session);
                    effect
                }
                None => {
                    log::warn!("Pointer down on unknown event {}", event_id);
                    DragEffect::None
                }
            }
        }
        (PointerPhase::Up, Some(PointerTarget::Slot { date })) => {
            if state.suppresses_click(input.at, settings) {
                DragEffect::ClickSuppressed
            } else {
                DragEffect::SlotClick {
                    date: *date,
                    offset_y: input.point.y,
                }
            }
        }
        _ => DragEffect::None,
    };
    (next, effect)
}

/// Result of feeding one input to [`DragInteractionController`].
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    Idle,
    DragStarted { event_id: String, kind: DragKind },
    Previewed {
        event_id: String,
        start: DateTime<Local>,
        end: DateTime<Local>,
    },
    Cancelled { event_id: String },
    Unchanged { event_id: String },
    /// Released drag whose change still has to be sent to the store.
    CommitPending(DragCommit),
    /// Store confirmed the drag; carries the canonical event.
    Committed(CalendarEvent),
    OpenEvent { event_id: String },
    QuickCreate {
        start: DateTime<Local>,
        end: DateTime<Local>,
    },
    ClickSuppressed,
}

pub struct DragInteractionController {
    geometry: TimeGridGeometry,
    settings: DragSettings,
    state: DragState,
}

impl DragInteractionController {
    pub fn new(geometry: TimeGridGeometry, settings: DragSettings) -> Self {
        Self {
            geometry,
            settings,
            state: DragState::default(),
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(TimeGridGeometry::new(&settings.grid), settings.drag.clone())
    }

    pub fn geometry(&self) -> &TimeGridGeometry {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut TimeGridGeometry {
        &mut self.geometry
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn active_session(&self) -> Option<&DragSession> {
        self.state.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state.session.is_some()
    }

    /// Advance the gesture and mirror previews into the cache. Commits are
    /// returned as [`GestureOutcome::CommitPending`] for [`Self::commit`].
    pub fn handle(
        &mut self,
        input: &PointerInput,
        cache: &mut OptimisticEventCache,
    ) -> EngineResult<GestureOutcome> {
        let target_event = match &input.target {
            Some(PointerTarget::Event { event_id, .. }) => cache.get(event_id),
            _ => None,
        };
        let (next, effect) =
            transition(&self.state, input, target_event, &self.geometry, &self.settings);
        self.state = next;

        let outcome = match effect {
            DragEffect::None => GestureOutcome::Idle,
            DragEffect::Started { event_id, kind } => {
                log::debug!("Drag session started on {} ({:?})", event_id, kind);
                GestureOutcome::DragStarted { event_id, kind }
            }
            DragEffect::Preview { event_id, start, end } => {
                cache.apply_optimistic(&event_id, start, end);
                GestureOutcome::Previewed { event_id, start, end }
            }
            DragEffect::Restore { event_id, start, end } => {
                cache.rollback(&event_id, start, end);
                GestureOutcome::Cancelled { event_id }
            }
            DragEffect::Commit(commit) => {
                cache.apply_optimistic(&commit.event_id, commit.start, commit.end);
                GestureOutcome::CommitPending(commit)
            }
            DragEffect::Unchanged { event_id, start, end } => {
                cache.apply_optimistic(&event_id, start, end);
                GestureOutcome::Unchanged { event_id }
            }
            DragEffect::EventClick { event_id } => GestureOutcome::OpenEvent { event_id },
            DragEffect::SlotClick { date, offset_y } => {
                match self.geometry.quick_create_range(date, offset_y) {
                    Some((start, end)) => GestureOutcome::QuickCreate { start, end },
                    None => GestureOutcome::Idle,
                }
            }
            DragEffect::ClickSuppressed => {
                log::debug!("Ignoring grid click right after a drag");
                GestureOutcome::ClickSuppressed
            }
            DragEffect::Rejected { active_event_id } => {
                return Err(EngineError::SessionActive(active_event_id));
            }
        };
        Ok(outcome)
    }

    /// Send a released drag to the store. On success the cache takes the
    /// canonical event; on failure the commit failure policy decides whether
    /// the optimistic times are rolled back.
    pub async fn commit(
        &self,
        commit: &DragCommit,
        cache: &mut OptimisticEventCache,
        store: &dyn EventStore,
    ) -> EngineResult<CalendarEvent> {
        match store.update_event(&commit.event_id, commit.patch()).await {
            Ok(canonical) => {
                if canonical.id != commit.event_id {
                    cache.remove(&commit.event_id);
                }
                cache.reconcile(canonical.clone());
                log::info!(
                    "Saved {:?} of event {} to {} - {}",
                    commit.kind,
                    canonical.id,
                    canonical.start,
                    canonical.end
                );
                Ok(canonical)
            }
            Err(err) => {
                log::error!("Failed to save drag of event {}: {:#}", commit.event_id, err);
                match self.settings.commit_failure_policy {
                    CommitFailurePolicy::Rollback => {
                        cache.rollback(&commit.event_id, commit.original_start, commit.original_end);
                    }
                    CommitFailurePolicy::KeepOptimistic => {}
                }
                Err(err.into())
            }
        }
    }

    /// [`Self::handle`] followed by [`Self::commit`] when the input
    /// released a drag.
    pub async fn dispatch(
        &mut self,
        input: &PointerInput,
        cache: &mut OptimisticEventCache,
        store: &dyn EventStore,
    ) -> EngineResult<GestureOutcome> {
        match self.handle(input, cache)? {
            GestureOutcome::CommitPending(commit) => {
                let saved = self.commit(&commit, cache, store).await?;
                Ok(GestureOutcome::Committed(saved))
            }
            outcome => Ok(outcome),
        }
    }
}
