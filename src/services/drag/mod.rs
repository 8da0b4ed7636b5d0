//! Pointer-driven move and resize of events on the time grid.
//!
//! [`session`] holds the per-gesture state and its pure transitions,
//! [`controller`] owns the active session and talks to the cache and store.

pub mod controller;
pub mod input;
pub mod session;

pub use controller::{transition, DragEffect, DragInteractionController, DragState, GestureOutcome};
pub use input::{EventHandle, GridPoint, PointerInput, PointerPhase, PointerTarget};
pub use session::{DragCommit, DragKind, DragSession};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::event::{CalendarEvent, EventPatch};
    use crate::models::settings::{CommitFailurePolicy, EngineSettings};
    use crate::services::cache::OptimisticEventCache;
    use crate::services::store::MockEventStore;
    use chrono::{DateTime, Duration, Local, TimeZone};
    use mockall::predicate::eq;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 15, h, m, 0).single().unwrap()
    }

    fn planning() -> CalendarEvent {
        CalendarEvent::new("evt", "Planning", at(9, 0), at(10, 0)).unwrap()
    }

    fn setup(policy: CommitFailurePolicy) -> (DragInteractionController, OptimisticEventCache) {
        let mut settings = EngineSettings::default();
        settings.drag.commit_failure_policy = policy;
        let mut controller = DragInteractionController::from_settings(&settings);
        controller.geometry_mut().set_container_width(700.0);

        let mut cache = OptimisticEventCache::new();
        cache.replace_all(vec![planning()]);
        (controller, cache)
    }

    fn point(y: f64) -> GridPoint {
        GridPoint::new(250.0, y)
    }

    fn press(controller: &mut DragInteractionController, cache: &mut OptimisticEventCache, handle: EventHandle) {
        let down = PointerInput::down(1, point(880.0), at(12, 0)).on_event("evt", handle);
        controller.handle(&down, cache).unwrap();
    }

    #[tokio::test]
    async fn test_click_without_motion_opens_event() {
        let (mut controller, mut cache) = setup(CommitFailurePolicy::Rollback);
        let mut store = MockEventStore::new();
        store.expect_update_event().never();

        press(&mut controller, &mut cache, EventHandle::Body);
        let wiggle = PointerInput::moved(1, point(882.0), at(12, 0));
        assert_eq!(controller.handle(&wiggle, &mut cache).unwrap(), GestureOutcome::Idle);

        let up = PointerInput::up(1, point(882.0), at(12, 0));
        let outcome = controller.dispatch(&up, &mut cache, &store).await.unwrap();
        assert_eq!(outcome, GestureOutcome::OpenEvent { event_id: "evt".to_string() });
        assert!(!controller.is_active());
        assert_eq!(controller.state().last_drag_finished_at, None);
    }

    #[tokio::test]
    async fn test_move_previews_then_commits() {
        let (mut controller, mut cache) = setup(CommitFailurePolicy::Rollback);
        let mut store = MockEventStore::new();
        store
            .expect_update_event()
            .with(eq("evt"), eq(EventPatch::times(Some(at(9, 30)), Some(at(10, 30)))))
            .times(1)
            .returning(|_, _| {
                let mut saved = planning();
                saved.start = at(9, 30);
                saved.end = at(10, 30);
                saved.summary = "Planning (server)".to_string();
                Ok(saved)
            });

        press(&mut controller, &mut cache, EventHandle::Body);
        let drag = PointerInput::moved(1, point(920.0), at(12, 0));
        let outcome = controller.handle(&drag, &mut cache).unwrap();
        assert_eq!(
            outcome,
            GestureOutcome::Previewed {
                event_id: "evt".to_string(),
                start: at(9, 30),
                end: at(10, 30),
            }
        );
        assert_eq!(cache.get("evt").unwrap().start, at(9, 30));

        let up = PointerInput::up(1, point(920.0), at(12, 0));
        let outcome = controller.dispatch(&up, &mut cache, &store).await.unwrap();
        assert!(matches!(outcome, GestureOutcome::Committed(ref e) if e.start == at(9, 30)));
        assert_eq!(cache.get("evt").unwrap().summary, "Planning (server)");
        assert_eq!(controller.state().last_drag_finished_at, Some(at(12, 0)));
    }

    #[tokio::test]
    async fn test_resize_bottom_sends_end_only() {
        let (mut controller, mut cache) = setup(CommitFailurePolicy::Rollback);
        let mut store = MockEventStore::new();
        store
            .expect_update_event()
            .with(eq("evt"), eq(EventPatch::times(None, Some(at(10, 30)))))
            .times(1)
            .returning(|_, _| {
                let mut saved = planning();
                saved.end = at(10, 30);
                Ok(saved)
            });

        press(&mut controller, &mut cache, EventHandle::Bottom);
        let up = PointerInput::up(1, point(928.0), at(12, 0));
        let outcome = controller.dispatch(&up, &mut cache, &store).await.unwrap();
        assert!(matches!(outcome, GestureOutcome::Committed(_)));
        assert_eq!(cache.get("evt").unwrap().end, at(10, 30));
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let (mut controller, mut cache) = setup(CommitFailurePolicy::Rollback);
        let mut store = MockEventStore::new();
        store
            .expect_update_event()
            .returning(|_, _| Err(anyhow::anyhow!("server unavailable")));

        press(&mut controller, &mut cache, EventHandle::Body);
        let up = PointerInput::up(1, point(976.0), at(12, 0));
        let result = controller.dispatch(&up, &mut cache, &store).await;

        assert!(matches!(result, Err(EngineError::Store(_))));
        let cached = cache.get("evt").unwrap();
        assert_eq!((cached.start, cached.end), (at(9, 0), at(10, 0)));
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn test_failed_commit_can_keep_optimistic_times() {
        let (mut controller, mut cache) = setup(CommitFailurePolicy::KeepOptimistic);
        let mut store = MockEventStore::new();
        store
            .expect_update_event()
            .returning(|_, _| Err(anyhow::anyhow!("server unavailable")));

        press(&mut controller, &mut cache, EventHandle::Body);
        let up = PointerInput::up(1, point(976.0), at(12, 0));
        assert!(controller.dispatch(&up, &mut cache, &store).await.is_err());
        assert_eq!(cache.get("evt").unwrap().start, at(10, 0));
    }

    #[tokio::test]
    async fn test_drag_back_to_origin_makes_no_call() {
        let (mut controller, mut cache) = setup(CommitFailurePolicy::Rollback);
        let mut store = MockEventStore::new();
        store.expect_update_event().never();

        press(&mut controller, &mut cache, EventHandle::Body);
        controller
            .handle(&PointerInput::moved(1, point(1000.0), at(12, 0)), &mut cache)
            .unwrap();
        let up = PointerInput::up(1, point(881.0), at(12, 0));
        let outcome = controller.dispatch(&up, &mut cache, &store).await.unwrap();

        assert_eq!(outcome, GestureOutcome::Unchanged { event_id: "evt".to_string() });
        assert_eq!(cache.get("evt").unwrap().start, at(9, 0));
        assert_eq!(controller.state().last_drag_finished_at, Some(at(12, 0)));
    }

    #[test]
    fn test_second_pointer_down_is_rejected() {
        let (mut controller, mut cache) = setup(CommitFailurePolicy::Rollback);
        press(&mut controller, &mut cache, EventHandle::Top);
        let before = controller.state().clone();

        let down = PointerInput::down(2, point(100.0), at(12, 0)).on_event("evt", EventHandle::Body);
        let result = controller.handle(&down, &mut cache);
        assert!(matches!(result, Err(EngineError::SessionActive(ref id)) if id == "evt"));
        assert_eq!(controller.state(), &before);
    }

    #[test]
    fn test_other_pointers_are_ignored() {
        let (mut controller, mut cache) = setup(CommitFailurePolicy::Rollback);
        press(&mut controller, &mut cache, EventHandle::Body);

        let stray = PointerInput::moved(7, point(1500.0), at(12, 0));
        assert_eq!(controller.handle(&stray, &mut cache).unwrap(), GestureOutcome::Idle);
        assert!(controller.active_session().unwrap().is_pending());
        assert_eq!(cache.get("evt").unwrap().start, at(9, 0));
    }

    #[test]
    fn test_cancel_restores_snapshot() {
        let (mut controller, mut cache) = setup(CommitFailurePolicy::Rollback);
        press(&mut controller, &mut cache, EventHandle::Bottom);
        controller
            .handle(&PointerInput::moved(1, point(1072.0), at(12, 0)), &mut cache)
            .unwrap();
        assert_eq!(cache.get("evt").unwrap().end, at(12, 0));

        let outcome = controller
            .handle(&PointerInput::cancel(1, at(12, 0)), &mut cache)
            .unwrap();
        assert_eq!(outcome, GestureOutcome::Cancelled { event_id: "evt".to_string() });
        assert_eq!(cache.get("evt").unwrap().end, at(10, 0));
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn test_grid_click_right_after_drag_is_suppressed() {
        let (mut controller, mut cache) = setup(CommitFailurePolicy::Rollback);
        let mut store = MockEventStore::new();
        store
            .expect_update_event()
            .returning(|_, _| Ok(planning()));

        press(&mut controller, &mut cache, EventHandle::Body);
        let up = PointerInput::up(1, point(976.0), at(12, 0));
        controller.dispatch(&up, &mut cache, &store).await.unwrap();

        let date = at(0, 0).date_naive();
        let soon = at(12, 0) + Duration::milliseconds(100);
        let click = PointerInput::up(1, point(1000.0), soon).on_slot(date);
        assert_eq!(
            controller.handle(&click, &mut cache).unwrap(),
            GestureOutcome::ClickSuppressed
        );

        let later = at(12, 0) + Duration::milliseconds(300);
        let click = PointerInput::up(1, point(1000.0), later).on_slot(date);
        assert_eq!(
            controller.handle(&click, &mut cache).unwrap(),
            GestureOutcome::QuickCreate {
                start: at(10, 0),
                end: at(11, 0),
            }
        );
    }

    #[test]
    fn test_pointer_down_on_uncached_event_is_ignored() {
        let (mut controller, mut cache) = setup(CommitFailurePolicy::Rollback);
        let down = PointerInput::down(1, point(0.0), at(12, 0)).on_event("ghost", EventHandle::Body);
        assert_eq!(controller.handle(&down, &mut cache).unwrap(), GestureOutcome::Idle);
        assert!(!controller.is_active());
    }

    #[test]
    fn test_transition_is_pure() {
        let (controller, cache) = setup(CommitFailurePolicy::Rollback);
        let state = DragState::default();
        let down = PointerInput::down(1, point(880.0), at(12, 0)).on_event("evt", EventHandle::Body);
        let settings = EngineSettings::default().drag;

        let (first, effect) = transition(&state, &down, cache.get("evt"), controller.geometry(), &settings);
        let (second, _) = transition(&state, &down, cache.get("evt"), controller.geometry(), &settings);
        assert_eq!(first, second);
        assert_eq!(state, DragState::default());
        assert_eq!(
            effect,
            DragEffect::Started {
                event_id: "evt".to_string(),
                kind: DragKind::PendingMove,
            }
        );
    }
}
