//! Deleting events, with a scope choice for recurring series.

use chrono::{DateTime, Local};

use crate::error::{EngineError, EngineResult};
use crate::models::event::CalendarEvent;
use crate::services::cache::OptimisticEventCache;
use crate::services::store::{DeletionMode, EventStore, ScopedDeletion};

/// How an event has to be deleted.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletionPlan {
    /// Plain event: delete by id, no questions asked.
    Direct { event_id: String },
    /// Part of a series: the user picks a scope first.
    Scoped(ScopePrompt),
}

/// The scope question shown for a recurring event.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopePrompt {
    event_id: String,
    recurring_event_id: Option<String>,
    original_start_time: Option<DateTime<Local>>,
    selected: DeletionMode,
}

impl ScopePrompt {
    pub const OPTIONS: [DeletionMode; 3] = [
        DeletionMode::Instance,
        DeletionMode::Following,
        DeletionMode::All,
    ];

    fn for_event(event: &CalendarEvent) -> Self {
        Self {
            event_id: event.id.clone(),
            recurring_event_id: event.recurring_event_id.clone(),
            original_start_time: event.original_start_time,
            selected: DeletionMode::Instance,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn options(&self) -> &'static [DeletionMode] {
        &Self::OPTIONS
    }

    pub fn selected(&self) -> DeletionMode {
        self.selected
    }

    pub fn select(&mut self, mode: DeletionMode) {
        self.selected = mode;
    }

    /// The request sent to the store for the selected scope.
    pub fn request(&self) -> ScopedDeletion {
        ScopedDeletion {
            event_id: self.event_id.clone(),
            mode: self.selected,
            recurring_event_id: self.recurring_event_id.clone(),
            original_start_time: self.original_start_time,
        }
    }
}

/// Turns a delete action into either a direct deletion or a scope prompt,
/// and carries out the user's choice.
pub struct RecurringDeletionResolver;

impl RecurringDeletionResolver {
    pub fn plan(event: &CalendarEvent) -> DeletionPlan {
        if event.is_recurring() {
            DeletionPlan::Scoped(ScopePrompt::for_event(event))
        } else {
            DeletionPlan::Direct {
                event_id: event.id.clone(),
            }
        }
    }

    /// Delete a plain event and drop it from the cache. The cache is only
    /// touched once the store succeeds.
    pub async fn delete_plain(
        event_id: &str,
        cache: &mut OptimisticEventCache,
        store: &dyn EventStore,
    ) -> EngineResult<()> {
        store.delete_event(event_id).await.map_err(|err| {
            log::error!("Failed to delete event {}: {:#}", event_id, err);
            EngineError::from(err)
        })?;
        cache.remove(event_id);
        log::info!("Deleted event {}", event_id);
        Ok(())
    }

    /// Send the chosen scope to the store, then reload the visible range
    /// since any number of occurrences may have changed.
    pub async fn confirm(
        prompt: &ScopePrompt,
        cache: &mut OptimisticEventCache,
        store: &dyn EventStore,
    ) -> EngineResult<usize> {
        let request = prompt.request();
        log::debug!(
            "Deleting {} of series {} (event {})",
            request.mode.label(),
            request.master_id(),
            request.event_id
        );
        store
            .delete_recurring_scope(request.clone())
            .await
            .map_err(|err| {
                log::error!(
                    "Failed to delete {:?} scope of event {}: {:#}",
                    request.mode,
                    request.event_id,
                    err
                );
                EngineError::from(err)
            })?;
        let refetched = cache.refetch(store).await?;
        log::info!(
            "Deleted {:?} scope of event {}; {} event(s) now visible",
            request.mode,
            request.event_id,
            refetched
        );
        Ok(refetched)
    }

    /// Run a plan. `mode` answers the scope prompt and is ignored for plain
    /// events.
    pub async fn execute(
        plan: &DeletionPlan,
        mode: DeletionMode,
        cache: &mut OptimisticEventCache,
        store: &dyn EventStore,
    ) -> EngineResult<()> {
        match plan {
            DeletionPlan::Direct { event_id } => Self::delete_plain(event_id, cache, store).await,
            DeletionPlan::Scoped(prompt) => {
                let mut prompt = prompt.clone();
                prompt.select(mode);
                Self::confirm(&prompt, cache, store).await.map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MockEventStore;
    use chrono::{Duration, TimeZone};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    fn at(d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 7, d, h, 0, 0).single().unwrap()
    }

    fn plain() -> CalendarEvent {
        CalendarEvent::new("plain", "Dentist", at(8, 9), at(8, 10)).unwrap()
    }

    fn master() -> CalendarEvent {
        let mut event = CalendarEvent::new("series", "Standup", at(7, 9), at(7, 9) + Duration::minutes(15)).unwrap();
        event.recurrence = vec!["RRULE:FREQ=DAILY;INTERVAL=1".to_string()];
        event
    }

    fn instance() -> CalendarEvent {
        let mut event = master();
        event.id = "series_20250709T090000Z".to_string();
        event.start = at(9, 9);
        event.end = at(9, 9) + Duration::minutes(15);
        event.recurrence.clear();
        event.recurring_event_id = Some("series".to_string());
        event.original_start_time = Some(at(9, 9));
        event
    }

    fn cache_with(events: Vec<CalendarEvent>) -> OptimisticEventCache {
        let mut cache = OptimisticEventCache::new();
        cache.set_visible_range(at(7, 0), at(14, 0));
        cache.replace_all(events);
        cache
    }

    #[test]
    fn test_plain_event_never_prompts() {
        assert_eq!(
            RecurringDeletionResolver::plan(&plain()),
            DeletionPlan::Direct {
                event_id: "plain".to_string()
            }
        );
    }

    #[test]
    fn test_blank_recurrence_is_plain() {
        let mut event = plain();
        event.recurrence = vec![String::new(), "  ".to_string()];
        assert!(!event.is_recurring());
        assert!(matches!(
            RecurringDeletionResolver::plan(&event),
            DeletionPlan::Direct { .. }
        ));
    }

    #[test]
    fn test_recurring_events_offer_three_scopes() {
        for event in [master(), instance()] {
            let DeletionPlan::Scoped(prompt) = RecurringDeletionResolver::plan(&event) else {
                panic!("expected a scope prompt for {}", event.id);
            };
            assert_eq!(prompt.options().len(), 3);
            assert_eq!(prompt.selected(), DeletionMode::Instance);
        }
    }

    #[test]
    fn test_request_carries_series_identity() {
        let DeletionPlan::Scoped(mut prompt) = RecurringDeletionResolver::plan(&instance()) else {
            panic!("expected a scope prompt");
        };
        prompt.select(DeletionMode::Following);
        assert_eq!(
            prompt.request(),
            ScopedDeletion {
                event_id: "series_20250709T090000Z".to_string(),
                mode: DeletionMode::Following,
                recurring_event_id: Some("series".to_string()),
                original_start_time: Some(at(9, 9)),
            }
        );

        let DeletionPlan::Scoped(prompt) = RecurringDeletionResolver::plan(&master()) else {
            panic!("expected a scope prompt");
        };
        let request = prompt.request();
        assert_eq!(request.recurring_event_id, None);
        assert_eq!(request.original_start_time, None);
    }

    #[tokio::test]
    async fn test_plain_delete_removes_from_cache() {
        let mut store = MockEventStore::new();
        store
            .expect_delete_event()
            .with(eq("plain"))
            .times(1)
            .returning(|_| Ok(()));
        store.expect_list_events().never();

        let mut cache = cache_with(vec![plain(), instance()]);
        let plan = RecurringDeletionResolver::plan(&plain());
        RecurringDeletionResolver::execute(&plan, DeletionMode::All, &mut cache, &store)
            .await
            .unwrap();

        assert!(cache.get("plain").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_plain_delete_failure_keeps_cache() {
        let mut store = MockEventStore::new();
        store
            .expect_delete_event()
            .returning(|_| Err(anyhow::anyhow!("offline")));

        let mut cache = cache_with(vec![plain()]);
        let result = RecurringDeletionResolver::delete_plain("plain", &mut cache, &store).await;
        assert!(matches!(result, Err(EngineError::Store(_))));
        assert!(cache.get("plain").is_some());
    }

    #[tokio::test]
    async fn test_scoped_delete_refetches_visible_range() {
        let expected = ScopedDeletion {
            event_id: "series_20250709T090000Z".to_string(),
            mode: DeletionMode::All,
            recurring_event_id: Some("series".to_string()),
            original_start_time: Some(at(9, 9)),
        };
        let mut store = MockEventStore::new();
        store
            .expect_delete_recurring_scope()
            .with(eq(expected))
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_list_events()
            .with(eq(at(7, 0)), eq(at(14, 0)))
            .times(1)
            .returning(|_, _| Ok(vec![plain()]));

        let mut cache = cache_with(vec![plain(), instance()]);
        let plan = RecurringDeletionResolver::plan(&instance());
        RecurringDeletionResolver::execute(&plan, DeletionMode::All, &mut cache, &store)
            .await
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.get("plain").is_some());
    }

    #[tokio::test]
    async fn test_scoped_delete_failure_leaves_cache_untouched() {
        let mut store = MockEventStore::new();
        store
            .expect_delete_recurring_scope()
            .returning(|_| Err(anyhow::anyhow!("server error")));
        store.expect_list_events().never();

        let mut cache = cache_with(vec![instance()]);
        let DeletionPlan::Scoped(prompt) = RecurringDeletionResolver::plan(&instance()) else {
            panic!("expected a scope prompt");
        };
        let result = RecurringDeletionResolver::confirm(&prompt, &mut cache, &store).await;

        assert!(result.is_err());
        assert_eq!(cache.get("series_20250709T090000Z"), Some(&instance()));
    }
}
