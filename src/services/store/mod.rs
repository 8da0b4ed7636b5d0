//! Event store contract.
//! The engine talks to its backing calendar only through [`EventStore`];
//! [`sqlite::SqliteEventStore`] is the local implementation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::event::{CalendarEvent, EventPatch, NewEvent};
use crate::services::recurrence::codec::{is_rrule_line, truncate_until};

pub mod sqlite;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Event with id {0} not found")]
    NotFound(String),
    #[error("Event store lock poisoned")]
    Poisoned,
}

/// Which part of a recurring series a deletion applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionMode {
    /// Only the chosen occurrence.
    Instance,
    /// The chosen occurrence and every later one.
    Following,
    /// The whole series.
    All,
}

impl DeletionMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Instance => "This event",
            Self::Following => "This and following events",
            Self::All => "All events",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedDeletion {
    pub event_id: String,
    pub mode: DeletionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_start_time: Option<DateTime<Local>>,
}

impl ScopedDeletion {
    /// The series master this request targets, falling back to the event itself.
    pub fn master_id(&self) -> &str {
        self.recurring_event_id.as_deref().unwrap_or(&self.event_id)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events (with recurring series expanded to instances) overlapping the range.
    async fn list_events(
        &self,
        range_start: DateTime<Local>,
        range_end: DateTime<Local>,
    ) -> Result<Vec<CalendarEvent>>;

    async fn get_event(&self, id: &str) -> Result<CalendarEvent>;

    async fn create_event(&self, event: NewEvent) -> Result<CalendarEvent>;

    /// Apply a partial update and return the canonical result.
    async fn update_event(&self, id: &str, patch: EventPatch) -> Result<CalendarEvent>;

    async fn delete_event(&self, id: &str) -> Result<()>;

    async fn delete_recurring_scope(&self, request: ScopedDeletion) -> Result<()> {
        delete_scope_with(self, &request).await
    }
}

/// Resolve a scoped deletion into plain store calls.
///
/// `Following` rewrites the master's RRULE to end one second before the
/// chosen occurrence. Masters without an RRULE, or requests missing the
/// series identifiers, fall back to deleting the master.
pub async fn delete_scope_with<S>(store: &S, request: &ScopedDeletion) -> Result<()>
where
    S: EventStore + ?Sized,
{
    match request.mode {
        DeletionMode::Instance => store.delete_event(&request.event_id).await,
        DeletionMode::All => store.delete_event(request.master_id()).await,
        DeletionMode::Following => {
            let (Some(master_id), Some(original_start)) = (
                request.recurring_event_id.as_deref(),
                request.original_start_time,
            ) else {
                return store.delete_event(request.master_id()).await;
            };

            let master = store.get_event(master_id).await?;
            if master.rrule().is_none() {
                log::info!("Series {} has no RRULE; deleting it outright", master_id);
                return store.delete_event(master_id).await;
            }

            let cut = following_cutoff(original_start);
            let recurrence = master
                .recurrence
                .iter()
                .map(|line| {
                    if is_rrule_line(line) {
                        truncate_until(line, cut)
                    } else {
                        line.clone()
                    }
                })
                .collect();

            let patch = EventPatch {
                recurrence: Some(recurrence),
                ..EventPatch::default()
            };
            store.update_event(master_id, patch).await?;
            Ok(())
        }
    }
}

/// Last instant the truncated series may start: one second before the
/// chosen occurrence.
pub fn following_cutoff(original_start: DateTime<Local>) -> DateTime<Utc> {
    original_start.with_timezone(&Utc) - Duration::seconds(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockall::predicate::eq;

    fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, 0, 0).single().unwrap()
    }

    fn master_with(recurrence: Vec<String>) -> CalendarEvent {
        let mut master =
            CalendarEvent::new("series1", "Standup", local(2025, 1, 6, 9), local(2025, 1, 6, 10))
                .unwrap();
        master.recurrence = recurrence;
        master
    }

    fn request(mode: DeletionMode) -> ScopedDeletion {
        ScopedDeletion {
            event_id: "series1_20250115T090000Z".to_string(),
            mode,
            recurring_event_id: Some("series1".to_string()),
            original_start_time: Some(local(2025, 1, 15, 9)),
        }
    }

    #[tokio::test]
    async fn test_instance_deletes_only_the_instance() {
        let mut store = MockEventStore::new();
        store
            .expect_delete_event()
            .with(eq("series1_20250115T090000Z"))
            .times(1)
            .returning(|_| Ok(()));

        delete_scope_with(&store, &request(DeletionMode::Instance))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_all_deletes_master() {
        let mut store = MockEventStore::new();
        store
            .expect_delete_event()
            .with(eq("series1"))
            .times(1)
            .returning(|_| Ok(()));

        delete_scope_with(&store, &request(DeletionMode::All))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_following_truncates_master_rule() {
        let mut store = MockEventStore::new();
        store
            .expect_get_event()
            .with(eq("series1"))
            .returning(|_| {
                Ok(master_with(vec![
                    "RRULE:FREQ=DAILY;COUNT=30".to_string(),
                    "EXDATE:20250110T090000Z".to_string(),
                ]))
            });
        let expected_until = following_cutoff(local(2025, 1, 15, 9));
        store
            .expect_update_event()
            .withf(move |id, patch| {
                let expected = vec![
                    format!(
                        "RRULE:FREQ=DAILY;UNTIL={}",
                        expected_until.format("%Y%m%dT%H%M%SZ")
                    ),
                    "EXDATE:20250110T090000Z".to_string(),
                ];
                id == "series1" && patch.recurrence.as_ref() == Some(&expected)
            })
            .times(1)
            .returning(|_, _| Ok(master_with(vec![])));
        store.expect_delete_event().never();

        delete_scope_with(&store, &request(DeletionMode::Following))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_following_without_series_info_deletes_event() {
        let mut store = MockEventStore::new();
        store
            .expect_delete_event()
            .with(eq("series1"))
            .times(1)
            .returning(|_| Ok(()));

        let request = ScopedDeletion {
            event_id: "series1".to_string(),
            mode: DeletionMode::Following,
            recurring_event_id: None,
            original_start_time: None,
        };
        delete_scope_with(&store, &request).await.unwrap();
    }

    #[tokio::test]
    async fn test_following_on_master_without_rule_deletes_master() {
        let mut store = MockEventStore::new();
        store
            .expect_get_event()
            .returning(|_| Ok(master_with(vec![])));
        store
            .expect_delete_event()
            .with(eq("series1"))
            .times(1)
            .returning(|_| Ok(()));
        store.expect_update_event().never();

        delete_scope_with(&store, &request(DeletionMode::Following))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_following_propagates_lookup_failure() {
        let mut store = MockEventStore::new();
        store
            .expect_get_event()
            .returning(|id| Err(StoreError::NotFound(id.to_string()).into()));
        store.expect_update_event().never();
        store.expect_delete_event().never();

        let result = delete_scope_with(&store, &request(DeletionMode::Following)).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_cutoff_is_one_second_before() {
        let start = local(2025, 1, 15, 9);
        assert_eq!(
            following_cutoff(start),
            start.with_timezone(&Utc) - Duration::seconds(1)
        );
    }

    #[test]
    fn test_mode_labels_and_serde() {
        assert_eq!(DeletionMode::Following.label(), "This and following events");
        let json = serde_json::to_string(&DeletionMode::All).unwrap();
        assert_eq!(json, "\"all\"");
    }
}
