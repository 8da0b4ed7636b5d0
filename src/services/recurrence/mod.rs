//! Recurrence rule handling.
//! Encoding and decoding of the supported RRULE subset, human-readable
//! summaries, editor presets and expansion of series into occurrences.

use chrono::{DateTime, Local};

use crate::models::event::{find_rrule, CalendarEvent};
use crate::models::recurrence::RecurrenceSpec;
use crate::services::store::EventStore;

pub mod codec;
pub mod expand;
pub mod presets;
pub mod summary;

pub use codec::{
    build_rule, decode, is_rrule_line, parse_rule, truncate_until, ParsedRule, RuleParseError,
};
pub use presets::{selector_label, RecurrencePreset};
pub use summary::{summarize, summarize_long, CUSTOM_LABEL};

impl RecurrenceSpec {
    /// Parse an event's recurrence list once for editing.
    ///
    /// Rules that re-encode to something semantically different are kept
    /// verbatim as [`RecurrenceSpec::Raw`] so saving never rewrites them.
    pub fn from_recurrence(recurrence: &[String], anchor: DateTime<Local>) -> Self {
        let Some(line) = find_rrule(recurrence) else {
            return Self::None;
        };
        let Ok(parsed) = parse_rule(line) else {
            return Self::Raw(line.to_string());
        };

        let rebuilt = build_rule(&parsed.rule, anchor);
        match parse_rule(&rebuilt) {
            Ok(reparsed) if reparsed == parsed => Self::Rule(parsed.rule),
            _ => Self::Raw(line.to_string()),
        }
    }

    /// Recurrence list to send to the store on save.
    pub fn to_recurrence(&self, anchor: DateTime<Local>) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::Rule(rule) => vec![build_rule(rule, anchor)],
            Self::Raw(raw) => vec![raw.clone()],
        }
    }

    /// Recurrence list for an existing master: the RRULE entry is replaced
    /// in place and every other line is kept. Clearing the rule clears the
    /// whole list.
    pub fn merge_into(&self, existing: &[String], anchor: DateTime<Local>) -> Vec<String> {
        let mut rule_lines = self.to_recurrence(anchor);
        let Some(rule) = rule_lines.pop() else {
            return Vec::new();
        };

        let mut merged = Vec::with_capacity(existing.len() + 1);
        let mut replaced = false;
        for line in existing {
            if !is_rrule_line(line) {
                merged.push(line.clone());
            } else if !replaced {
                merged.push(rule.clone());
                replaced = true;
            }
        }
        if !replaced {
            merged.insert(0, rule);
        }
        merged
    }

    pub fn summary(&self, anchor: DateTime<Local>) -> Option<String> {
        match self {
            Self::None => None,
            Self::Rule(rule) => Some(summarize_long(&build_rule(rule, anchor), anchor)),
            Self::Raw(raw) => Some(summarize_long(raw, anchor)),
        }
    }

    /// Whether the rule is one of the editor presets for `anchor`.
    pub fn is_preset(&self, anchor: DateTime<Local>) -> bool {
        let rule = match self {
            Self::None => return false,
            Self::Rule(rule) => build_rule(rule, anchor),
            Self::Raw(raw) => raw.clone(),
        };
        RecurrencePreset::matching(&rule, anchor).is_some()
    }
}

/// Find the RRULE governing `event`: its own, or for an instance, its
/// master's. Lookup failures are logged and yield `None`.
pub async fn resolve_series_rule(event: &CalendarEvent, store: &dyn EventStore) -> Option<String> {
    if let Some(rule) = event.rrule() {
        return Some(rule.to_string());
    }
    let master_id = event.recurring_event_id.as_deref()?;
    match store.get_event(master_id).await {
        Ok(master) => master.rrule().map(str::to_string),
        Err(err) => {
            log::warn!("Failed to load series {} for {}: {:#}", master_id, event.id, err);
            None
        }
    }
}

/// Long summary of the series `event` belongs to, if any.
pub async fn describe_series(event: &CalendarEvent, store: &dyn EventStore) -> Option<String> {
    let rule = resolve_series_rule(event, store).await?;
    Some(summarize_long(&rule, event.start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recurrence::{Frequency, RecurrenceRule, Weekday};
    use crate::services::store::{MockEventStore, StoreError};
    use chrono::TimeZone;
    use mockall::predicate::eq;

    fn anchor() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 13, 9, 0, 0).single().unwrap()
    }

    fn instance() -> CalendarEvent {
        let mut event = CalendarEvent::new(
            "series1_20250114T090000Z",
            "Standup",
            anchor(),
            anchor() + chrono::Duration::minutes(15),
        )
        .unwrap();
        event.recurring_event_id = Some("series1".to_string());
        event.original_start_time = Some(event.start);
        event
    }

    #[test]
    fn test_spec_from_codec_rule_is_structured() {
        let rule = RecurrenceRule::new(Frequency::Weekly)
            .every(2)
            .on_days([Weekday::Monday, Weekday::Friday]);
        let lines = vec![build_rule(&rule, anchor())];
        assert_eq!(
            RecurrenceSpec::from_recurrence(&lines, anchor()),
            RecurrenceSpec::Rule(rule)
        );
    }

    #[test]
    fn test_spec_keeps_truncated_rule_raw() {
        let line = "RRULE:FREQ=DAILY;UNTIL=20250120T080000Z".to_string();
        assert_eq!(
            RecurrenceSpec::from_recurrence(&[line.clone()], anchor()),
            RecurrenceSpec::Raw(line)
        );
    }

    #[test]
    fn test_spec_keeps_unsupported_rule_raw() {
        let line = "RRULE:FREQ=HOURLY;INTERVAL=4".to_string();
        let spec = RecurrenceSpec::from_recurrence(&[line.clone()], anchor());
        assert_eq!(spec, RecurrenceSpec::Raw(line.clone()));
        assert_eq!(spec.to_recurrence(anchor()), vec![line]);
        assert_eq!(spec.summary(anchor()).as_deref(), Some(CUSTOM_LABEL));
    }

    #[test]
    fn test_spec_none_without_rrule() {
        let lines = vec!["EXDATE:20250101T000000Z".to_string()];
        let spec = RecurrenceSpec::from_recurrence(&lines, anchor());
        assert_eq!(spec, RecurrenceSpec::None);
        assert!(spec.to_recurrence(anchor()).is_empty());
        assert_eq!(spec.summary(anchor()), None);
    }

    #[test]
    fn test_merge_replaces_only_the_rule_line() {
        let existing = vec![
            "EXDATE:20250115T090000Z".to_string(),
            "RRULE:FREQ=DAILY;INTERVAL=1".to_string(),
            "RDATE:20250201T090000Z".to_string(),
        ];
        let spec = RecurrenceSpec::Rule(RecurrenceRule::new(Frequency::Daily).every(2));
        assert_eq!(
            spec.merge_into(&existing, anchor()),
            vec![
                "EXDATE:20250115T090000Z".to_string(),
                "RRULE:FREQ=DAILY;INTERVAL=2".to_string(),
                "RDATE:20250201T090000Z".to_string(),
            ]
        );

        let unchanged = RecurrenceSpec::from_recurrence(&existing, anchor());
        assert_eq!(unchanged.merge_into(&existing, anchor()), existing);
        assert!(RecurrenceSpec::None.merge_into(&existing, anchor()).is_empty());
    }

    #[test]
    fn test_merge_adds_rule_when_missing() {
        let existing = vec!["EXDATE:20250115T090000Z".to_string()];
        let spec = RecurrenceSpec::Rule(RecurrenceRule::new(Frequency::Weekly));
        let merged = spec.merge_into(&existing, anchor());
        assert_eq!(merged.len(), 2);
        assert!(is_rrule_line(&merged[0]));
        assert_eq!(merged[1], existing[0]);
    }

    #[test]
    fn test_spec_preset_detection() {
        let weekly = RecurrenceSpec::Rule(RecurrenceRule::new(Frequency::Weekly));
        assert!(weekly.is_preset(anchor()));

        let fortnightly = RecurrenceSpec::Rule(RecurrenceRule::new(Frequency::Weekly).every(2));
        assert!(!fortnightly.is_preset(anchor()));

        assert!(RecurrenceSpec::Raw("RRULE:FREQ=DAILY".to_string()).is_preset(anchor()));
        assert!(!RecurrenceSpec::None.is_preset(anchor()));
    }

    #[tokio::test]
    async fn test_resolve_uses_own_rule_without_lookup() {
        let store = MockEventStore::new();
        let mut master = instance();
        master.recurring_event_id = None;
        master.recurrence = vec!["RRULE:FREQ=DAILY".to_string()];

        let rule = resolve_series_rule(&master, &store).await;
        assert_eq!(rule.as_deref(), Some("RRULE:FREQ=DAILY"));
    }

    #[tokio::test]
    async fn test_resolve_fetches_master_for_instance() {
        let mut store = MockEventStore::new();
        store
            .expect_get_event()
            .with(eq("series1"))
            .times(1)
            .returning(|_| {
                let mut master = instance();
                master.id = "series1".to_string();
                master.recurring_event_id = None;
                master.recurrence = vec!["RRULE:FREQ=WEEKLY;BYDAY=MO".to_string()];
                Ok(master)
            });

        let text = describe_series(&instance(), &store).await;
        assert_eq!(text.as_deref(), Some("Every week on Monday"));
    }

    #[tokio::test]
    async fn test_resolve_lookup_failure_is_none() {
        let mut store = MockEventStore::new();
        store
            .expect_get_event()
            .returning(|id| Err(StoreError::NotFound(id.to_string()).into()));

        assert_eq!(resolve_series_rule(&instance(), &store).await, None);
    }

    #[tokio::test]
    async fn test_plain_event_has_no_series() {
        let store = MockEventStore::new();
        let mut event = instance();
        event.recurring_event_id = None;
        assert_eq!(resolve_series_rule(&event, &store).await, None);
    }
}
