use chrono::{DateTime, Datelike, Local};
use serde::{Deserialize, Serialize};

use super::summary::summarize_long;
use crate::models::event::RRULE_MARKER;
use crate::models::recurrence::{RecurrenceSpec, Weekday};

use super::codec::{build_rule, parse_rule};

/// Quick choices offered by the editor, each relative to the event's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrencePreset {
    Daily,
    WeeklyOnAnchorDay,
    MonthlyOnAnchorDay,
    YearlyOnAnchorDate,
    Weekdays,
}

impl RecurrencePreset {
    pub fn all() -> [Self; 5] {
        [
            Self::Daily,
            Self::WeeklyOnAnchorDay,
            Self::MonthlyOnAnchorDay,
            Self::YearlyOnAnchorDate,
            Self::Weekdays,
        ]
    }

    pub fn rule(&self, anchor: DateTime<Local>) -> String {
        let body = match self {
            Self::Daily => "FREQ=DAILY".to_string(),
            Self::WeeklyOnAnchorDay => format!(
                "FREQ=WEEKLY;BYDAY={}",
                Weekday::of_date(anchor.date_naive()).to_rrule_day()
            ),
            Self::MonthlyOnAnchorDay => format!("FREQ=MONTHLY;BYMONTHDAY={}", anchor.day()),
            Self::YearlyOnAnchorDate => format!(
                "FREQ=YEARLY;BYMONTHDAY={};BYMONTH={}",
                anchor.day(),
                anchor.month()
            ),
            Self::Weekdays => "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR".to_string(),
        };
        format!("{}{}", RRULE_MARKER, body)
    }

    pub fn label(&self, anchor: DateTime<Local>) -> String {
        match self {
            Self::Daily => "Daily".to_string(),
            Self::WeeklyOnAnchorDay => format!(
                "Weekly on {}",
                Weekday::of_date(anchor.date_naive()).as_str()
            ),
            Self::MonthlyOnAnchorDay => format!("Monthly on day {}", anchor.day()),
            Self::YearlyOnAnchorDate => {
                format!("Annually on {}/{}", anchor.day(), anchor.month())
            }
            Self::Weekdays => "Every weekday (Mon–Fri)".to_string(),
        }
    }

    /// Find the preset equivalent to `rule`. Rules that fail to parse only
    /// match on identical text (ignoring case).
    pub fn matching(rule: &str, anchor: DateTime<Local>) -> Option<Self> {
        let rule = rule.trim();
        let parsed = parse_rule(rule).ok();
        Self::all().into_iter().find(|preset| {
            let preset_rule = preset.rule(anchor);
            match &parsed {
                Some(parsed) => parse_rule(&preset_rule).ok().as_ref() == Some(parsed),
                None => preset_rule.eq_ignore_ascii_case(rule),
            }
        })
    }
}

/// Text shown on the editor's recurrence selector.
pub fn selector_label(spec: &RecurrenceSpec, anchor: DateTime<Local>) -> String {
    let rule = match spec {
        RecurrenceSpec::None => return "Does not repeat".to_string(),
        RecurrenceSpec::Rule(rule) => build_rule(rule, anchor),
        RecurrenceSpec::Raw(raw) => raw.clone(),
    };
    match RecurrencePreset::matching(&rule, anchor) {
        Some(preset) => preset.label(anchor),
        None => format!("Custom — {}", summarize_long(&rule, anchor)),
    }
}
