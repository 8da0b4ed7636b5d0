// Recurrence module
// Structured form of the RRULE subset understood by the engine

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
            Self::Yearly => "Yearly",
        }
    }

    pub fn to_rrule_freq(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    pub fn from_rrule_freq(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Some(Self::Daily),
            "WEEKLY" => Some(Self::Weekly),
            "MONTHLY" => Some(Self::Monthly),
            "YEARLY" => Some(Self::Yearly),
            _ => None,
        }
    }

    /// Singular unit noun used in summaries ("day", "week", ...).
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Daily => "day",
            Self::Weekly => "week",
            Self::Monthly => "month",
            Self::Yearly => "year",
        }
    }
}

/// Day of week, ordered and indexed from Sunday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sunday => "Sunday",
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
        }
    }

    pub fn to_rrule_day(&self) -> &'static str {
        match self {
            Self::Sunday => "SU",
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
            Self::Saturday => "SA",
        }
    }

    pub fn from_rrule_day(day: &str) -> Option<Self> {
        match day.trim().to_ascii_uppercase().as_str() {
            "SU" => Some(Self::Sunday),
            "MO" => Some(Self::Monday),
            "TU" => Some(Self::Tuesday),
            "WE" => Some(Self::Wednesday),
            "TH" => Some(Self::Thursday),
            "FR" => Some(Self::Friday),
            "SA" => Some(Self::Saturday),
            _ => None,
        }
    }

    pub fn from_index(index: u8) -> Self {
        match index % 7 {
            0 => Self::Sunday,
            1 => Self::Monday,
            2 => Self::Tuesday,
            3 => Self::Wednesday,
            4 => Self::Thursday,
            5 => Self::Friday,
            _ => Self::Saturday,
        }
    }

    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn of_date(date: NaiveDate) -> Self {
        Self::from_index(date.weekday().num_days_from_sunday() as u8)
    }

    pub fn to_chrono(&self) -> chrono::Weekday {
        match self {
            Self::Sunday => chrono::Weekday::Sun,
            Self::Monday => chrono::Weekday::Mon,
            Self::Tuesday => chrono::Weekday::Tue,
            Self::Wednesday => chrono::Weekday::Wed,
            Self::Thursday => chrono::Weekday::Thu,
            Self::Friday => chrono::Weekday::Fri,
            Self::Saturday => chrono::Weekday::Sat,
        }
    }

    pub fn all() -> [Self; 7] {
        [
            Self::Sunday,
            Self::Monday,
            Self::Tuesday,
            Self::Wednesday,
            Self::Thursday,
            Self::Friday,
            Self::Saturday,
        ]
    }
}

/// How a series stops repeating. Exactly one mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum EndCondition {
    #[default]
    Never,
    /// Last calendar date (local) on which an occurrence may start.
    Until(NaiveDate),
    /// Total number of occurrences, at least one.
    Count(u32),
}

/// Structured recurrence rule; `by_month_day`/`by_month` are derived from
/// the event's anchor date when the rule is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: u32,
    /// Only meaningful for weekly rules.
    pub by_day: BTreeSet<Weekday>,
    pub end: EndCondition,
}

impl RecurrenceRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            by_day: BTreeSet::new(),
            end: EndCondition::Never,
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn on_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.by_day = days.into_iter().collect();
        self
    }

    pub fn until(mut self, date: NaiveDate) -> Self {
        self.end = EndCondition::Until(date);
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.end = EndCondition::Count(count.max(1));
        self
    }

    /// Interval with the "at least one" floor applied.
    pub fn effective_interval(&self) -> u32 {
        self.interval.max(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.interval == 0 {
            return Err("Recurrence interval must be at least 1".to_string());
        }
        if let EndCondition::Count(0) = self.end {
            return Err("Occurrence count must be at least 1".to_string());
        }
        if self.freq != Frequency::Weekly && !self.by_day.is_empty() {
            return Err("Weekdays can only be selected for weekly rules".to_string());
        }
        Ok(())
    }
}

/// Editor-facing recurrence state: parsed once, re-synthesized only on save.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecurrenceSpec {
    /// Does not repeat.
    #[default]
    None,
    Rule(RecurrenceRule),
    /// A rule this engine cannot represent structurally; kept verbatim.
    Raw(String),
}

impl RecurrenceSpec {
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Self::None)
    }
}
