use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use crate::models::event::RRULE_MARKER;
use crate::models::recurrence::{EndCondition, Frequency, RecurrenceRule, Weekday};
use crate::utils::date::end_of_local_day_utc;

const UNTIL_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("Recurrence rule is empty")]
    Empty,
    #[error("Recurrence rule has no FREQ")]
    MissingFrequency,
    #[error("Unsupported recurrence frequency: {0}")]
    UnsupportedFrequency(String),
    #[error("Invalid UNTIL value: {0}")]
    InvalidUntil(String),
    #[error("Invalid COUNT value: {0}")]
    InvalidCount(String),
}

/// A decoded rule plus the exact values the structured form does not keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRule {
    pub rule: RecurrenceRule,
    /// Exact UNTIL instant; `rule.end` only holds its local date.
    pub until: Option<DateTime<Utc>>,
    pub by_month_day: Option<i32>,
    pub by_month: Option<u32>,
}

/// Format an instant as an RRULE UTC timestamp (`YYYYMMDDTHHMMSSZ`).
pub fn format_until(instant: DateTime<Utc>) -> String {
    instant.format(UNTIL_FORMAT).to_string()
}

pub fn is_rrule_line(line: &str) -> bool {
    line.trim_start()
        .get(..RRULE_MARKER.len())
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case(RRULE_MARKER))
}

/// Encode a structured rule against the event's anchor start.
pub fn build_rule(rule: &RecurrenceRule, anchor: DateTime<Local>) -> String {
    let mut parts = vec![
        format!("FREQ={}", rule.freq.to_rrule_freq()),
        format!("INTERVAL={}", rule.effective_interval()),
    ];

    match rule.freq {
        Frequency::Daily => {}
        Frequency::Weekly => {
            let days: Vec<&str> = if rule.by_day.is_empty() {
                vec![Weekday::of_date(anchor.date_naive()).to_rrule_day()]
            } else {
                rule.by_day.iter().map(|d| d.to_rrule_day()).collect()
            };
            parts.push(format!("BYDAY={}", days.join(",")));
        }
        Frequency::Monthly => {
            parts.push(format!("BYMONTHDAY={}", anchor.day()));
        }
        Frequency::Yearly => {
            parts.push(format!("BYMONTH={}", anchor.month()));
            parts.push(format!("BYMONTHDAY={}", anchor.day()));
        }
    }

    match rule.end {
        EndCondition::Never => {}
        EndCondition::Until(date) => {
            parts.push(format!("UNTIL={}", format_until(end_of_local_day_utc(date))));
        }
        EndCondition::Count(count) => {
            parts.push(format!("COUNT={}", count.max(1)));
        }
    }

    format!("{}{}", RRULE_MARKER, parts.join(";"))
}

fn strip_marker(rule: &str) -> &str {
    let trimmed = rule.trim();
    if is_rrule_line(trimmed) {
        &trimmed[RRULE_MARKER.len()..]
    } else {
        trimmed
    }
}

/// Split `KEY=VALUE;...` into an upper-cased key map. Malformed segments
/// are skipped; the last occurrence of a repeated key wins.
fn tokens(body: &str) -> HashMap<String, String> {
    body.split(';')
        .filter_map(|segment| segment.split_once('='))
        .map(|(key, value)| (key.trim().to_ascii_uppercase(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Parse an UNTIL value: `YYYYMMDD`, `YYYYMMDDTHHMMSS` (floating, read as
/// local) or `YYYYMMDDTHHMMSSZ`.
pub fn parse_until_value(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some(Utc.from_utc_datetime(&naive));
    }
    if value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        return Some(end_of_local_day_utc(date));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Decode a rule string. Unknown keys are ignored; UNTIL takes precedence
/// over COUNT when both appear.
pub fn parse_rule(rule: &str) -> Result<ParsedRule, RuleParseError> {
    let body = strip_marker(rule);
    if body.is_empty() {
        return Err(RuleParseError::Empty);
    }

    let map = tokens(body);
    let freq_value = map.get("FREQ").ok_or(RuleParseError::MissingFrequency)?;
    let freq = Frequency::from_rrule_freq(freq_value)
        .ok_or_else(|| RuleParseError::UnsupportedFrequency(freq_value.clone()))?;

    let interval = map
        .get("INTERVAL")
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1);

    let by_day: BTreeSet<Weekday> = if freq == Frequency::Weekly {
        map.get("BYDAY")
            .map(|days| days.split(',').filter_map(Weekday::from_rrule_day).collect())
            .unwrap_or_default()
    } else {
        BTreeSet::new()
    };

    let until = match map.get("UNTIL") {
        Some(value) => Some(
            parse_until_value(value).ok_or_else(|| RuleParseError::InvalidUntil(value.clone()))?,
        ),
        None => None,
    };

    let end = match until {
        Some(instant) => EndCondition::Until(instant.with_timezone(&Local).date_naive()),
        None => match map.get("COUNT") {
            Some(value) => {
                let count = value
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| RuleParseError::InvalidCount(value.clone()))?;
                EndCondition::Count(count)
            }
            None => EndCondition::Never,
        },
    };

    let by_month_day = map
        .get("BYMONTHDAY")
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<i32>().ok())
        .filter(|d| *d != 0 && (-31..=31).contains(d));
    let by_month = map
        .get("BYMONTH")
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|m| (1..=12).contains(m));

    Ok(ParsedRule {
        rule: RecurrenceRule {
            freq,
            interval,
            by_day,
            end,
        },
        until,
        by_month_day,
        by_month,
    })
}

/// Convenience wrapper returning only the structured rule.
pub fn decode(rule: &str) -> Option<RecurrenceRule> {
    parse_rule(rule).ok().map(|parsed| parsed.rule)
}

/// Replace any end condition on `rule` with `UNTIL=<instant>`.
///
/// Other tokens are kept in their original order and spelling.
pub fn truncate_until(rule: &str, instant: DateTime<Utc>) -> String {
    let body = strip_marker(rule);
    let mut parts: Vec<&str> = body
        .split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter(|segment| {
            let key = segment
                .split_once('=')
                .map(|(key, _)| key.trim())
                .unwrap_or(segment);
            !key.eq_ignore_ascii_case("UNTIL") && !key.eq_ignore_ascii_case("COUNT")
        })
        .collect();
    let until = format!("UNTIL={}", format_until(instant));
    parts.push(&until);
    format!("{}{}", RRULE_MARKER, parts.join(";"))
}
