use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::codec::{parse_rule, ParsedRule};
use crate::models::event::CalendarEvent;
use crate::models::recurrence::{EndCondition, Frequency, Weekday};
use crate::utils::date::local_datetime;

/// Upper bound on periods walked for one series.
const MAX_PERIODS: i64 = 10_000;
const INSTANCE_STAMP: &str = "%Y%m%dT%H%M%SZ";

/// Id of one generated occurrence: `<master id>_<UTC start stamp>`.
pub fn instance_id(master_id: &str, original_start: DateTime<Local>) -> String {
    format!(
        "{}_{}",
        master_id,
        original_start.with_timezone(&Utc).format(INSTANCE_STAMP)
    )
}

/// Split an instance id back into its master id and original start.
pub fn parse_instance_id(id: &str) -> Option<(&str, DateTime<Local>)> {
    let (master, stamp) = id.rsplit_once('_')?;
    if master.is_empty() {
        return None;
    }
    let stamp = stamp.strip_suffix('Z')?;
    let naive = NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M%S").ok()?;
    Some((master, Utc.from_utc_datetime(&naive).with_timezone(&Local)))
}

/// Expand a stored event into the events visible in `[range_start, range_end)`.
///
/// Non-recurring events pass through when they overlap the range. A master
/// whose rule cannot be decoded is treated as a single event.
pub fn expand_event(
    master: &CalendarEvent,
    exceptions: &[DateTime<Local>],
    range_start: DateTime<Local>,
    range_end: DateTime<Local>,
) -> Vec<CalendarEvent> {
    let parsed = match master.rrule().map(parse_rule) {
        Some(Ok(parsed)) => parsed,
        Some(Err(err)) => {
            log::warn!("Cannot expand series {}: {}", master.id, err);
            return single_if_overlapping(master, range_start, range_end);
        }
        None => return single_if_overlapping(master, range_start, range_end),
    };

    let duration = master.duration();
    occurrence_starts(&parsed, master.start, duration, range_start, range_end, exceptions)
        .into_iter()
        .map(|start| CalendarEvent {
            id: instance_id(&master.id, start),
            summary: master.summary.clone(),
            start,
            end: start + duration,
            color_id: master.color_id.clone(),
            recurrence: Vec::new(),
            recurring_event_id: Some(master.id.clone()),
            original_start_time: Some(start),
        })
        .collect()
}

fn single_if_overlapping(
    event: &CalendarEvent,
    range_start: DateTime<Local>,
    range_end: DateTime<Local>,
) -> Vec<CalendarEvent> {
    if event.overlaps(range_start, range_end) {
        vec![event.clone()]
    } else {
        Vec::new()
    }
}

/// Start times of the series occurrences overlapping `[range_start, range_end)`.
///
/// Excluded starts still count toward COUNT. Series without COUNT start
/// walking near the range instead of at the anchor.
pub fn occurrence_starts(
    parsed: &ParsedRule,
    anchor: DateTime<Local>,
    duration: Duration,
    range_start: DateTime<Local>,
    range_end: DateTime<Local>,
    exceptions: &[DateTime<Local>],
) -> Vec<DateTime<Local>> {
    let mut starts = Vec::new();
    let max_count = match parsed.rule.end {
        EndCondition::Count(count) => Some(count as usize),
        _ => None,
    };
    let anchor_date = anchor.date_naive();
    let anchor_time = anchor.time();
    let mut seen = 0usize;
    let first = match max_count {
        Some(_) => 0,
        None => first_period(parsed, anchor_date, (range_start - duration).date_naive()),
    };

    for period in first..first.saturating_add(MAX_PERIODS) {
        for date in candidate_dates(parsed, anchor_date, period) {
            let Some(start) = local_datetime(date, anchor_time) else {
                continue;
            };
            if start < anchor {
                continue;
            }
            if let Some(until) = parsed.until {
                if start.with_timezone(&Utc) > until {
                    return starts;
                }
            }
            if start >= range_end {
                return starts;
            }
            if let Some(max) = max_count {
                if seen >= max {
                    return starts;
                }
            }
            seen += 1;
            push_if_in_range(&mut starts, start, duration, range_start, exceptions);
        }
    }

    log::warn!(
        "Stopped expanding series anchored at {} after {} periods",
        anchor,
        MAX_PERIODS
    );
    starts
}

fn push_if_in_range(
    starts: &mut Vec<DateTime<Local>>,
    start: DateTime<Local>,
    duration: Duration,
    range_start: DateTime<Local>,
    exceptions: &[DateTime<Local>],
) {
    if start + duration > range_start && !is_excluded(start, exceptions) {
        starts.push(start);
    }
}

fn is_excluded(start: DateTime<Local>, exceptions: &[DateTime<Local>]) -> bool {
    exceptions.iter().any(|ex| *ex == start)
}

/// One period before the period containing `from`, or 0 when `from` is
/// not after the anchor. Earlier periods only produce dates before `from`.
fn first_period(parsed: &ParsedRule, anchor: NaiveDate, from: NaiveDate) -> i64 {
    let elapsed = match parsed.rule.freq {
        Frequency::Daily => (from - anchor).num_days(),
        Frequency::Weekly => {
            let week_start = anchor - Duration::days(anchor.weekday().num_days_from_monday() as i64);
            (from - week_start).num_days().div_euclid(7)
        }
        Frequency::Monthly => {
            (from.year() as i64 - anchor.year() as i64) * 12 + from.month0() as i64
                - anchor.month0() as i64
        }
        Frequency::Yearly => from.year() as i64 - anchor.year() as i64,
    };
    let interval = (parsed.rule.effective_interval() as i64).max(1);
    (elapsed.div_euclid(interval) - 1).max(0)
}

/// Dates produced by the `period`-th repetition of the rule, in order.
fn candidate_dates(parsed: &ParsedRule, anchor: NaiveDate, period: i64) -> Vec<NaiveDate> {
    let step = period * parsed.rule.effective_interval() as i64;
    match parsed.rule.freq {
        Frequency::Daily => vec![anchor + Duration::days(step)],
        Frequency::Weekly => {
            let week_start = anchor - Duration::days(anchor.weekday().num_days_from_monday() as i64)
                + Duration::weeks(step);
            let mut offsets: Vec<i64> = if parsed.rule.by_day.is_empty() {
                vec![anchor.weekday().num_days_from_monday() as i64]
            } else {
                parsed
                    .rule
                    .by_day
                    .iter()
                    .map(|day: &Weekday| day.to_chrono().num_days_from_monday() as i64)
                    .collect()
            };
            offsets.sort_unstable();
            offsets
                .into_iter()
                .map(|offset| week_start + Duration::days(offset))
                .collect()
        }
        Frequency::Monthly => {
            let day = parsed.by_month_day.unwrap_or(anchor.day() as i32);
            advance_month(anchor, step)
                .and_then(|month| resolve_month_day(month.year(), month.month(), day))
                .into_iter()
                .collect()
        }
        Frequency::Yearly => {
            let day = parsed.by_month_day.unwrap_or(anchor.day() as i32);
            let month = parsed.by_month.unwrap_or(anchor.month());
            i32::try_from(anchor.year() as i64 + step)
                .ok()
                .and_then(|year| resolve_month_day(year, month, day))
                .into_iter()
                .collect()
        }
    }
}

/// First day of the month `months` after the month containing `date`.
pub(crate) fn advance_month(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let total = date.year() as i64 * 12 + date.month0() as i64 + months;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    NaiveDate::from_ymd_opt(year, total.rem_euclid(12) as u32 + 1, 1)
}

/// Day-of-month lookup where negative values count back from the last day.
/// Days that do not exist in the month yield `None`.
fn resolve_month_day(year: i32, month: u32, day: i32) -> Option<NaiveDate> {
    if day > 0 {
        return NaiveDate::from_ymd_opt(year, month, day as u32);
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = advance_month(first, 1)?.pred_opt()?;
    let resolved = last.day() as i32 + 1 + day;
    if resolved < 1 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, resolved as u32)
}
