// Date utility functions

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Resolve a local wall-clock time, taking the earlier instant when the
/// time is ambiguous. `None` for times skipped by a DST transition.
pub fn local_datetime(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&date.and_time(time)).earliest()
}

pub fn start_of_day(date: NaiveDate) -> Option<DateTime<Local>> {
    local_datetime(date, NaiveTime::MIN)
}

/// Local 23:59:59 of `date`, expressed in UTC.
pub fn end_of_local_day_utc(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_hms_opt(23, 59, 59).unwrap_or_else(|| date.and_time(NaiveTime::MIN));
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Whole minutes elapsed since local midnight.
pub fn minutes_since_midnight(time: NaiveTime) -> i64 {
    (time.num_seconds_from_midnight() / 60) as i64
}

pub fn time_from_minutes(minutes: i64) -> NaiveTime {
    let clamped = minutes.clamp(0, MINUTES_PER_DAY - 1);
    NaiveTime::from_num_seconds_from_midnight_opt((clamped * 60) as u32, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_round_trip() {
        let time = NaiveTime::from_hms_opt(14, 45, 30).unwrap();
        assert_eq!(minutes_since_midnight(time), 14 * 60 + 45);
        assert_eq!(time_from_minutes(14 * 60 + 45), NaiveTime::from_hms_opt(14, 45, 0).unwrap());
    }

    #[test]
    fn test_time_from_minutes_clamps() {
        assert_eq!(time_from_minutes(-5), NaiveTime::MIN);
        assert_eq!(time_from_minutes(5000), NaiveTime::from_hms_opt(23, 59, 0).unwrap());
    }

    #[test]
    fn test_end_of_local_day_is_local_23_59_59() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 10).unwrap();
        let utc = end_of_local_day_utc(date);
        let local = utc.with_timezone(&Local);
        assert_eq!(local.date_naive(), date);
        assert_eq!(local.time(), NaiveTime::from_hms_opt(23, 59, 59).unwrap());
    }
}
