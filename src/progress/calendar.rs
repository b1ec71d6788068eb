use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::progress::model::{EventTarget, ReferenceInstant, SECONDS_PER_DAY};

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) { 366 } else { 365 }
}

/// Length of `month` (1-based) in `year`, measured as the distance between the
/// first day of the month and the first day of the next one. Returns 0 for a
/// month outside 1..=12.
pub fn days_in_month(month: u32, year: i32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(first), Some(next)) => {
            u32::try_from(next.signed_duration_since(first).num_days()).unwrap_or(0)
        }
        _ => 0,
    }
}

/// Calendar date of `target` in `year`. A day past the end of the month is
/// clamped to the month's last day, so Feb 29 resolves to Feb 28 outside leap
/// years.
pub fn resolve_event_date(target: EventTarget, year: i32) -> Option<NaiveDate> {
    let month = target.month.clamp(1, 12);
    let last_day = days_in_month(month, year);
    let day = target.day.clamp(1, last_day.max(1));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Whole days until the next occurrence of `target`, rounded up. The event
/// starts at local midnight; once that moment has passed the count moves to
/// next year's occurrence, so 0 only happens exactly at the event's midnight.
pub fn days_until_next_occurrence(target: EventTarget, instant: ReferenceInstant) -> i64 {
    let now = instant.naive();
    let year = now.date().year();
    let Some(mut event) = resolve_event_date(target, year).map(|date| date.and_time(NaiveTime::MIN))
    else {
        return 0;
    };
    if event < now {
        match resolve_event_date(target, year + 1) {
            Some(next) => event = next.and_time(NaiveTime::MIN),
            None => return 0,
        }
    }

    let millis = event.signed_duration_since(now).num_milliseconds();
    let millis_per_day = SECONDS_PER_DAY * 1_000;
    -(-millis).div_euclid(millis_per_day)
}

/// Share of the year already complete when the quarter starting in `month`
/// begins, e.g. 25 for April.
pub fn quarter_start_percent(month: u32) -> i64 {
    i64::from(month.saturating_sub(1)) * 100 / 12
}
