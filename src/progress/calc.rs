use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

use crate::progress::calendar::{days_in_month, days_in_year};
use crate::progress::model::{
    BirthRecord, ProgressReport, ReferenceInstant, RemainingUnit, SECONDS_PER_AVERAGE_YEAR,
    SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_WEEK, Scale, ScaleProgress,
};

const MILLIS_PER_SECOND: i64 = 1_000;

/// Computes every scale against the same instant.
pub fn compute_report(
    instant: ReferenceInstant,
    birth: BirthRecord,
    life_expectancy: u32,
) -> ProgressReport {
    let mut scales = BTreeMap::new();
    scales.insert(Scale::Day, compute_day_progress(instant));
    scales.insert(Scale::Week, compute_week_progress(instant));
    scales.insert(Scale::Month, compute_month_progress(instant));
    scales.insert(Scale::Year, compute_year_progress(instant));
    scales.insert(
        Scale::Life,
        compute_life_progress(birth, life_expectancy, instant),
    );
    ProgressReport {
        instant: instant.to_string(),
        scales,
    }
}

pub fn compute_day_progress(instant: ReferenceInstant) -> ScaleProgress {
    let elapsed = instant.seconds_since_midnight();
    let elapsed_hours = elapsed / SECONDS_PER_HOUR;
    let (remaining_value, remaining_unit) = select_remaining(
        SECONDS_PER_DAY - elapsed,
        RemainingUnit::Hour,
        RemainingUnit::Minute,
    );
    build(
        elapsed * 100 / SECONDS_PER_DAY,
        elapsed_hours,
        24,
        remaining_value,
        remaining_unit,
        format_ratio_label(elapsed_hours, 24, "h"),
    )
}

/// Weeks start on Sunday regardless of locale.
pub fn compute_week_progress(instant: ReferenceInstant) -> ScaleProgress {
    let day_index = i64::from(instant.day_of_week());
    let elapsed = day_index * SECONDS_PER_DAY + instant.seconds_since_midnight();
    let (remaining_value, remaining_unit) = select_remaining(
        SECONDS_PER_WEEK - elapsed,
        RemainingUnit::Day,
        RemainingUnit::Hour,
    );
    build(
        elapsed * 100 / SECONDS_PER_WEEK,
        day_index,
        7,
        remaining_value,
        remaining_unit,
        format_ratio_label(day_index, 7, "d"),
    )
}

pub fn compute_month_progress(instant: ReferenceInstant) -> ScaleProgress {
    let total_days = i64::from(days_in_month(instant.month(), instant.year()));
    let elapsed_ms = millis_since(instant, instant.year(), instant.month());
    let total_ms = total_days * SECONDS_PER_DAY * MILLIS_PER_SECOND;
    let (remaining_value, remaining_unit) = select_remaining(
        (total_ms - elapsed_ms) / MILLIS_PER_SECOND,
        RemainingUnit::Day,
        RemainingUnit::Hour,
    );
    let day_of_month = i64::from(instant.day());
    build(
        percent_of(elapsed_ms, total_ms),
        day_of_month,
        total_days,
        remaining_value,
        remaining_unit,
        format_ratio_label(day_of_month, total_days, "d"),
    )
}

pub fn compute_year_progress(instant: ReferenceInstant) -> ScaleProgress {
    let total_days = i64::from(days_in_year(instant.year()));
    let elapsed_ms = millis_since(instant, instant.year(), 1);
    let total_ms = total_days * SECONDS_PER_DAY * MILLIS_PER_SECOND;
    let day_number = elapsed_ms.div_euclid(SECONDS_PER_DAY * MILLIS_PER_SECOND) + 1;
    let (remaining_value, remaining_unit) = select_remaining(
        (total_ms - elapsed_ms) / MILLIS_PER_SECOND,
        RemainingUnit::Day,
        RemainingUnit::Hour,
    );
    build(
        percent_of(elapsed_ms, total_ms),
        day_number,
        total_days,
        remaining_value,
        remaining_unit,
        format!("Day {day_number} / {total_days}"),
    )
}

/// Life spans are measured in average Gregorian years of 365.25 days, unlike
/// the calendar-exact scales above.
pub fn compute_life_progress(
    birth: BirthRecord,
    life_expectancy: u32,
    instant: ReferenceInstant,
) -> ScaleProgress {
    let expectancy = i64::from(life_expectancy);
    let lived_ms = birth_instant(birth)
        .map(|born| {
            instant
                .naive()
                .signed_duration_since(born)
                .num_milliseconds()
        })
        .unwrap_or(0);
    let year_ms = SECONDS_PER_AVERAGE_YEAR * MILLIS_PER_SECOND;
    let total_ms = expectancy * year_ms;

    let percent = percent_of(lived_ms, total_ms).min(100);
    let years_lived = lived_ms.div_euclid(year_ms);
    let years_left = (expectancy - years_lived).max(0);
    build(
        percent,
        years_lived,
        expectancy,
        years_left,
        RemainingUnit::Year,
        format_ratio_label(years_lived, expectancy, " yrs"),
    )
}

/// Midnight of the configured birth date. Unset month or day fall back to
/// January and the 1st; a day beyond the month's end rolls into the next
/// month.
pub fn birth_instant(birth: BirthRecord) -> Option<NaiveDateTime> {
    let month = if birth.month == 0 { 1 } else { birth.month };
    let first = NaiveDate::from_ymd_opt(birth.year, month, 1)?;
    let offset = u64::from(birth.day.saturating_sub(1));
    let date = first.checked_add_days(Days::new(offset))?;
    Some(date.and_time(NaiveTime::MIN))
}

/// Smart-unit rule: report the coarse unit unless less than one of it
/// remains, then fall back to the fine unit.
pub fn select_remaining(
    remaining_seconds: i64,
    coarse: RemainingUnit,
    fine: RemainingUnit,
) -> (i64, RemainingUnit) {
    let remaining_seconds = remaining_seconds.max(0);
    let coarse_count = remaining_seconds / coarse.seconds();
    if coarse_count < 1 {
        (remaining_seconds / fine.seconds(), fine)
    } else {
        (coarse_count, coarse)
    }
}

pub fn format_ratio_label(elapsed: i64, total: i64, unit: &str) -> String {
    format!("{elapsed}{unit} / {total}{unit}")
}

pub fn format_remaining_label(value: i64, unit: RemainingUnit) -> String {
    format!("{value}{} left", unit.suffix())
}

fn build(
    percent: i64,
    elapsed_units: i64,
    total_units: i64,
    remaining_value: i64,
    remaining_unit: RemainingUnit,
    ratio_label: String,
) -> ScaleProgress {
    ScaleProgress {
        percent,
        elapsed_units,
        remaining_value,
        remaining_unit,
        total_units,
        ratio_label,
        remaining_label: format_remaining_label(remaining_value, remaining_unit),
    }
}

fn millis_since(instant: ReferenceInstant, year: i32, month: u32) -> i64 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|first| {
            instant
                .naive()
                .signed_duration_since(first.and_time(NaiveTime::MIN))
                .num_milliseconds()
        })
        .unwrap_or(0)
}

/// Floor of `elapsed / total * 100`. A zero total saturates at 100.
fn percent_of(elapsed: i64, total: i64) -> i64 {
    if total <= 0 {
        return 100;
    }
    (i128::from(elapsed) * 100).div_euclid(i128::from(total)) as i64
}
