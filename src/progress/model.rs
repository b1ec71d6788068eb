use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Timelike};
use serde::Serialize;

pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 3_600;
pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;
/// Average Gregorian year (365.25 days), used only for the life scale.
pub const SECONDS_PER_AVERAGE_YEAR: i64 = 31_557_600;

/// Local wall-clock instant every scale of one report is computed against.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub struct ReferenceInstant {
    local: NaiveDateTime,
}

impl ReferenceInstant {
    pub fn from_local(local: NaiveDateTime) -> Self {
        Self { local }
    }

    pub fn from_datetime<Tz: TimeZone>(datetime: &DateTime<Tz>) -> Self {
        Self {
            local: datetime.naive_local(),
        }
    }

    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.local
    }

    pub fn year(&self) -> i32 {
        self.local.year()
    }

    pub fn month(&self) -> u32 {
        self.local.month()
    }

    pub fn day(&self) -> u32 {
        self.local.day()
    }

    /// Day index within the week, Sunday = 0.
    pub fn day_of_week(&self) -> u32 {
        self.local.weekday().num_days_from_sunday()
    }

    pub fn hour(&self) -> u32 {
        self.local.hour()
    }

    pub fn minute(&self) -> u32 {
        self.local.minute()
    }

    pub fn second(&self) -> u32 {
        self.local.second()
    }

    /// Whole seconds elapsed since local midnight.
    pub fn seconds_since_midnight(&self) -> i64 {
        i64::from(self.hour()) * SECONDS_PER_HOUR
            + i64::from(self.minute()) * SECONDS_PER_MINUTE
            + i64::from(self.second())
    }
}

impl fmt::Display for ReferenceInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// Birth date as configured. Month and day use 0 for "not set".
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BirthRecord {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl BirthRecord {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// The yearly birthday, or `None` while month or day is unset.
    pub fn anniversary(&self) -> Option<EventTarget> {
        if self.month == 0 || self.day == 0 {
            return None;
        }
        Some(EventTarget::new(self.month, self.day))
    }
}

/// A yearly recurring calendar date (birthday or custom event).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventTarget {
    pub month: u32,
    pub day: u32,
}

impl EventTarget {
    pub fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Day,
    Week,
    Month,
    Year,
    Life,
}

impl Scale {
    pub const ALL: [Scale; 5] = [Scale::Day, Scale::Week, Scale::Month, Scale::Year, Scale::Life];

    pub fn key(self) -> &'static str {
        match self {
            Scale::Day => "day",
            Scale::Week => "week",
            Scale::Month => "month",
            Scale::Year => "year",
            Scale::Life => "life",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainingUnit {
    Minute,
    Hour,
    Day,
    Year,
}

impl RemainingUnit {
    pub fn seconds(self) -> i64 {
        match self {
            RemainingUnit::Minute => SECONDS_PER_MINUTE,
            RemainingUnit::Hour => SECONDS_PER_HOUR,
            RemainingUnit::Day => SECONDS_PER_DAY,
            RemainingUnit::Year => SECONDS_PER_AVERAGE_YEAR,
        }
    }

    /// Literal suffix appended to a remaining value, e.g. `8h` or `58 yrs`.
    pub fn suffix(self) -> &'static str {
        match self {
            RemainingUnit::Minute => "m",
            RemainingUnit::Hour => "h",
            RemainingUnit::Day => "d",
            RemainingUnit::Year => " yrs",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ScaleProgress {
    pub percent: i64,
    pub elapsed_units: i64,
    pub remaining_value: i64,
    pub remaining_unit: RemainingUnit,
    pub total_units: i64,
    pub ratio_label: String,
    pub remaining_label: String,
}

impl ScaleProgress {
    /// Remaining value with its unit suffix and no trailing text, e.g. `8h`.
    pub fn remaining_short(&self) -> String {
        format!("{}{}", self.remaining_value, self.remaining_unit.suffix())
    }
}

/// Immutable snapshot of all five scales, computed from one instant.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ProgressReport {
    pub instant: String,
    pub scales: BTreeMap<Scale, ScaleProgress>,
}

impl ProgressReport {
    pub fn get(&self, scale: Scale) -> Option<&ScaleProgress> {
        self.scales.get(&scale)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Scale, &ScaleProgress)> {
        self.scales.iter().map(|(scale, progress)| (*scale, progress))
    }
}
