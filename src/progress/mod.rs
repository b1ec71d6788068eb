//! Time-progress calculation for the day, week, month, year and life scales.
//!
//! Everything here is pure: callers read the clock once, build a
//! [`ReferenceInstant`] and pass it in, so every scale of a report agrees on
//! the same moment.

pub mod calc;
pub mod calendar;
pub mod model;

pub use calc::compute_report;
pub use calendar::{days_until_next_occurrence, quarter_start_percent};
pub use model::{BirthRecord, EventTarget, ProgressReport, ReferenceInstant, Scale, ScaleProgress};
