use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::progress::ReferenceInstant;

pub trait Clock: Send + Sync {
    fn now(&self) -> Result<ReferenceInstant>;
    fn label(&self) -> &'static str;
}

/// Reads the host's local wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<ReferenceInstant> {
        Ok(ReferenceInstant::now())
    }

    fn label(&self) -> &'static str {
        "SYSTEM_LOCAL"
    }
}

/// Always returns the same instant.
pub struct FixedClock {
    instant: ReferenceInstant,
}

impl FixedClock {
    pub fn new(instant: ReferenceInstant) -> Self {
        Self { instant }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let local = parse_local_datetime(input)?;
        Ok(Self::new(ReferenceInstant::from_local(local)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Result<ReferenceInstant> {
        Ok(self.instant)
    }

    fn label(&self) -> &'static str {
        "FIXED"
    }
}

pub fn parse_local_datetime(input: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M"))
        .with_context(|| format!("invalid local datetime '{input}', expected YYYY-MM-DDTHH:MM:SS"))
}
