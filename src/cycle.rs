//! Cycle keys: one ISO (week, year) pair per allocation round.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Identifies one weekly allocation cycle by ISO week number and ISO year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CycleKey {
    /// ISO week year (may differ from the calendar year around New Year).
    pub year: i32,
    /// ISO week number, 1-53.
    pub week: u32,
}

impl CycleKey {
    /// Build a key, returning `None` if the week does not exist in that ISO year.
    pub fn new(year: i32, week: u32) -> Option<Self> {
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).map(|_| Self { year, week })
    }

    /// The cycle containing the given instant.
    pub fn containing(at: DateTime<Utc>) -> Self {
        let iso = at.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Monday 00:00 UTC of this cycle's week, when its operative week begins.
    pub fn starts_at(&self) -> DateTime<Utc> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
            .and_then(|monday| monday.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// The cycle immediately after this one.
    pub fn next(&self) -> Self {
        Self::containing(self.starts_at() + Duration::days(7))
    }

    /// Whether the operative week of this cycle has begun at `now`.
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at()
    }
}

impl std::fmt::Display for CycleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}
