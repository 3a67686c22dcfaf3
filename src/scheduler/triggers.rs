//! Workflow triggers and their weekly schedules.
//!
//! Defines [`TriggerKind`] (what runs), [`Schedule`] (when it runs) and
//! [`ScheduledTrigger`] (the pair plus run state).

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// One scheduled step of the weekly workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerKind {
    /// Populate the cycle with `pending` records.
    AllocateCycle,
    /// Ask every pending holder to answer `ja`/`nein`.
    RequestConfirmation,
    /// Remind pending holders who have not answered.
    RemindPending,
    /// Expire every pending record and reassign its task.
    SweepAndReassignPending,
    /// Post the cycle digest unless every task is confirmed.
    DigestIfIncomplete,
    /// Ask every confirmed holder whether the task is done.
    CompletionSurvey,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 6] = [
        Self::AllocateCycle,
        Self::RequestConfirmation,
        Self::RemindPending,
        Self::SweepAndReassignPending,
        Self::DigestIfIncomplete,
        Self::CompletionSurvey,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllocateCycle => "allocate-cycle",
            Self::RequestConfirmation => "request-confirmation",
            Self::RemindPending => "remind-pending",
            Self::SweepAndReassignPending => "sweep-and-reassign-pending",
            Self::DigestIfIncomplete => "digest-if-incomplete",
            Self::CompletionSurvey => "completion-survey",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Default weekly slot (UTC).
    pub fn default_schedule(self) -> Schedule {
        let (weekday, hour, min) = match self {
            Self::AllocateCycle => (Weekday::Mon, 8, 0),
            Self::RequestConfirmation => (Weekday::Wed, 10, 0),
            Self::RemindPending => (Weekday::Fri, 10, 0),
            Self::SweepAndReassignPending => (Weekday::Sat, 8, 0),
            Self::DigestIfIncomplete => (Weekday::Sun, 8, 0),
            Self::CompletionSurvey => (Weekday::Sun, 18, 0),
        };
        Schedule::Weekly { weekday, hour, min }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// Once a week on the given weekday, hour and minute (UTC).
    Weekly {
        weekday: Weekday,
        /// Hour of day (0-23, UTC).
        hour: u8,
        /// Minute of hour (0-59).
        min: u8,
    },
}

impl Schedule {
    /// The most recent scheduled instant at or before `now`. `None` when the
    /// hour or minute is out of range.
    pub fn last_occurrence(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Self::Weekly { weekday, hour, min } => {
                let days_back = (now.weekday().num_days_from_monday() + 7
                    - weekday.num_days_from_monday())
                    % 7;
                let date = now.date_naive() - Duration::days(i64::from(days_back));
                let candidate = date
                    .and_hms_opt(u32::from(hour), u32::from(min), 0)?
                    .and_utc();
                if candidate > now {
                    Some(candidate - Duration::days(7))
                } else {
                    Some(candidate)
                }
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        match *self {
            Self::Weekly { hour, min, .. } => hour < 24 && min < 60,
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weekly { weekday, hour, min } => {
                write!(f, "weekly on {weekday} at {hour:02}:{min:02} UTC")
            }
        }
    }
}

/// A trigger bound to its schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTrigger {
    pub kind: TriggerKind,
    pub schedule: Schedule,
    /// Instant of the last run; `None` means the trigger has never run.
    pub last_run: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl ScheduledTrigger {
    pub fn new(kind: TriggerKind, schedule: Schedule) -> Self {
        Self {
            kind,
            schedule,
            last_run: None,
            enabled: true,
        }
    }

    /// Due when a scheduled instant has passed since the last run.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(scheduled) = self.schedule.last_occurrence(now) else {
            return false;
        };
        match self.last_run {
            None => now >= scheduled,
            Some(last) => last < scheduled && now >= scheduled,
        }
    }

    pub fn mark_run(&mut self, at: DateTime<Utc>) {
        self.last_run = Some(at);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        // October 2026: the 12th is a Monday.
        Utc.with_ymd_and_hms(2026, 10, d, h, m, 0).unwrap()
    }

    #[test]
    fn names_round_trip() {
        for kind in TriggerKind::ALL {
            assert_eq!(TriggerKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TriggerKind::parse("nap"), None);
    }

    #[test]
    fn last_occurrence_same_day_after_slot() {
        let schedule = TriggerKind::RequestConfirmation.default_schedule();
        assert_eq!(schedule.last_occurrence(at(14, 10, 5)), Some(at(14, 10, 0)));
    }

    #[test]
    fn last_occurrence_same_day_before_slot_goes_back_a_week() {
        let schedule = TriggerKind::RequestConfirmation.default_schedule();
        assert_eq!(schedule.last_occurrence(at(14, 9, 59)), Some(at(7, 10, 0)));
    }

    #[test]
    fn last_occurrence_for_earlier_weekday() {
        let schedule = TriggerKind::AllocateCycle.default_schedule();
        assert_eq!(schedule.last_occurrence(at(15, 12, 0)), Some(at(12, 8, 0)));
    }

    #[test]
    fn invalid_time_has_no_occurrence() {
        let schedule = Schedule::Weekly {
            weekday: Weekday::Mon,
            hour: 25,
            min: 0,
        };
        assert!(!schedule.is_valid());
        assert_eq!(schedule.last_occurrence(at(15, 12, 0)), None);
    }

    #[test]
    fn trigger_fires_once_per_week() {
        let mut trigger = ScheduledTrigger::new(
            TriggerKind::AllocateCycle,
            TriggerKind::AllocateCycle.default_schedule(),
        );
        trigger.mark_run(at(12, 7, 0));
        assert!(!trigger.is_due(at(12, 7, 59)));
        assert!(trigger.is_due(at(12, 8, 0)));

        trigger.mark_run(at(12, 8, 0));
        assert!(!trigger.is_due(at(15, 8, 0)));
        assert!(trigger.is_due(at(19, 8, 1)));
    }

    #[test]
    fn disabled_trigger_is_never_due() {
        let mut trigger = ScheduledTrigger::new(
            TriggerKind::RemindPending,
            TriggerKind::RemindPending.default_schedule(),
        );
        trigger.enabled = false;
        assert!(!trigger.is_due(at(16, 12, 0)));
    }

    #[test]
    fn schedule_display() {
        let schedule = TriggerKind::CompletionSurvey.default_schedule();
        assert_eq!(schedule.to_string(), "weekly on Sun at 18:00 UTC");
    }
}
