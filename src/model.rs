//! Domain records shared by the engine, the store and the messaging layer.

use crate::cycle::CycleKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Row id of a participant.
    ParticipantId
);
id_type!(
    /// Row id of a task.
    TaskId
);
id_type!(
    /// Row id of a category.
    CategoryId
);
id_type!(
    /// Row id of a weekly assignment record.
    AssignmentId
);

/// A member of the household taking part in the rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    /// Messaging address (phone number for WhatsApp).
    pub address: String,
}

/// A recurring chore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Points credited to the holder's category score on completion.
    pub points: u32,
    /// `None` when the category was deleted; completion then credits nothing.
    pub category_id: Option<CategoryId>,
}

/// Score bucket a task contributes to (kitchen, bathroom, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Lifecycle status of one weekly assignment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Confirmed,
    Declined,
    Completed,
}

impl AssignmentStatus {
    /// Pending and confirmed records still occupy their task for the cycle.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Declined and completed records never change again.
    pub fn is_terminal(self) -> bool {
        !self.is_open()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Declined => "declined",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "declined" => Some(Self::Declined),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One task handed to one participant for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAssignment {
    pub id: AssignmentId,
    pub task_id: TaskId,
    pub participant_id: ParticipantId,
    pub cycle: CycleKey,
    pub status: AssignmentStatus,
    /// Unix epoch seconds.
    pub created_at: i64,
    /// Unix epoch seconds of the last status change.
    pub updated_at: i64,
}

/// Which participants may perform which task, in roster order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibilityRoster {
    entries: BTreeMap<TaskId, Vec<ParticipantId>>,
}

impl EligibilityRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a participant to a task's roster. Duplicates are ignored.
    pub fn insert(&mut self, task: TaskId, participant: ParticipantId) {
        let list = self.entries.entry(task).or_default();
        if !list.contains(&participant) {
            list.push(participant);
        }
    }

    /// Eligible participants for a task in roster order; empty when unknown.
    pub fn eligible(&self, task: TaskId) -> &[ParticipantId] {
        self.entries.get(&task).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(TaskId, ParticipantId)> for EligibilityRoster {
    fn from_iter<I: IntoIterator<Item = (TaskId, ParticipantId)>>(iter: I) -> Self {
        let mut roster = Self::new();
        for (task, participant) in iter {
            roster.insert(task, participant);
        }
        roster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            AssignmentStatus::Pending,
            AssignmentStatus::Confirmed,
            AssignmentStatus::Declined,
            AssignmentStatus::Completed,
        ] {
            assert_eq!(AssignmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AssignmentStatus::parse("archived"), None);
    }

    #[test]
    fn open_and_terminal_partition_statuses() {
        assert!(AssignmentStatus::Pending.is_open());
        assert!(AssignmentStatus::Confirmed.is_open());
        assert!(AssignmentStatus::Declined.is_terminal());
        assert!(AssignmentStatus::Completed.is_terminal());
    }

    #[test]
    fn roster_keeps_insertion_order_and_dedupes() {
        let roster: EligibilityRoster = [
            (TaskId(1), ParticipantId(3)),
            (TaskId(1), ParticipantId(1)),
            (TaskId(1), ParticipantId(3)),
            (TaskId(2), ParticipantId(2)),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            roster.eligible(TaskId(1)),
            &[ParticipantId(3), ParticipantId(1)]
        );
        assert_eq!(roster.eligible(TaskId(2)), &[ParticipantId(2)]);
        assert!(roster.eligible(TaskId(9)).is_empty());
    }
}
