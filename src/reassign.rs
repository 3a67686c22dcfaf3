//! Hands a declined or expired task to the next eligible participant.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::channels::Outbox;
use crate::error::{ChoreError, Result};
use crate::messages;
use crate::model::{AssignmentStatus, ParticipantId, TaskId, WeeklyAssignment};
use crate::store::ChoreStore;

/// Result of one resolve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// A new `pending` record was created for the next candidate.
    Reassigned(WeeklyAssignment),
    /// Every eligible participant is excluded; the task stays open.
    Unassigned,
    /// Another open record for the task already exists in the cycle.
    AlreadyOpen,
}

/// Participants who may not take over `task`: anyone who declined or
/// confirmed it this cycle, plus anyone holding any record in the cycle.
pub fn exclusion_set(cycle_records: &[WeeklyAssignment], task: TaskId) -> BTreeSet<ParticipantId> {
    let answered_task = cycle_records.iter().filter(|r| {
        r.task_id == task
            && matches!(
                r.status,
                AssignmentStatus::Declined | AssignmentStatus::Confirmed
            )
    });
    answered_task
        .chain(cycle_records.iter())
        .map(|r| r.participant_id)
        .collect()
}

#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn ChoreStore>,
    outbox: Arc<Outbox>,
}

impl Resolver {
    pub fn new(store: Arc<dyn ChoreStore>, outbox: Arc<Outbox>) -> Self {
        Self { store, outbox }
    }

    /// Reassign the task of a declined record. At most one new record is
    /// created per call.
    pub async fn resolve(&self, declined: &WeeklyAssignment) -> Result<ResolveOutcome> {
        let cycle = declined.cycle;
        let task = self
            .store
            .task(declined.task_id)?
            .ok_or_else(|| ChoreError::NotFound(format!("task {}", declined.task_id)))?;

        let records = self.store.assignments_for_cycle(cycle)?;
        let excluded = exclusion_set(&records, task.id);
        let roster = self.store.roster()?;

        for candidate in roster.eligible(task.id) {
            if excluded.contains(candidate) {
                continue;
            }
            let Some(participant) = self.store.participant(*candidate)? else {
                warn!(task = %task.id, participant = %candidate, "roster entry without participant");
                continue;
            };

            let Some(record) = self.store.create_pending(cycle, task.id, participant.id)? else {
                info!(%cycle, task = %task.id, "task already has an open record, nothing to reassign");
                return Ok(ResolveOutcome::AlreadyOpen);
            };

            info!(
                %cycle,
                task = %task.id,
                from = %declined.participant_id,
                to = %participant.id,
                assignment = %record.id,
                "task reassigned"
            );
            self.outbox
                .to_contact(
                    &participant.address,
                    messages::reassigned(&participant.name, &task.name, cycle),
                )
                .await;
            return Ok(ResolveOutcome::Reassigned(record));
        }

        warn!(%cycle, task = %task.id, name = %task.name, "no eligible participant left, task unassigned");
        Ok(ResolveOutcome::Unassigned)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::cycle::CycleKey;
    use crate::model::AssignmentId;

    fn record(id: i64, task: i64, participant: i64, status: AssignmentStatus) -> WeeklyAssignment {
        WeeklyAssignment {
            id: AssignmentId(id),
            task_id: TaskId(task),
            participant_id: ParticipantId(participant),
            cycle: CycleKey { year: 2026, week: 42 },
            status,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn exclusion_covers_answered_and_busy_participants() {
        let records = [
            record(1, 1, 1, AssignmentStatus::Declined),
            record(2, 1, 2, AssignmentStatus::Confirmed),
            record(3, 2, 3, AssignmentStatus::Pending),
            record(4, 3, 4, AssignmentStatus::Completed),
        ];
        let excluded = exclusion_set(&records, TaskId(1));
        let expected: BTreeSet<_> = [1, 2, 3, 4].into_iter().map(ParticipantId).collect();
        assert_eq!(excluded, expected);
    }

    #[test]
    fn exclusion_of_empty_cycle_is_empty() {
        assert!(exclusion_set(&[], TaskId(1)).is_empty());
    }
}
