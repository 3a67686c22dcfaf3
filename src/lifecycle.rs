//! Weekly assignment lifecycle.
//!
//! ```text
//! pending --Affirm-->  confirmed --Complete-->   completed
//!    |                    ^  |
//!    |                    +--+ Incomplete
//!    +--Decline/Expire--> declined  (+ reassignment)
//! ```
//!
//! [`AssignmentStatus::apply`] is the pure state machine. [`Lifecycle`]
//! drives stored records through it, commits each step with a conditional
//! update and sends the matching messages.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::channels::Outbox;
use crate::cycle::CycleKey;
use crate::error::{ChoreError, Result};
use crate::messages::{self, DigestLine};
use crate::model::{AssignmentId, AssignmentStatus, Participant, Task, WeeklyAssignment};
use crate::reassign::{ResolveOutcome, Resolver};
use crate::store::ChoreStore;

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Holder answered `ja`.
    Affirm,
    /// Holder answered `nein`.
    Decline,
    /// The sweep found the record still pending.
    Expire,
    /// Holder answered `erledigt`.
    Complete,
    /// Holder answered `unerledigt`.
    Incomplete,
}

/// A permitted status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: AssignmentStatus,
    pub to: AssignmentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("{event:?} does not apply to a {status} assignment")]
    NotApplicable {
        status: AssignmentStatus,
        event: LifecycleEvent,
    },
}

impl AssignmentStatus {
    /// The transition `event` causes from this status.
    pub fn apply(self, event: LifecycleEvent) -> std::result::Result<Transition, TransitionError> {
        use AssignmentStatus::*;
        use LifecycleEvent::*;

        let to = match (self, event) {
            (Pending, Affirm) => Confirmed,
            (Pending, Decline | Expire) => Declined,
            (Confirmed, Complete) => Completed,
            (Confirmed, Incomplete) => Confirmed,
            (status, event) => return Err(TransitionError::NotApplicable { status, event }),
        };
        Ok(Transition { from: self, to })
    }
}

/// A participant's answer about their assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Yes,
    No,
    Done,
    NotDone,
}

impl Reply {
    pub fn event(self) -> LifecycleEvent {
        match self {
            Self::Yes => LifecycleEvent::Affirm,
            Self::No => LifecycleEvent::Decline,
            Self::Done => LifecycleEvent::Complete,
            Self::NotDone => LifecycleEvent::Incomplete,
        }
    }

    /// Status of the record a reply targets.
    fn targets(self) -> AssignmentStatus {
        match self {
            Self::Yes | Self::No => AssignmentStatus::Pending,
            Self::Done | Self::NotDone => AssignmentStatus::Confirmed,
        }
    }
}

/// What a reply did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Confirmed(AssignmentId),
    Declined {
        assignment: AssignmentId,
        resolution: ResolveOutcome,
    },
    Completed {
        assignment: AssignmentId,
        points: u32,
    },
    StillOpen(AssignmentId),
    /// `ja`/`nein` without a pending record.
    NothingPending,
    /// `erledigt`/`unerledigt` without a confirmed record.
    NothingConfirmed,
    /// `erledigt` before the cycle's week began.
    WeekNotStarted,
    /// The record changed between lookup and commit.
    NotApplicable,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: Vec<AssignmentId>,
    pub resolutions: Vec<ResolveOutcome>,
}

#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<dyn ChoreStore>,
    outbox: Arc<Outbox>,
    resolver: Resolver,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn ChoreStore>, outbox: Arc<Outbox>) -> Self {
        Self {
            resolver: Resolver::new(store.clone(), outbox.clone()),
            store,
            outbox,
        }
    }

    fn task(&self, record: &WeeklyAssignment) -> Result<Task> {
        self.store
            .task(record.task_id)?
            .ok_or_else(|| ChoreError::NotFound(format!("task {}", record.task_id)))
    }

    fn holder(&self, record: &WeeklyAssignment) -> Result<Participant> {
        self.store
            .participant(record.participant_id)?
            .ok_or_else(|| ChoreError::NotFound(format!("participant {}", record.participant_id)))
    }

    /// Apply a participant's reply to their oldest matching record in `cycle`.
    pub async fn handle_reply(
        &self,
        participant: &Participant,
        reply: Reply,
        cycle: CycleKey,
        now: DateTime<Utc>,
    ) -> Result<ReplyOutcome> {
        let target = self
            .store
            .assignments_for_cycle(cycle)?
            .into_iter()
            .filter(|r| r.participant_id == participant.id && r.status == reply.targets())
            .min_by_key(|r| (r.created_at, r.id));

        let Some(record) = target else {
            let (text, outcome) = match reply.targets() {
                AssignmentStatus::Pending => {
                    (messages::nothing_pending(), ReplyOutcome::NothingPending)
                }
                _ => (messages::nothing_confirmed(), ReplyOutcome::NothingConfirmed),
            };
            self.outbox.to_contact(&participant.address, text).await;
            return Ok(outcome);
        };

        let transition = record.status.apply(reply.event())?;
        let task = self.task(&record)?;

        match reply {
            Reply::Yes => {
                if !self.commit(&record, transition)? {
                    return self.lost_race(participant).await;
                }
                info!(%cycle, assignment = %record.id, task = %task.id, participant = %participant.id, "assignment confirmed");
                self.outbox
                    .to_contact(&participant.address, messages::confirmed(&task.name))
                    .await;
                if self.cycle_fully_accepted(cycle)? {
                    self.post_digest(cycle, true).await?;
                }
                Ok(ReplyOutcome::Confirmed(record.id))
            }
            Reply::No => {
                if !self.commit(&record, transition)? {
                    return self.lost_race(participant).await;
                }
                info!(%cycle, assignment = %record.id, task = %task.id, participant = %participant.id, "assignment declined");
                self.outbox
                    .to_contact(&participant.address, messages::declined(&task.name))
                    .await;
                let declined = WeeklyAssignment {
                    status: AssignmentStatus::Declined,
                    ..record
                };
                let resolution = self.resolver.resolve(&declined).await?;
                Ok(ReplyOutcome::Declined {
                    assignment: declined.id,
                    resolution,
                })
            }
            Reply::Done => {
                if !cycle.has_started(now) {
                    self.outbox
                        .to_contact(&participant.address, messages::week_not_started(cycle))
                        .await;
                    return Ok(ReplyOutcome::WeekNotStarted);
                }
                if task.category_id.is_none() {
                    warn!(task = %task.id, "task has no category, completion credits no points");
                }
                if !self
                    .store
                    .complete_and_credit(record.id, task.category_id, task.points)?
                {
                    return self.lost_race(participant).await;
                }
                info!(%cycle, assignment = %record.id, task = %task.id, participant = %participant.id, points = task.points, "assignment completed");
                self.outbox
                    .to_contact(
                        &participant.address,
                        messages::completed(&task.name, task.points),
                    )
                    .await;
                Ok(ReplyOutcome::Completed {
                    assignment: record.id,
                    points: task.points,
                })
            }
            Reply::NotDone => {
                debug!(%cycle, assignment = %record.id, "completion not yet reported");
                self.outbox
                    .to_contact(&participant.address, messages::incomplete(&task.name))
                    .await;
                Ok(ReplyOutcome::StillOpen(record.id))
            }
        }
    }

    fn commit(&self, record: &WeeklyAssignment, transition: Transition) -> Result<bool> {
        Ok(self
            .store
            .transition(record.id, transition.from, transition.to)?)
    }

    async fn lost_race(&self, participant: &Participant) -> Result<ReplyOutcome> {
        self.outbox
            .to_contact(&participant.address, messages::no_longer_applicable())
            .await;
        Ok(ReplyOutcome::NotApplicable)
    }

    /// Tell each holder of a freshly created record about their task.
    pub async fn announce(&self, records: &[WeeklyAssignment]) -> Result<usize> {
        let mut sent = 0;
        for record in records {
            let task = self.task(record)?;
            let holder = self.holder(record)?;
            if self
                .outbox
                .to_contact(
                    &holder.address,
                    messages::assigned(&holder.name, &task.name, record.cycle),
                )
                .await
            {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Expire every pending record of `cycle`, then reassign each task.
    ///
    /// All records are declined before the first reassignment so no expired
    /// holder can receive another expired task.
    pub async fn sweep(&self, cycle: CycleKey) -> Result<SweepReport> {
        let pending: Vec<WeeklyAssignment> = self
            .store
            .assignments_for_cycle(cycle)?
            .into_iter()
            .filter(|r| r.status == AssignmentStatus::Pending)
            .collect();

        let mut expired = Vec::with_capacity(pending.len());
        for record in pending {
            let transition = record.status.apply(LifecycleEvent::Expire)?;
            if self.commit(&record, transition)? {
                info!(%cycle, assignment = %record.id, participant = %record.participant_id, "pending assignment expired");
                expired.push(WeeklyAssignment {
                    status: AssignmentStatus::Declined,
                    ..record
                });
            }
        }

        let mut report = SweepReport::default();
        for record in expired {
            report.expired.push(record.id);
            report.resolutions.push(self.resolver.resolve(&record).await?);
        }
        Ok(report)
    }

    /// Ask every pending holder to answer `ja`/`nein`.
    pub async fn request_confirmation(&self, cycle: CycleKey) -> Result<usize> {
        self.message_holders(cycle, AssignmentStatus::Pending, |holder, task| {
            messages::assignment_request(&holder.name, &task.name, cycle)
        })
        .await
    }

    /// Remind every pending holder who has not answered yet.
    pub async fn remind_pending(&self, cycle: CycleKey) -> Result<usize> {
        self.message_holders(cycle, AssignmentStatus::Pending, |holder, task| {
            messages::reminder(&holder.name, &task.name)
        })
        .await
    }

    /// Ask every confirmed holder whether the task is done.
    pub async fn completion_survey(&self, cycle: CycleKey) -> Result<usize> {
        self.message_holders(cycle, AssignmentStatus::Confirmed, |holder, task| {
            messages::completion_survey(&holder.name, &task.name)
        })
        .await
    }

    async fn message_holders<F>(
        &self,
        cycle: CycleKey,
        status: AssignmentStatus,
        text: F,
    ) -> Result<usize>
    where
        F: Fn(&Participant, &Task) -> String,
    {
        let records: Vec<WeeklyAssignment> = self
            .store
            .assignments_for_cycle(cycle)?
            .into_iter()
            .filter(|r| r.status == status)
            .collect();

        let mut sent = 0;
        for record in &records {
            let task = self.task(record)?;
            let holder = self.holder(record)?;
            if self
                .outbox
                .to_contact(&holder.address, text(&holder, &task))
                .await
            {
                sent += 1;
            }
        }
        debug!(%cycle, %status, records = records.len(), sent, "holders messaged");
        Ok(sent)
    }

    /// Post the digest unless every task of the cycle is accepted.
    /// Returns whether a digest was posted.
    pub async fn digest_if_incomplete(&self, cycle: CycleKey) -> Result<bool> {
        if self.cycle_fully_accepted(cycle)? {
            debug!(%cycle, "all tasks accepted, no digest needed");
            return Ok(false);
        }
        self.post_digest(cycle, false).await?;
        Ok(true)
    }

    /// Every task has a confirmed or completed record in the cycle.
    pub fn cycle_fully_accepted(&self, cycle: CycleKey) -> Result<bool> {
        let tasks = self.store.tasks()?;
        if tasks.is_empty() {
            return Ok(false);
        }
        let records = self.store.assignments_for_cycle(cycle)?;
        Ok(tasks.iter().all(|task| {
            records.iter().any(|r| {
                r.task_id == task.id
                    && matches!(
                        r.status,
                        AssignmentStatus::Confirmed | AssignmentStatus::Completed
                    )
            })
        }))
    }

    async fn post_digest(&self, cycle: CycleKey, all_confirmed: bool) -> Result<()> {
        let tasks = self.store.tasks()?;
        let records = self.store.assignments_for_cycle(cycle)?;
        let names: BTreeMap<_, _> = self
            .store
            .participants()?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let lines: Vec<DigestLine<'_>> = tasks
            .iter()
            .map(|task| {
                // Newest non-declined record wins.
                let current = records
                    .iter()
                    .rev()
                    .find(|r| r.task_id == task.id && r.status != AssignmentStatus::Declined);
                DigestLine {
                    task: &task.name,
                    holder: current
                        .and_then(|r| names.get(&r.participant_id))
                        .map(String::as_str),
                    status: current.map(|r| r.status),
                }
            })
            .collect();

        info!(%cycle, all_confirmed, "posting cycle digest");
        self.outbox
            .to_group(messages::digest(cycle, all_confirmed, &lines))
            .await;
        Ok(())
    }
}
