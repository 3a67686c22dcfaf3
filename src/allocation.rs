//! Fairness-based allocation of tasks to participants for one cycle.
//!
//! Planning is a pure function over reference data and a ledger snapshot;
//! [`Allocator`] loads those inputs from the store and persists the plan as
//! `pending` records.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cycle::CycleKey;
use crate::error::Result;
use crate::ledger::{LedgerSnapshot, ScoreLedger};
use crate::model::{
    CategoryId, EligibilityRoster, Participant, ParticipantId, Task, TaskId, WeeklyAssignment,
};
use crate::store::ChoreStore;

/// How equally scored candidates are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TieBreak {
    /// Ascending participant id.
    #[default]
    ParticipantId,
    /// Deterministic shuffle seeded per task.
    Seeded { seed: u64 },
}

/// Who may take over a task removed from a double-assigned participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// First participant on the task's ordered eligible list without a proposal.
    #[default]
    EligibleOnly,
    /// Lowest-id participant without a proposal, eligible or not.
    AnyIdle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationPolicy {
    pub conflict: ConflictPolicy,
    pub tie_break: TieBreak,
}

/// One planned assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub task_id: TaskId,
    pub participant_id: ParticipantId,
    pub category_id: Option<CategoryId>,
    pub points: u32,
}

/// Result of a planning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPlan {
    /// Final proposals in task id order.
    pub proposals: Vec<Proposal>,
    /// Tasks nobody could take.
    pub unassigned: Vec<TaskId>,
}

impl AllocationPlan {
    pub fn holder(&self, task: TaskId) -> Option<ParticipantId> {
        self.proposals
            .iter()
            .find(|p| p.task_id == task)
            .map(|p| p.participant_id)
    }

    pub fn held_by(&self, participant: ParticipantId) -> Vec<TaskId> {
        self.proposals
            .iter()
            .filter(|p| p.participant_id == participant)
            .map(|p| p.task_id)
            .collect()
    }
}

/// Order a task's candidates: tie-break order first, then a stable sort by
/// category score so equal scores keep the tie-break order.
fn order_candidates(
    task: &Task,
    mut candidates: Vec<ParticipantId>,
    ledger: &LedgerSnapshot,
    tie_break: TieBreak,
) -> Vec<ParticipantId> {
    match tie_break {
        TieBreak::ParticipantId => candidates.sort(),
        TieBreak::Seeded { seed } => {
            candidates.sort();
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(task.id.0 as u64));
            candidates.shuffle(&mut rng);
        }
    }
    if let Some(category) = task.category_id {
        candidates.sort_by_key(|p| ledger.score(*p, category));
    }
    candidates
}

/// Plan one cycle. Tasks are visited in ascending id order.
pub fn plan(
    tasks: &[Task],
    roster: &EligibilityRoster,
    participants: &[Participant],
    ledger: &LedgerSnapshot,
    policy: AllocationPolicy,
) -> AllocationPlan {
    let known: BTreeSet<ParticipantId> = participants.iter().map(|p| p.id).collect();

    let mut ordered_tasks: Vec<&Task> = tasks.iter().collect();
    ordered_tasks.sort_by_key(|t| t.id);

    let mut proposals: BTreeMap<TaskId, Proposal> = BTreeMap::new();
    let mut candidates_by_task: BTreeMap<TaskId, Vec<ParticipantId>> = BTreeMap::new();
    let mut counts: BTreeMap<ParticipantId, usize> = BTreeMap::new();
    let mut unassigned = Vec::new();

    for task in &ordered_tasks {
        let eligible: Vec<ParticipantId> = roster
            .eligible(task.id)
            .iter()
            .copied()
            .filter(|p| {
                let ok = known.contains(p);
                if !ok {
                    debug!(task = %task.id, participant = %p, "skipping unknown roster entry");
                }
                ok
            })
            .collect();

        if eligible.is_empty() {
            warn!(task = %task.id, name = %task.name, "no eligible participant, task left unassigned");
            unassigned.push(task.id);
            continue;
        }

        let ordered = if eligible.len() > 1 {
            order_candidates(task, eligible, ledger, policy.tie_break)
        } else {
            eligible
        };

        let chosen = ordered
            .iter()
            .copied()
            .find(|p| counts.get(p).copied().unwrap_or(0) == 0)
            .unwrap_or(ordered[0]);

        *counts.entry(chosen).or_insert(0) += 1;
        proposals.insert(
            task.id,
            Proposal {
                task_id: task.id,
                participant_id: chosen,
                category_id: task.category_id,
                points: task.points,
            },
        );
        candidates_by_task.insert(task.id, ordered);
    }

    resolve_conflicts(
        &mut proposals,
        &mut counts,
        &candidates_by_task,
        &known,
        policy.conflict,
        &mut unassigned,
    );

    unassigned.sort();
    AllocationPlan {
        proposals: proposals.into_values().collect(),
        unassigned,
    }
}

fn resolve_conflicts(
    proposals: &mut BTreeMap<TaskId, Proposal>,
    counts: &mut BTreeMap<ParticipantId, usize>,
    candidates_by_task: &BTreeMap<TaskId, Vec<ParticipantId>>,
    known: &BTreeSet<ParticipantId>,
    conflict: ConflictPolicy,
    unassigned: &mut Vec<TaskId>,
) {
    let overloaded: Vec<ParticipantId> = counts
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(p, _)| *p)
        .collect();

    for participant in overloaded {
        let mut held: Vec<Proposal> = proposals
            .values()
            .filter(|p| p.participant_id == participant)
            .copied()
            .collect();
        // Highest points first, lower task id wins a tie.
        held.sort_by(|a, b| b.points.cmp(&a.points).then(a.task_id.cmp(&b.task_id)));

        for surplus in held.into_iter().skip(1) {
            let idle = |p: &ParticipantId| counts.get(p).copied().unwrap_or(0) == 0;
            let replacement = match conflict {
                ConflictPolicy::EligibleOnly => candidates_by_task
                    .get(&surplus.task_id)
                    .and_then(|list| list.iter().copied().find(|p| idle(p))),
                ConflictPolicy::AnyIdle => known.iter().copied().find(|p| idle(p)),
            };

            if let Some(count) = counts.get_mut(&participant) {
                *count -= 1;
            }

            match replacement {
                Some(next) => {
                    debug!(task = %surplus.task_id, from = %participant, to = %next, "re-homed double assignment");
                    *counts.entry(next).or_insert(0) += 1;
                    if let Some(p) = proposals.get_mut(&surplus.task_id) {
                        p.participant_id = next;
                    }
                }
                None => {
                    warn!(task = %surplus.task_id, holder = %participant, "no idle participant for surplus task, left unassigned");
                    proposals.remove(&surplus.task_id);
                    unassigned.push(surplus.task_id);
                }
            }
        }
    }
}

/// Outcome of persisting a plan.
#[derive(Debug, Clone, Default)]
pub struct AllocationReport {
    pub created: Vec<WeeklyAssignment>,
    /// Tasks skipped because they already had an open record.
    pub already_open: Vec<TaskId>,
    pub unassigned: Vec<TaskId>,
}

/// Store-backed allocator.
#[derive(Clone)]
pub struct Allocator {
    store: Arc<dyn ChoreStore>,
    ledger: ScoreLedger,
    policy: AllocationPolicy,
}

impl Allocator {
    pub fn new(store: Arc<dyn ChoreStore>, policy: AllocationPolicy) -> Self {
        Self {
            ledger: ScoreLedger::new(store.clone()),
            store,
            policy,
        }
    }

    pub fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// Plan `cycle` and persist each proposal as a `pending` record.
    ///
    /// Tasks that already hold an open record in the cycle are left alone,
    /// so running this twice for one cycle creates nothing the second time.
    pub fn allocate_cycle(&self, cycle: CycleKey) -> Result<AllocationReport> {
        let tasks = self.store.tasks()?;
        let roster = self.store.roster()?;
        let participants = self.store.participants()?;
        let snapshot = self.ledger.snapshot()?;

        let plan = plan(&tasks, &roster, &participants, &snapshot, self.policy);

        let mut report = AllocationReport {
            unassigned: plan.unassigned.clone(),
            ..Default::default()
        };
        for proposal in plan.proposals {
            match self
                .store
                .create_pending(cycle, proposal.task_id, proposal.participant_id)?
            {
                Some(record) => report.created.push(record),
                None => report.already_open.push(proposal.task_id),
            }
        }

        info!(
            %cycle,
            created = report.created.len(),
            already_open = report.already_open.len(),
            unassigned = report.unassigned.len(),
            "cycle allocated"
        );
        Ok(report)
    }
}
