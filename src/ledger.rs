//! Read access to the cumulative per-category score ledger.
//!
//! The ledger is written only by the lifecycle when a record reaches
//! `completed`; everything here is a read-only view.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{CategoryId, ParticipantId};
use crate::store::ChoreStore;

/// One `(participant, category)` cell of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub participant_id: ParticipantId,
    pub category_id: CategoryId,
    pub points: u64,
}

/// Point-in-time copy of the ledger. Missing cells read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    cells: BTreeMap<(ParticipantId, CategoryId), u64>,
}

impl LedgerSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score of a participant in one category.
    pub fn score(&self, participant: ParticipantId, category: CategoryId) -> u64 {
        self.cells
            .get(&(participant, category))
            .copied()
            .unwrap_or(0)
    }

    /// Sum over all categories for one participant.
    pub fn total(&self, participant: ParticipantId) -> u64 {
        self.cells
            .iter()
            .filter(|((p, _), _)| *p == participant)
            .map(|(_, points)| *points)
            .sum()
    }

    /// Add points to a cell. Used to build fixtures and to mirror a credit.
    pub fn credit(&mut self, participant: ParticipantId, category: CategoryId, points: u64) {
        *self.cells.entry((participant, category)).or_insert(0) += points;
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<LedgerEntry> for LedgerSnapshot {
    fn from_iter<I: IntoIterator<Item = LedgerEntry>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for entry in iter {
            snapshot.credit(entry.participant_id, entry.category_id, entry.points);
        }
        snapshot
    }
}

/// Store-backed ledger accessor.
#[derive(Clone)]
pub struct ScoreLedger {
    store: Arc<dyn ChoreStore>,
}

impl ScoreLedger {
    pub fn new(store: Arc<dyn ChoreStore>) -> Self {
        Self { store }
    }

    /// Load the full ledger.
    pub fn snapshot(&self) -> Result<LedgerSnapshot> {
        Ok(self.store.ledger_entries()?.into_iter().collect())
    }

    /// Current score of one participant in one category.
    pub fn score(&self, participant: ParticipantId, category: CategoryId) -> Result<u64> {
        Ok(self.snapshot()?.score(participant, category))
    }
}
