//! Durable records for participants, tasks, categories, the eligibility
//! roster, the score ledger and weekly assignments.
//!
//! Sub-modules:
//! - `schema`: SQLite DDL definitions.
//! - `sqlite`: SQLite-backed [`SqliteChoreStore`].

pub(crate) mod schema;
pub mod sqlite;

pub use sqlite::SqliteChoreStore;

use crate::cycle::CycleKey;
use crate::ledger::LedgerEntry;
use crate::model::{
    AssignmentId, AssignmentStatus, Category, CategoryId, EligibilityRoster, Participant,
    ParticipantId, Task, TaskId, WeeklyAssignment,
};

/// Errors from the persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("lock poisoned: {0}")]
    Lock(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence contract consumed by the workflow engine.
///
/// Every method is a single atomic step; the engine itself serializes
/// callers, so no cross-call isolation is assumed.
pub trait ChoreStore: Send + Sync {
    // -- participants --------------------------------------------------

    /// All participants ordered by id.
    fn participants(&self) -> StoreResult<Vec<Participant>>;

    fn participant(&self, id: ParticipantId) -> StoreResult<Option<Participant>>;

    fn participant_by_address(&self, address: &str) -> StoreResult<Option<Participant>>;

    fn add_participant(&self, name: &str, address: &str) -> StoreResult<ParticipantId>;

    /// Overwrite a participant's name and address. `NotFound` if absent.
    fn update_participant(&self, id: ParticipantId, name: &str, address: &str)
    -> StoreResult<()>;

    // -- reference data ------------------------------------------------

    /// All tasks ordered by id.
    fn tasks(&self) -> StoreResult<Vec<Task>>;

    fn task(&self, id: TaskId) -> StoreResult<Option<Task>>;

    fn add_task(
        &self,
        name: &str,
        points: u32,
        category: Option<CategoryId>,
    ) -> StoreResult<TaskId>;

    /// All categories ordered by id.
    fn categories(&self) -> StoreResult<Vec<Category>>;

    fn add_category(&self, name: &str) -> StoreResult<CategoryId>;

    /// The full roster in insertion order.
    fn roster(&self) -> StoreResult<EligibilityRoster>;

    fn add_eligibility(&self, task: TaskId, participant: ParticipantId) -> StoreResult<()>;

    // -- score ledger --------------------------------------------------

    /// Every non-zero ledger cell.
    fn ledger_entries(&self) -> StoreResult<Vec<LedgerEntry>>;

    // -- weekly assignments --------------------------------------------

    /// Insert a new `pending` record unless the task already has an open
    /// record in the cycle, in which case `None` is returned.
    fn create_pending(
        &self,
        cycle: CycleKey,
        task: TaskId,
        participant: ParticipantId,
    ) -> StoreResult<Option<WeeklyAssignment>>;

    fn assignment(&self, id: AssignmentId) -> StoreResult<Option<WeeklyAssignment>>;

    /// Every record of the cycle, oldest first.
    fn assignments_for_cycle(&self, cycle: CycleKey) -> StoreResult<Vec<WeeklyAssignment>>;

    /// Move a record from `from` to `to`. Returns `false` when the record
    /// was no longer in `from`.
    fn transition(
        &self,
        id: AssignmentId,
        from: AssignmentStatus,
        to: AssignmentStatus,
    ) -> StoreResult<bool>;

    /// Move a record from `confirmed` to `completed` and credit `points` to
    /// the holder's `category` score in the same transaction. Returns `false`
    /// (and credits nothing) when the record was not `confirmed`.
    fn complete_and_credit(
        &self,
        id: AssignmentId,
        category: Option<CategoryId>,
        points: u32,
    ) -> StoreResult<bool>;
}
