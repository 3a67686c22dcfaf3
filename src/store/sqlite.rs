//! SQLite-backed chore store.
//!
//! A single database file (default `{data_dir}/chorewheel.db`) holds the
//! reference data, the score ledger and every weekly assignment record.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};

use super::schema::{apply_schema, read_schema_version};
use super::{ChoreStore, StoreError, StoreResult};
use crate::cycle::CycleKey;
use crate::ledger::LedgerEntry;
use crate::model::{
    AssignmentId, AssignmentStatus, Category, CategoryId, EligibilityRoster, Participant,
    ParticipantId, Task, TaskId, WeeklyAssignment,
};

const ASSIGNMENT_COLUMNS: &str =
    "id, task_id, participant_id, year, week, status, created_at, updated_at";

/// SQLite-backed store.
///
/// Thread-safe via an internal `Mutex<Connection>`; all access is serialized.
pub struct SqliteChoreStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteChoreStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> StoreResult<Option<u32>> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl ChoreStore for SqliteChoreStore {
    fn participants(&self) -> StoreResult<Vec<Participant>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name, address FROM participants ORDER BY id")?;
        let rows = stmt.query_map([], row_to_participant)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn participant(&self, id: ParticipantId) -> StoreResult<Option<Participant>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, name, address FROM participants WHERE id = ?1",
                params![id.0],
                row_to_participant,
            )
            .optional()?)
    }

    fn participant_by_address(&self, address: &str) -> StoreResult<Option<Participant>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, name, address FROM participants WHERE address = ?1",
                params![address],
                row_to_participant,
            )
            .optional()?)
    }

    fn add_participant(&self, name: &str, address: &str) -> StoreResult<ParticipantId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO participants (name, address) VALUES (?1, ?2)",
            params![name, address],
        )?;
        Ok(ParticipantId(conn.last_insert_rowid()))
    }

    fn update_participant(
        &self,
        id: ParticipantId,
        name: &str,
        address: &str,
    ) -> StoreResult<()> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE participants SET name = ?1, address = ?2 WHERE id = ?3",
            params![name, address, id.0],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("participant {id}")));
        }
        Ok(())
    }

    fn tasks(&self) -> StoreResult<Vec<Task>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name, points, category_id FROM tasks ORDER BY id")?;
        let rows = stmt.query_map([], row_to_task)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, name, points, category_id FROM tasks WHERE id = ?1",
                params![id.0],
                row_to_task,
            )
            .optional()?)
    }

    fn add_task(
        &self,
        name: &str,
        points: u32,
        category: Option<CategoryId>,
    ) -> StoreResult<TaskId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (name, points, category_id) VALUES (?1, ?2, ?3)",
            params![name, points, category.map(|c| c.0)],
        )?;
        Ok(TaskId(conn.last_insert_rowid()))
    }

    fn categories(&self) -> StoreResult<Vec<Category>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: CategoryId(row.get(0)?),
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn add_category(&self, name: &str) -> StoreResult<CategoryId> {
        let conn = self.lock()?;
        conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name])?;
        Ok(CategoryId(conn.last_insert_rowid()))
    }

    fn roster(&self) -> StoreResult<EligibilityRoster> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT task_id, participant_id FROM eligibility ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok((TaskId(row.get(0)?), ParticipantId(row.get(1)?)))
        })?;
        let pairs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs.into_iter().collect())
    }

    fn add_eligibility(&self, task: TaskId, participant: ParticipantId) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO eligibility (task_id, participant_id) VALUES (?1, ?2)",
            params![task.0, participant.0],
        )?;
        Ok(())
    }

    fn ledger_entries(&self) -> StoreResult<Vec<LedgerEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT participant_id, category_id, points FROM score_ledger \
             WHERE points > 0 ORDER BY participant_id, category_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LedgerEntry {
                participant_id: ParticipantId(row.get(0)?),
                category_id: CategoryId(row.get(1)?),
                points: row.get::<_, i64>(2)?.max(0) as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn create_pending(
        &self,
        cycle: CycleKey,
        task: TaskId,
        participant: ParticipantId,
    ) -> StoreResult<Option<WeeklyAssignment>> {
        let conn = self.lock()?;
        let now = now_epoch_secs();
        let tx = conn.unchecked_transaction()?;

        let open: i64 = tx.query_row(
            "SELECT COUNT(*) FROM weekly_assignments \
             WHERE year = ?1 AND week = ?2 AND task_id = ?3 \
             AND status IN ('pending', 'confirmed')",
            params![cycle.year, cycle.week, task.0],
            |row| row.get(0),
        )?;
        if open > 0 {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO weekly_assignments \
             (task_id, participant_id, year, week, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
            params![task.0, participant.0, cycle.year, cycle.week, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Some(WeeklyAssignment {
            id: AssignmentId(id),
            task_id: task,
            participant_id: participant,
            cycle,
            status: AssignmentStatus::Pending,
            created_at: now,
            updated_at: now,
        }))
    }

    fn assignment(&self, id: AssignmentId) -> StoreResult<Option<WeeklyAssignment>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM weekly_assignments WHERE id = ?1");
        Ok(conn
            .query_row(&sql, params![id.0], row_to_assignment)
            .optional()?)
    }

    fn assignments_for_cycle(&self, cycle: CycleKey) -> StoreResult<Vec<WeeklyAssignment>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM weekly_assignments \
             WHERE year = ?1 AND week = ?2 ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![cycle.year, cycle.week], row_to_assignment)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn transition(
        &self,
        id: AssignmentId,
        from: AssignmentStatus,
        to: AssignmentStatus,
    ) -> StoreResult<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE weekly_assignments SET status = ?1, updated_at = ?2 \
             WHERE id = ?3 AND status = ?4",
            params![to.as_str(), now_epoch_secs(), id.0, from.as_str()],
        )?;
        Ok(rows == 1)
    }

    fn complete_and_credit(
        &self,
        id: AssignmentId,
        category: Option<CategoryId>,
        points: u32,
    ) -> StoreResult<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let holder: Option<i64> = tx
            .query_row(
                "SELECT participant_id FROM weekly_assignments \
                 WHERE id = ?1 AND status = 'confirmed'",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;
        let Some(holder) = holder else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE weekly_assignments SET status = 'completed', updated_at = ?1 \
             WHERE id = ?2 AND status = 'confirmed'",
            params![now_epoch_secs(), id.0],
        )?;

        if let Some(category) = category {
            tx.execute(
                "INSERT INTO score_ledger (participant_id, category_id, points) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT (participant_id, category_id) \
                 DO UPDATE SET points = points + excluded.points",
                params![holder, category.0, points],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

fn row_to_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: ParticipantId(row.get(0)?),
        name: row.get(1)?,
        address: row.get(2)?,
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let points: i64 = row.get(2)?;
    let category: Option<i64> = row.get(3)?;
    Ok(Task {
        id: TaskId(row.get(0)?),
        name: row.get(1)?,
        points: u32::try_from(points).unwrap_or(0),
        category_id: category.map(CategoryId),
    })
}

fn row_to_assignment(row: &rusqlite::Row<'_>) -> rusqlite::Result<WeeklyAssignment> {
    let status_str: String = row.get(5)?;
    let status = AssignmentStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown assignment status `{status_str}`").into(),
        )
    })?;
    Ok(WeeklyAssignment {
        id: AssignmentId(row.get(0)?),
        task_id: TaskId(row.get(1)?),
        participant_id: ParticipantId(row.get(2)?),
        cycle: CycleKey {
            year: row.get(3)?,
            week: row.get(4)?,
        },
        status,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
