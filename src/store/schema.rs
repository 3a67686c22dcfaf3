//! SQLite DDL definitions for the chore store.
//!
//! All `CREATE TABLE` / `CREATE INDEX` / `CREATE TRIGGER` statements live
//! here so they are reviewable and testable in isolation.

use rusqlite::Connection;

pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Complete DDL for the chore database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participants (
    id      INTEGER PRIMARY KEY,
    name    TEXT NOT NULL,
    address TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS categories (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS tasks (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    points      INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
    category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL
);

-- Roster order is the rowid order; reassignment scans it as-is.
CREATE TABLE IF NOT EXISTS eligibility (
    task_id        INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    participant_id INTEGER NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
    UNIQUE (task_id, participant_id)
);

CREATE TABLE IF NOT EXISTS score_ledger (
    participant_id INTEGER NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
    category_id    INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
    points         INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
    PRIMARY KEY (participant_id, category_id)
);

-- AUTOINCREMENT: ids of declined records are never handed out again.
CREATE TABLE IF NOT EXISTS weekly_assignments (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id        INTEGER NOT NULL REFERENCES tasks(id),
    participant_id INTEGER NOT NULL REFERENCES participants(id),
    year           INTEGER NOT NULL,
    week           INTEGER NOT NULL,
    status         TEXT NOT NULL DEFAULT 'pending'
                   CHECK (status IN ('pending', 'confirmed', 'declined', 'completed')),
    created_at     INTEGER NOT NULL DEFAULT 0,
    updated_at     INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_assignments_cycle
    ON weekly_assignments(year, week);

-- At most one open record per task and cycle.
CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_open_task
    ON weekly_assignments(year, week, task_id)
    WHERE status IN ('pending', 'confirmed');

-- Declined and completed records are immutable.
CREATE TRIGGER IF NOT EXISTS trg_assignments_terminal
    BEFORE UPDATE ON weekly_assignments
    WHEN OLD.status IN ('declined', 'completed')
BEGIN
    SELECT RAISE(ABORT, 'assignment record is terminal');
END;
"#;

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times. Seeds the schema version on a fresh database.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let version_str = CURRENT_SCHEMA_VERSION.to_string();
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![version_str],
    )?;

    Ok(())
}

/// Read the current schema version, `None` when unset.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
