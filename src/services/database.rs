//! SQLite handle shared by the usage store, decay scheduler and subject index.
//!
//! The connection lives behind a mutex: every writer holds it for the whole
//! of its transaction, which serializes `record_choice`, the decay sweep and
//! index rebuilds against each other.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{RankError, RankResult};

/// Schema version written to `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

/// How long a statement waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Keys of the `metadata` table.
pub(crate) mod keys {
    /// Day-of-year of the last decay sweep.
    pub const LAST_DECAY: &str = "last_decay";
    /// Year of the last decay sweep.
    pub const LAST_DECAY_YEAR: &str = "last_decay_year";
    /// 1 when raw choices are logged.
    pub const COLLECT_RAW: &str = "collect_raw";
}

/// The usage database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> RankResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        tracing::debug!("Opened usage database at {}", path.display());

        Self::from_connection(conn)
    }

    /// A private database that lives as long as the handle.
    pub fn open_in_memory() -> RankResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> RankResult<Self> {
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Take the connection for the duration of one unit of work.
    pub(crate) fn lock(&self) -> RankResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RankError::Storage("database lock poisoned".to_string()))
    }
}

fn migrate(conn: &mut Connection) -> RankResult<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS usage (
            subject_id TEXT NOT NULL,
            day INTEGER NOT NULL,
            time_slot INTEGER NOT NULL,
            score INTEGER NOT NULL,
            PRIMARY KEY (subject_id, day, time_slot)
        );

        CREATE INDEX IF NOT EXISTS idx_usage_slot ON usage(time_slot, day);

        CREATE TABLE IF NOT EXISTS metadata (
            field TEXT PRIMARY KEY,
            content INTEGER
        );

        CREATE TABLE IF NOT EXISTS subjects (
            subject_id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS subjects_dirty (
            subject_id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS usage_raw (
            subject_id TEXT NOT NULL,
            chosen_at TEXT NOT NULL
        );",
    )?;
    tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    tx.commit()?;

    tracing::info!("Usage database initialized at schema version {}", SCHEMA_VERSION);
    Ok(())
}

/// Read an integer from the `metadata` table.
pub(crate) fn get_metadata(conn: &Connection, field: &str) -> RankResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT content FROM metadata WHERE field = ?1",
            params![field],
            |row| row.get(0),
        )
        .optional()?)
}

/// Write an integer to the `metadata` table.
pub(crate) fn set_metadata(conn: &Connection, field: &str, content: i64) -> RankResult<()> {
    conn.execute(
        "INSERT INTO metadata (field, content) VALUES (?1, ?2)
         ON CONFLICT(field) DO UPDATE SET content = excluded.content",
        params![field, content],
    )?;
    Ok(())
}
