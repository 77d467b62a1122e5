//! SQLite persistence for job records.
//!
//! One database file, one `job` table. Timestamps are stored as integer
//! Unix milliseconds so the queue scan's composite ordering is a plain
//! `ORDER BY`. Concerns are split across submodules, each an `impl
//! Storage` block:
//!
//! - `job` — inserts, single-row loads, intake dedup, status counts
//! - `queue` — cursor-paginated read-only scans
//! - `batch` — atomic batch status transitions
//! - `finalize` — completion commit and compensation writes

mod batch;
mod finalize;
mod job;
mod queue;

pub use batch::{BatchRequestError, MAX_BATCH, validate_batch_request};
pub use queue::QueuePage;

use std::path::{Path, PathBuf};
use std::{fs, io};

use jiff::Timestamp;
use rusqlite::Connection;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    JobNotFound(i64),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type Result<T> = core::result::Result<T, StoreError>;

/// Handle to the job store. All mutation goes through explicit
/// transactions opened on this connection; there is no shared global.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens (creating if needed) the database at `path` and applies the
    /// schema. Parent directories are created as required.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// Opens a throwaway in-memory store.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// Returns the default database path: `~/.dossier/jobs.db`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".dossier").join("jobs.db"))
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS job (
              id INTEGER PRIMARY KEY,
              external_id TEXT,
              title TEXT NOT NULL,
              organization TEXT NOT NULL,
              description TEXT,
              source_url TEXT NOT NULL UNIQUE,
              location TEXT,
              origin TEXT,
              status TEXT NOT NULL,
              captured_at_ms INTEGER NOT NULL,
              updated_at_ms INTEGER NOT NULL,
              artifact_path TEXT,
              completed_at_ms INTEGER,
              run_id TEXT,
              attempt_count INTEGER NOT NULL DEFAULT 0,
              last_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_job_queue_scan
              ON job (status, captured_at_ms DESC, id DESC);
            ",
        )?;
        Ok(())
    }
}

/// Converts a stored millisecond timestamp back to a [`Timestamp`].
pub(crate) fn timestamp_from_ms(ms: i64, field: &str) -> Result<Timestamp> {
    Timestamp::from_millisecond(ms)
        .map_err(|e| StoreError::Corrupt(format!("invalid {field}: {e}")))
}
