//! JobStore implementation over SQLite.
//!
//! One row per job, and by construction at most one row at a time: `submit`
//! deletes whatever is there before inserting. The store is the only shared
//! mutable resource between the HTTP boundary and the dispatch loop, so the
//! connection carries a busy timeout: a status read can never stall the
//! dispatcher indefinitely, and vice versa.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{ReqsmithError, Result};
use crate::store::job::{Job, JobStatus, JobType};

/// Outcome of an `update` call.
///
/// A missing row is not an error: an external actor may delete the record at
/// any time (cancellation, or a new submission), and callers decide what the
/// absence means. Transient I/O faults still surface as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The row was overwritten
    Updated,
    /// No row with this id exists; nothing was written
    Missing,
}

/// SQLite-backed job store. Cloning yields a handle to the same connection.
#[derive(Clone)]
pub struct JobStore {
    conn: Arc<Mutex<Connection>>,
}

impl JobStore {
    /// Open or create the store at the given database path.
    pub fn open(db_path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| ReqsmithError::Storage(format!("Failed to open {}: {}", db_path.display(), e)))?;
        Self::init(conn, busy_timeout)
    }

    /// Open an in-memory store. Useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ReqsmithError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        Self::init(conn, Duration::from_millis(100))
    }

    fn init(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                job_type TEXT NOT NULL,
                status TEXT NOT NULL,
                total_units INTEGER NOT NULL,
                completed_units INTEGER NOT NULL,
                input_json TEXT NOT NULL,
                results_json TEXT NOT NULL,
                model TEXT NOT NULL,
                strategy TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_created ON jobs(created_at);
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReqsmithError::Storage(format!("Connection lock poisoned: {}", e)))
    }

    /// Atomically delete any existing job and insert the new one.
    ///
    /// Guarantees the single-job invariant: after this returns, the given
    /// job is the only record in the store.
    pub fn submit(&self, job: &Job) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM jobs", [])?;
        tx.execute(
            r#"
            INSERT INTO jobs
            (id, job_type, status, total_units, completed_units,
             input_json, results_json, model, strategy, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                job.id,
                job.job_type.as_str(),
                job.status.as_str(),
                job.total_units,
                job.completed_units,
                job.input_json,
                job.results_json,
                job.model,
                job.strategy,
                job.created_at,
                job.updated_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Get a job snapshot by ID.
    pub fn get(&self, id: &str) -> Result<Option<Job>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, job_type, status, total_units, completed_units, \
             input_json, results_json, model, strategy, created_at, updated_at \
             FROM jobs WHERE id = ?1",
            [id],
            row_to_job,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Return the oldest `PENDING` job, if any.
    ///
    /// This is the only read the dispatch loop uses to pick work. With the
    /// single-job invariant "oldest" is a formality, but the query is a true
    /// FIFO pop should the constraint ever be relaxed.
    pub fn claim_oldest_pending(&self) -> Result<Option<Job>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, job_type, status, total_units, completed_units, \
             input_json, results_json, model, strategy, created_at, updated_at \
             FROM jobs WHERE status = ?1 ORDER BY created_at, id LIMIT 1",
            [JobStatus::Pending.as_str()],
            row_to_job,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Persist a full overwrite of the mutable fields.
    ///
    /// Returns `Missing` (not an error) when the row no longer exists;
    /// callers re-check and treat absence as cooperative cancellation.
    pub fn update(&self, job: &Job) -> Result<UpdateOutcome> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE jobs SET status = ?1, completed_units = ?2, results_json = ?3, updated_at = ?4 \
             WHERE id = ?5",
            params![
                job.status.as_str(),
                job.completed_units,
                job.results_json,
                job.updated_at,
                job.id,
            ],
        )?;

        if rows == 0 {
            Ok(UpdateOutcome::Missing)
        } else {
            Ok(UpdateOutcome::Updated)
        }
    }

    /// Delete all job records. Used by explicit cancellation and by `submit`.
    pub fn delete_all(&self) -> Result<usize> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM jobs", [])?;
        Ok(rows)
    }

    /// Liveness check: does a record with this id still exist?
    pub fn exists(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM jobs WHERE id = ?1", [id], |row| row.get(0))?;
        Ok(count > 0)
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let job_type_str: String = row.get(1)?;
    let status_str: String = row.get(2)?;

    let job_type = JobType::parse(&job_type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown job type: {}", job_type_str).into(),
        )
    })?;
    let status = JobStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown status: {}", status_str).into(),
        )
    })?;

    Ok(Job {
        id: row.get(0)?,
        job_type,
        status,
        total_units: row.get(3)?,
        completed_units: row.get(4)?,
        input_json: row.get(5)?,
        results_json: row.get(6)?,
        model: row.get(7)?,
        strategy: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
