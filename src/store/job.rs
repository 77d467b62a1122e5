//! Job row storage: inserts, single-row loads, intake dedup, counts.

use jiff::Timestamp;
use rusqlite::{OptionalExtension, Row, params};

use crate::model::{Candidate, Job, JobStatus};

use super::{Result, Storage, StoreError, timestamp_from_ms};

/// Column list shared by every query that materializes a [`Job`].
/// Order must match [`RawJob::read`].
pub(super) const JOB_COLUMNS: &str = "id, external_id, title, organization, description, \
     source_url, location, origin, status, captured_at_ms, updated_at_ms, \
     artifact_path, completed_at_ms, run_id, attempt_count, last_error";

/// A job row as it comes off the wire from SQLite, before the status and
/// timestamp columns are validated.
pub(super) struct RawJob {
    id: i64,
    external_id: Option<String>,
    title: String,
    organization: String,
    description: Option<String>,
    source_url: String,
    location: Option<String>,
    origin: Option<String>,
    status: String,
    captured_at_ms: i64,
    updated_at_ms: i64,
    artifact_path: Option<String>,
    completed_at_ms: Option<i64>,
    run_id: Option<String>,
    attempt_count: i64,
    last_error: Option<String>,
}

impl RawJob {
    pub(super) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            external_id: row.get(1)?,
            title: row.get(2)?,
            organization: row.get(3)?,
            description: row.get(4)?,
            source_url: row.get(5)?,
            location: row.get(6)?,
            origin: row.get(7)?,
            status: row.get(8)?,
            captured_at_ms: row.get(9)?,
            updated_at_ms: row.get(10)?,
            artifact_path: row.get(11)?,
            completed_at_ms: row.get(12)?,
            run_id: row.get(13)?,
            attempt_count: row.get(14)?,
            last_error: row.get(15)?,
        })
    }

    pub(super) fn into_job(self) -> Result<Job> {
        let status = JobStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown job status: {}", self.status)))?;
        let captured_at = timestamp_from_ms(self.captured_at_ms, "captured_at")?;
        let updated_at = timestamp_from_ms(self.updated_at_ms, "updated_at")?;
        let completed_at = match self.completed_at_ms {
            Some(ms) => Some(timestamp_from_ms(ms, "completed_at")?),
            None => None,
        };
        Ok(Job {
            id: self.id,
            external_id: self.external_id,
            title: self.title,
            organization: self.organization,
            description: self.description,
            source_url: self.source_url,
            location: self.location,
            origin: self.origin,
            status,
            captured_at,
            updated_at,
            artifact_path: self.artifact_path,
            completed_at,
            run_id: self.run_id,
            attempt_count: self.attempt_count,
            last_error: self.last_error,
        })
    }
}

impl Storage {
    /// Inserts a candidate as a new job with status `new`.
    /// Returns the store-assigned id.
    pub fn insert_job(&self, candidate: &Candidate, captured_at: Timestamp) -> Result<i64> {
        let ms = captured_at.as_millisecond();
        self.conn.execute(
            "INSERT INTO job (external_id, title, organization, description, source_url,
                              location, origin, status, captured_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                candidate.external_id,
                candidate.title,
                candidate.organization,
                candidate.description,
                candidate.source_url,
                candidate.location,
                candidate.origin,
                JobStatus::New.as_str(),
                ms,
                ms,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Loads a single job by id.
    pub fn load_job(&self, id: i64) -> Result<Job> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM job WHERE id = ?1"),
                params![id],
                RawJob::read,
            )
            .optional()?
            .ok_or(StoreError::JobNotFound(id))?;
        raw.into_job()
    }

    /// Whether a job with this source URL is already stored.
    /// Intake dedup keys on the posting URL, not the title.
    pub fn source_url_exists(&self, source_url: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM job WHERE source_url = ?1)",
            params![source_url],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    /// Per-status row counts across the whole store.
    pub fn status_counts(&self) -> Result<Vec<(JobStatus, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM job GROUP BY status ORDER BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (status_str, count) = row?;
            let status = JobStatus::parse(&status_str)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown job status: {status_str}")))?;
            counts.push((status, count));
        }
        Ok(counts)
    }
}
