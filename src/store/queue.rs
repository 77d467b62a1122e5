//! Queue scans: deterministic, read-only, cursor-paginated retrieval.

use rusqlite::params;

use crate::cursor::Cursor;
use crate::model::{Job, JobStatus};

use super::job::{JOB_COLUMNS, RawJob};
use super::{Result, Storage};

/// One page of a queue scan.
#[derive(Debug)]
pub struct QueuePage {
    pub jobs: Vec<Job>,
    pub has_more: bool,
    /// Position of the last returned row; present only when `has_more`.
    pub next_cursor: Option<Cursor>,
}

impl Storage {
    /// Reads one page of jobs in `status`, ordered by
    /// `(captured_at DESC, id DESC)`.
    ///
    /// `captured_at` alone is not unique, so `id` is the tie-break; the
    /// composite key makes the scan total and repeatable. Fetches
    /// `limit + 1` rows to detect `has_more` and drops the extra row from
    /// the page. Strictly read-only: no write statement of any kind runs
    /// on this path, so two traversals of an unmodified store produce
    /// identical page sequences.
    pub fn read_queue(
        &self,
        status: JobStatus,
        limit: usize,
        cursor: Option<Cursor>,
    ) -> Result<QueuePage> {
        let fetch = i64::try_from(limit).unwrap_or(i64::MAX).saturating_add(1);
        let mut raw: Vec<RawJob> = match cursor {
            Some(c) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM job
                     WHERE status = ?1 AND (captured_at_ms, id) < (?2, ?3)
                     ORDER BY captured_at_ms DESC, id DESC
                     LIMIT ?4"
                ))?;
                let rows = stmt.query_map(
                    params![status.as_str(), c.captured_at_ms, c.id, fetch],
                    RawJob::read,
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM job
                     WHERE status = ?1
                     ORDER BY captured_at_ms DESC, id DESC
                     LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![status.as_str(), fetch], RawJob::read)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        let has_more = raw.len() > limit;
        if has_more {
            raw.truncate(limit);
        }

        let mut jobs = Vec::with_capacity(raw.len());
        for row in raw {
            jobs.push(row.into_job()?);
        }

        // The cursor points at the last row the caller now holds, not the
        // dropped lookahead row.
        let next_cursor = if has_more {
            jobs.last().map(|j| Cursor {
                captured_at_ms: j.captured_at.as_millisecond(),
                id: j.id,
            })
        } else {
            None
        };

        Ok(QueuePage {
            jobs,
            has_more,
            next_cursor,
        })
    }
}
