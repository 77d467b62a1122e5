//! Completion writes for finalization: phase-1 commit and compensation.
//!
//! Each write is its own transaction. The saga in `crate::finalize`
//! sequences them; this module only guarantees that each one lands
//! atomically or not at all.

use jiff::Timestamp;
use rusqlite::params;

use crate::model::JobStatus;

use super::{Result, Storage, StoreError};

impl Storage {
    /// Phase-1 commit: records a completed artifact on the job row.
    ///
    /// Increments `attempt_count` (it counts attempted commits, not
    /// successes), stamps the completion audit fields with the shared
    /// per-invocation `run_id`, and clears any prior error.
    pub fn mark_artifact_complete(
        &mut self,
        id: i64,
        artifact_path: &str,
        run_id: &str,
        now: Timestamp,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        let now_ms = now.as_millisecond();
        let rows = tx.execute(
            "UPDATE job
             SET status = ?1, artifact_path = ?2, completed_at_ms = ?3, run_id = ?4,
                 attempt_count = attempt_count + 1, last_error = NULL,
                 updated_at_ms = MAX(updated_at_ms, ?5)
             WHERE id = ?6",
            params![
                JobStatus::ArtifactComplete.as_str(),
                artifact_path,
                now_ms,
                run_id,
                now_ms,
                id,
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::JobNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    /// Compensation: reverts a committed completion after the note sync
    /// failed, leaving the job retry-eligible with a diagnostic.
    ///
    /// The target is `reviewed`, not `new`: the job has been triaged and
    /// must stay in the finalization-eligible pool. The audit fields
    /// from the failed attempt are kept; they record what was tried.
    pub fn revert_to_reviewed(&mut self, id: i64, last_error: &str, now: Timestamp) -> Result<()> {
        let tx = self.conn.transaction()?;
        let now_ms = now.as_millisecond();
        let rows = tx.execute(
            "UPDATE job
             SET status = ?1, last_error = ?2, updated_at_ms = MAX(updated_at_ms, ?3)
             WHERE id = ?4",
            params![JobStatus::Reviewed.as_str(), last_error, now_ms, id],
        )?;
        if rows == 0 {
            return Err(StoreError::JobNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::job::tests::{sample_candidate, ts};
    use super::*;

    fn seeded() -> (Storage, i64) {
        let storage = Storage::open_in_memory().unwrap();
        let id = storage
            .insert_job(&sample_candidate(1), ts(1_700_000_000))
            .unwrap();
        (storage, id)
    }

    #[test]
    fn commit_stamps_the_audit_trail() {
        let (mut storage, id) = seeded();

        storage
            .mark_artifact_complete(id, "work/acme/resume.pdf", "run-1", ts(1_700_000_100))
            .unwrap();

        let job = storage.load_job(id).unwrap();
        assert_eq!(job.status, JobStatus::ArtifactComplete);
        assert_eq!(job.artifact_path.as_deref(), Some("work/acme/resume.pdf"));
        assert_eq!(job.completed_at, Some(ts(1_700_000_100)));
        assert_eq!(job.run_id.as_deref(), Some("run-1"));
        assert_eq!(job.attempt_count, 1);
        assert!(job.last_error.is_none());
    }

    #[test]
    fn commit_unknown_job_fails_cleanly() {
        let (mut storage, _) = seeded();
        let err = storage
            .mark_artifact_complete(999, "x.pdf", "run-1", ts(1_700_000_100))
            .unwrap_err();
        assert!(matches!(err, StoreError::JobNotFound(999)));
    }

    #[test]
    fn revert_leaves_job_retry_eligible() {
        let (mut storage, id) = seeded();
        storage
            .mark_artifact_complete(id, "x.pdf", "run-1", ts(1_700_000_100))
            .unwrap();

        storage
            .revert_to_reviewed(id, "note sync failed", ts(1_700_000_101))
            .unwrap();

        let job = storage.load_job(id).unwrap();
        assert_eq!(job.status, JobStatus::Reviewed);
        assert_eq!(job.last_error.as_deref(), Some("note sync failed"));
        // The failed attempt stays counted and on record.
        assert_eq!(job.attempt_count, 1);
        assert_eq!(job.run_id.as_deref(), Some("run-1"));
    }

    #[test]
    fn each_commit_attempt_is_counted() {
        let (mut storage, id) = seeded();

        storage
            .mark_artifact_complete(id, "x.pdf", "run-1", ts(1_700_000_100))
            .unwrap();
        storage
            .revert_to_reviewed(id, "note sync failed", ts(1_700_000_101))
            .unwrap();
        storage
            .mark_artifact_complete(id, "x.pdf", "run-2", ts(1_700_000_200))
            .unwrap();

        let job = storage.load_job(id).unwrap();
        assert_eq!(job.attempt_count, 2);
        assert_eq!(job.status, JobStatus::ArtifactComplete);
        assert!(job.last_error.is_none());
    }
}
