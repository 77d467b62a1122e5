//! Finalization: commit completion to the store, then sync the note.
//!
//! A two-resource saga, run independently per item in request order.
//! For each item: validate preconditions (no mutation on failure),
//! commit the store's completion fields in one transaction, then
//! rewrite the note's status line. If the note sync fails after the
//! store committed, a compensating transaction reverts the job to the
//! retry-eligible `reviewed` state with a diagnostic. At every
//! quiescent point: store says `artifact_complete` only if the note
//! says `artifact_written`.
//!
//! `attempt_count` counts attempted phase-1 commits. A precondition
//! rejection touches nothing, so it does not count; a compensated run
//! does, which means a retried item's count reflects every commit that
//! was actually tried.

use std::collections::HashSet;
use std::path::Path;

use jiff::Timestamp;
use uuid::Uuid;

use crate::model::{
    FinalizeAction, FinalizeItem, FinalizeItemResult, FinalizeResult, NoteStatus,
};
use crate::note::{self, NoteError};
use crate::policy;
use crate::store::{Storage, StoreError};

/// Finalization request failures that reject the run wholesale.
#[derive(Debug, thiserror::Error)]
pub enum FinalizeRequestError {
    #[error("finalize request is empty")]
    Empty,

    #[error("duplicate id in finalize request: {0}")]
    DuplicateId(i64),
}

/// Options for one finalization run.
#[derive(Debug, Clone, Default)]
pub struct FinalizeOptions {
    /// Shared run id; generated when absent.
    pub run_id: Option<String>,
    /// Predict outcomes without writing anything.
    pub dry_run: bool,
}

/// Validates request shape before any store or filesystem work.
pub fn validate_finalize_request(items: &[FinalizeItem]) -> Result<(), FinalizeRequestError> {
    if items.is_empty() {
        return Err(FinalizeRequestError::Empty);
    }
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id) {
            return Err(FinalizeRequestError::DuplicateId(item.id));
        }
    }
    Ok(())
}

/// Runs finalization over the items, in order.
pub fn run(
    storage: &mut Storage,
    items: &[FinalizeItem],
    options: &FinalizeOptions,
) -> Result<FinalizeResult, FinalizeRequestError> {
    validate_finalize_request(items)?;
    let run_id = options
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    Ok(run_with_sync(
        storage,
        items,
        &run_id,
        options.dry_run,
        note::sync_status,
    ))
}

/// Saga phases for one item, in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Validated,
    Committed,
    Synced,
    Compensated,
}

/// Pure phase transition from the latest step outcome.
///
/// A failed commit leaves nothing to undo, so `Validated` holds; the
/// terminal phases hold regardless of input.
fn next_phase(current: Phase, step_ok: bool) -> Phase {
    match (current, step_ok) {
        (Phase::Validated, true) => Phase::Committed,
        (Phase::Committed, true) => Phase::Synced,
        (Phase::Committed, false) => Phase::Compensated,
        (phase, _) => phase,
    }
}

/// Driver with an injectable note-sync step, so the compensation path
/// is testable without sabotaging a real filesystem.
fn run_with_sync(
    storage: &mut Storage,
    items: &[FinalizeItem],
    run_id: &str,
    dry_run: bool,
    sync: impl Fn(&Path, NoteStatus) -> note::Result<()>,
) -> FinalizeResult {
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        results.push(finalize_item(storage, item, run_id, dry_run, &sync));
    }
    let finalized_count = results.iter().filter(|r| r.success).count();
    FinalizeResult {
        run_id: run_id.to_string(),
        finalized_count,
        failed_count: results.len() - finalized_count,
        dry_run,
        results,
    }
}

fn finalize_item(
    storage: &mut Storage,
    item: &FinalizeItem,
    run_id: &str,
    dry_run: bool,
    sync: &impl Fn(&Path, NoteStatus) -> note::Result<()>,
) -> FinalizeItemResult {
    let failed = |error: String| FinalizeItemResult {
        id: item.id,
        action: if dry_run {
            FinalizeAction::WouldFail
        } else {
            FinalizeAction::Failed
        },
        success: false,
        error: Some(error),
    };

    // Preconditions: the note resolves and parses, and the linked
    // artifact meets the quality bar. Nothing is written on failure,
    // not even a compensation.
    let meta = match note::load(&item.note) {
        Ok(meta) => meta,
        Err(e) => return failed(sanitize_note_error(&e)),
    };
    let Some(artifact) = item.artifact_override.clone().or_else(|| meta.resume.clone()) else {
        return failed("note links no artifact".into());
    };
    let Some(companion) = meta.resume_source else {
        return failed("note links no companion source".into());
    };
    if let Err(failure) = policy::check_artifact_ready(&artifact, &companion) {
        return failed(failure.reason());
    }

    if dry_run {
        return FinalizeItemResult {
            id: item.id,
            action: FinalizeAction::WouldFinalize,
            success: true,
            error: None,
        };
    }

    let mut phase = Phase::Validated;

    // Phase 1: commit completion to the store. Its own transaction
    // rolls back on failure, so an error here mutates nothing.
    if let Err(e) = storage.mark_artifact_complete(
        item.id,
        &artifact.to_string_lossy(),
        run_id,
        Timestamp::now(),
    ) {
        return failed(sanitize_store_error(&e));
    }
    phase = next_phase(phase, true);

    // Phase 2: sync the note's status line.
    let sync_err = sync(&item.note, NoteStatus::ArtifactWritten).err();
    phase = next_phase(phase, sync_err.is_none());

    if phase == Phase::Compensated {
        let diagnostic = match &sync_err {
            Some(e) => format!("note sync failed: {}", sanitize_note_error(e)),
            None => "note sync failed".into(),
        };
        return match storage.revert_to_reviewed(item.id, &diagnostic, Timestamp::now()) {
            Ok(()) => failed(diagnostic),
            Err(_) => failed(format!(
                "{diagnostic}; compensation failed, store needs manual repair"
            )),
        };
    }

    FinalizeItemResult {
        id: item.id,
        action: FinalizeAction::Finalized,
        success: true,
        error: None,
    }
}

/// Stable diagnostics without underlying I/O detail.
fn sanitize_note_error(err: &NoteError) -> String {
    match err {
        NoteError::NotFound(_) => "note is missing".into(),
        NoteError::MissingField(field) => format!("note is missing required field: {field}"),
        NoteError::InvalidStatus(_) => "note has an invalid status value".into(),
        NoteError::MissingStatusLine => "note has no status line".into(),
        NoteError::MissingNotesSection => "note has no notes section".into(),
        NoteError::Io(_) => "note could not be read or written".into(),
    }
}

fn sanitize_store_error(err: &StoreError) -> String {
    match err {
        StoreError::JobNotFound(id) => format!("job not found: {id}"),
        StoreError::Io(_) | StoreError::Sql(_) | StoreError::Corrupt(_) => {
            "store update failed".into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use crate::model::{Candidate, JobStatus};

    fn seeded_storage() -> (Storage, i64) {
        let storage = Storage::open_in_memory().unwrap();
        let candidate = Candidate {
            external_id: None,
            title: "Engineer".into(),
            organization: "Acme Corp".into(),
            description: None,
            source_url: "https://jobs.example.com/1".into(),
            location: None,
            origin: None,
        };
        let id = storage
            .insert_job(&candidate, Timestamp::new(1_700_000_000, 0).unwrap())
            .unwrap();
        (storage, id)
    }

    /// Lays out a ready-to-finalize note, artifact, and companion.
    fn ready_item(dir: &TempDir, id: i64) -> FinalizeItem {
        let artifact = dir.path().join("resume.pdf");
        let companion = dir.path().join("resume.md");
        fs::write(&artifact, b"%PDF-1.7 ...").unwrap();
        fs::write(&companion, "# Resume\n\nFinished content.\n").unwrap();
        FinalizeItem {
            id,
            note: write_note(dir, "note.md", &artifact, &companion),
            artifact_override: None,
        }
    }

    fn write_note(dir: &TempDir, name: &str, artifact: &Path, companion: &Path) -> PathBuf {
        let content = format!(
            "# Engineer at Acme Corp\n\n- source: https://jobs.example.com/1\n- organization: Acme Corp\n- position: Engineer\n- status: reviewed\n- resume: {}\n- resume-source: {}\n\n## Notes\n",
            artifact.display(),
            companion.display()
        );
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn phase_machine_covers_both_outcomes() {
        assert_eq!(next_phase(Phase::Validated, true), Phase::Committed);
        assert_eq!(next_phase(Phase::Validated, false), Phase::Validated);
        assert_eq!(next_phase(Phase::Committed, true), Phase::Synced);
        assert_eq!(next_phase(Phase::Committed, false), Phase::Compensated);
        assert_eq!(next_phase(Phase::Synced, false), Phase::Synced);
        assert_eq!(next_phase(Phase::Compensated, true), Phase::Compensated);
    }

    #[test]
    fn finalizes_a_ready_item() {
        let (mut storage, id) = seeded_storage();
        let dir = TempDir::new().unwrap();
        let item = ready_item(&dir, id);

        let result = run(&mut storage, &[item.clone()], &FinalizeOptions::default()).unwrap();

        assert_eq!(result.finalized_count, 1);
        assert_eq!(result.failed_count, 0);
        assert_eq!(result.results[0].action, FinalizeAction::Finalized);

        let job = storage.load_job(id).unwrap();
        assert_eq!(job.status, JobStatus::ArtifactComplete);
        assert_eq!(job.run_id.as_deref(), Some(result.run_id.as_str()));
        assert_eq!(job.attempt_count, 1);

        let note = fs::read_to_string(&item.note).unwrap();
        assert!(note.contains("- status: artifact_written\n"));
    }

    #[test]
    fn missing_artifact_fails_without_any_write() {
        let (mut storage, id) = seeded_storage();
        let dir = TempDir::new().unwrap();
        let item = ready_item(&dir, id);
        fs::remove_file(dir.path().join("resume.pdf")).unwrap();

        let before = storage.load_job(id).unwrap();
        let result = run(&mut storage, &[item], &FinalizeOptions::default()).unwrap();

        assert_eq!(result.results[0].action, FinalizeAction::Failed);
        assert_eq!(result.results[0].error.as_deref(), Some("artifact is missing"));

        // Not even a compensation ran: the row is untouched.
        let after = storage.load_job(id).unwrap();
        assert_eq!(after.status, before.status);
        assert_eq!(after.attempt_count, before.attempt_count);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[test]
    fn failed_note_sync_compensates_to_reviewed() {
        let (mut storage, id) = seeded_storage();
        let dir = TempDir::new().unwrap();
        let item = ready_item(&dir, id);

        let result = run_with_sync(&mut storage, &[item], "run-X", false, |_, _| {
            Err(NoteError::MissingStatusLine)
        });

        assert_eq!(result.results[0].action, FinalizeAction::Failed);

        let job = storage.load_job(id).unwrap();
        assert_eq!(job.status, JobStatus::Reviewed);
        assert_eq!(job.attempt_count, 1);
        let last_error = job.last_error.unwrap();
        assert!(last_error.contains("note sync failed"));
    }

    #[test]
    fn dry_run_predicts_without_writing() {
        let (mut storage, id) = seeded_storage();
        let dir = TempDir::new().unwrap();
        let item = ready_item(&dir, id);
        let note_before = fs::read_to_string(&item.note).unwrap();
        let job_before = storage.load_job(id).unwrap();

        let options = FinalizeOptions {
            run_id: None,
            dry_run: true,
        };
        let result = run(&mut storage, &[item.clone()], &options).unwrap();

        assert!(result.dry_run);
        assert_eq!(result.results[0].action, FinalizeAction::WouldFinalize);

        let job_after = storage.load_job(id).unwrap();
        assert_eq!(job_after.status, job_before.status);
        assert_eq!(job_after.attempt_count, job_before.attempt_count);
        assert_eq!(fs::read_to_string(&item.note).unwrap(), note_before);
    }

    #[test]
    fn dry_run_predicts_failures_too() {
        let (mut storage, id) = seeded_storage();
        let dir = TempDir::new().unwrap();
        let item = ready_item(&dir, id);
        fs::remove_file(dir.path().join("resume.pdf")).unwrap();

        let options = FinalizeOptions {
            run_id: None,
            dry_run: true,
        };
        let result = run(&mut storage, &[item], &options).unwrap();

        assert_eq!(result.results[0].action, FinalizeAction::WouldFail);
        assert_eq!(result.results[0].error.as_deref(), Some("artifact is missing"));
    }

    #[test]
    fn items_are_isolated_from_each_other() {
        let (mut storage, id_ok) = seeded_storage();
        let id_bad = storage
            .insert_job(
                &Candidate {
                    external_id: None,
                    title: "Engineer".into(),
                    organization: "Other Org".into(),
                    description: None,
                    source_url: "https://jobs.example.com/2".into(),
                    location: None,
                    origin: None,
                },
                Timestamp::new(1_700_000_001, 0).unwrap(),
            )
            .unwrap();

        let dir = TempDir::new().unwrap();
        let good = ready_item(&dir, id_ok);
        let bad = FinalizeItem {
            id: id_bad,
            note: dir.path().join("absent.md"),
            artifact_override: None,
        };

        let result = run(
            &mut storage,
            &[bad, good],
            &FinalizeOptions::default(),
        )
        .unwrap();

        assert_eq!(result.finalized_count, 1);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.results[0].action, FinalizeAction::Failed);
        assert_eq!(result.results[0].error.as_deref(), Some("note is missing"));
        assert_eq!(result.results[1].action, FinalizeAction::Finalized);
        assert_eq!(
            storage.load_job(id_ok).unwrap().status,
            JobStatus::ArtifactComplete
        );
    }

    #[test]
    fn supplied_run_id_is_stamped_on_the_row() {
        let (mut storage, id) = seeded_storage();
        let dir = TempDir::new().unwrap();
        let item = ready_item(&dir, id);

        let options = FinalizeOptions {
            run_id: Some("run-2024-06-19".into()),
            dry_run: false,
        };
        let result = run(&mut storage, &[item], &options).unwrap();

        assert_eq!(result.run_id, "run-2024-06-19");
        assert_eq!(
            storage.load_job(id).unwrap().run_id.as_deref(),
            Some("run-2024-06-19")
        );
    }

    #[test]
    fn artifact_override_takes_precedence_over_the_note() {
        let (mut storage, id) = seeded_storage();
        let dir = TempDir::new().unwrap();
        let mut item = ready_item(&dir, id);

        // The note's linked artifact vanishes; the override stands in.
        fs::remove_file(dir.path().join("resume.pdf")).unwrap();
        let alternate = dir.path().join("alternate.pdf");
        fs::write(&alternate, b"%PDF-1.7 alt").unwrap();
        item.artifact_override = Some(alternate.clone());

        let result = run(&mut storage, &[item], &FinalizeOptions::default()).unwrap();

        assert_eq!(result.finalized_count, 1);
        assert_eq!(
            storage.load_job(id).unwrap().artifact_path.as_deref(),
            Some(alternate.to_string_lossy().as_ref())
        );
    }

    #[test]
    fn duplicate_ids_reject_the_whole_request() {
        let (mut storage, id) = seeded_storage();
        let dir = TempDir::new().unwrap();
        let item = ready_item(&dir, id);

        let err = run(
            &mut storage,
            &[item.clone(), item],
            &FinalizeOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, FinalizeRequestError::DuplicateId(_)));
        // Rejected before any item was processed.
        assert_eq!(storage.load_job(id).unwrap().status, JobStatus::New);
    }

    #[test]
    fn empty_request_is_rejected() {
        let (mut storage, _) = seeded_storage();
        let err = run(&mut storage, &[], &FinalizeOptions::default()).unwrap_err();
        assert!(matches!(err, FinalizeRequestError::Empty));
    }
}
