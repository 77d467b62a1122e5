//! Collaborator seams: ingestion, triage, and artifact building.
//!
//! These live outside the consistency core. Dossier consumes their
//! outputs (candidate rows, status decisions, artifact files) but never
//! implements them; the traits pin down the shapes the core relies on.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Job, JobStatus};

/// A normalized posting ready for insertion, as produced by an ingestion
/// adapter (scraper, feed reader, manual export).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub title: String,
    pub organization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// Fetches and normalizes candidate postings from somewhere external.
pub trait JobSource {
    fn fetch(&mut self) -> Result<Vec<Candidate>, String>;
}

/// Decides what to do with a job: a target status plus a rationale.
// Implemented by out-of-tree adapters.
#[allow(dead_code)]
pub trait Triage {
    fn classify(&self, job: &Job) -> Result<(JobStatus, String), String>;
}

/// Produces a compiled application artifact inside a workspace directory
/// and returns its path. Dossier only ever checks the result's existence,
/// size, and companion-source content.
// Implemented by out-of-tree adapters.
#[allow(dead_code)]
pub trait ArtifactBuilder {
    fn build(&self, workspace: &Path) -> Result<PathBuf, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use jiff::Timestamp;
    use tempfile::TempDir;

    use crate::model::StatusUpdate;

    fn sample_job(location: Option<&str>) -> Job {
        Job {
            id: 7,
            external_id: None,
            title: "Engineer".into(),
            organization: "Acme Corp".into(),
            description: None,
            source_url: "https://jobs.example.com/7".into(),
            location: location.map(String::from),
            origin: None,
            status: JobStatus::New,
            captured_at: Timestamp::new(1_700_000_000, 0).unwrap(),
            updated_at: Timestamp::new(1_700_000_000, 0).unwrap(),
            artifact_path: None,
            completed_at: None,
            run_id: None,
            attempt_count: 0,
            last_error: None,
        }
    }

    /// Shortlists remote roles, rejects the rest.
    struct RemoteOnly;

    impl Triage for RemoteOnly {
        fn classify(&self, job: &Job) -> Result<(JobStatus, String), String> {
            if job.location.as_deref() == Some("Remote") {
                Ok((JobStatus::Shortlisted, "remote role".into()))
            } else {
                Ok((JobStatus::Rejected, "not remote".into()))
            }
        }
    }

    #[test]
    fn triage_decisions_feed_batch_updates() {
        let triage = RemoteOnly;
        let (status, reason) = triage.classify(&sample_job(Some("Remote"))).unwrap();
        assert_eq!(status, JobStatus::Shortlisted);
        assert!(!reason.is_empty());

        // A decision converts straight into a batch update item.
        let update = StatusUpdate {
            id: 7,
            status: status.as_str().into(),
        };
        assert_eq!(JobStatus::parse(&update.status), Some(JobStatus::Shortlisted));

        let (status, _) = triage.classify(&sample_job(Some("On-site"))).unwrap();
        assert_eq!(status, JobStatus::Rejected);
    }

    /// Drops a fixed byte blob into the workspace.
    struct StubBuilder;

    impl ArtifactBuilder for StubBuilder {
        fn build(&self, workspace: &Path) -> Result<PathBuf, String> {
            let path = workspace.join("resume.pdf");
            fs::write(&path, b"%PDF-1.7 stub").map_err(|e| e.to_string())?;
            Ok(path)
        }
    }

    #[test]
    fn artifact_builder_yields_a_checkable_file() {
        let dir = TempDir::new().unwrap();
        let built = StubBuilder.build(dir.path()).unwrap();

        let meta = fs::metadata(&built).unwrap();
        assert!(meta.is_file());
        assert!(meta.len() > 0);
    }

    #[test]
    fn candidate_wire_shape_omits_absent_fields() {
        let candidate = Candidate {
            external_id: None,
            title: "Engineer".into(),
            organization: "Acme Corp".into(),
            description: None,
            source_url: "https://jobs.example.com/7".into(),
            location: None,
            origin: None,
        };
        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "Engineer",
                "organization": "Acme Corp",
                "source_url": "https://jobs.example.com/7",
            })
        );
    }
}
