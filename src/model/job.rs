//! Job records: the authoritative rows of the tracker.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a job record in the store.
///
/// The store is the single source of truth for this value. Tracker notes
/// carry their own [`super::NoteStatus`] vocabulary; the two are never
/// compared or coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Freshly ingested, not yet triaged.
    New,
    /// Triaged as worth pursuing.
    Shortlisted,
    /// Looked at in detail; eligible for finalization.
    Reviewed,
    /// Triaged out.
    Rejected,
    /// Application artifact built and committed; awaiting submission.
    ArtifactComplete,
    /// Application sent.
    Submitted,
}

impl JobStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::New,
        Self::Shortlisted,
        Self::Reviewed,
        Self::Rejected,
        Self::ArtifactComplete,
        Self::Submitted,
    ];

    /// The store's string form of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Shortlisted => "shortlisted",
            Self::Reviewed => "reviewed",
            Self::Rejected => "rejected",
            Self::ArtifactComplete => "artifact_complete",
            Self::Submitted => "submitted",
        }
    }

    /// Parses the exact store string form. No trimming, no aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "shortlisted" => Some(Self::Shortlisted),
            "reviewed" => Some(Self::Reviewed),
            "rejected" => Some(Self::Rejected),
            "artifact_complete" => Some(Self::ArtifactComplete),
            "submitted" => Some(Self::Submitted),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job record as stored.
///
/// `id` is assigned by the store and immutable. `updated_at` is refreshed
/// on every write and never moves backwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub external_id: Option<String>,
    pub title: String,
    pub organization: String,
    pub description: Option<String>,
    pub source_url: String,
    pub location: Option<String>,
    pub origin: Option<String>,
    pub status: JobStatus,
    pub captured_at: Timestamp,
    pub updated_at: Timestamp,

    // Completion audit trail, written only by finalization.
    pub artifact_path: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub run_id: Option<String>,
    pub attempt_count: i64,
    pub last_error: Option<String>,
}
