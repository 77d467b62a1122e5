//! Tracker-note types: the human-facing projection of a job.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Milestone status recorded in a tracker note.
///
/// This vocabulary belongs to the notes, not the store. It tracks the
/// human-facing application pipeline, which outlives the store's own
/// lifecycle (interviews, offers, and silence all happen after the store
/// has said its piece).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    /// The posting has been read and a note exists.
    Reviewed,
    /// A tailored application artifact exists for this posting.
    ArtifactWritten,
    /// The application has been sent.
    Submitted,
    /// An interview is scheduled or in progress.
    Interview,
    /// An offer was received.
    Offer,
    /// Turned down, by either side.
    Rejected,
    /// No response; abandoned.
    Ghosted,
}

impl NoteStatus {
    /// The note's string form of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reviewed => "reviewed",
            Self::ArtifactWritten => "artifact_written",
            Self::Submitted => "submitted",
            Self::Interview => "interview",
            Self::Offer => "offer",
            Self::Rejected => "rejected",
            Self::Ghosted => "ghosted",
        }
    }

    /// Parses the exact note string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reviewed" => Some(Self::Reviewed),
            "artifact_written" => Some(Self::ArtifactWritten),
            "submitted" => Some(Self::Submitted),
            "interview" => Some(Self::Interview),
            "offer" => Some(Self::Offer),
            "rejected" => Some(Self::Rejected),
            "ghosted" => Some(Self::Ghosted),
            _ => None,
        }
    }
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata parsed from a tracker note's fixed key block.
///
/// The note references its job through `source` (the posting URL); the
/// store holds no back-reference to the note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteMeta {
    pub source: String,
    pub organization: String,
    pub position: String,
    pub status: NoteStatus,
    /// Path of the compiled application artifact, if linked.
    pub resume: Option<PathBuf>,
    /// Path of the artifact's editable source, if linked.
    pub resume_source: Option<PathBuf>,
}
