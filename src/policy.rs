//! Transition policy for tracker-note status values.
//!
//! The note vocabulary forms a small state machine: two guarded
//! happy-path edges, two absorbing terminal states reachable from
//! anywhere, and everything else off-policy. Edge classification is a
//! pure function; the artifact guardrail is the only I/O, and it cannot
//! be bypassed. Nothing in this module writes: callers apply the status
//! change only when the decision says to proceed.

use std::fs;
use std::path::Path;

use crate::model::NoteStatus;

/// Markers that flag unfinished content in a companion source.
pub const PLACEHOLDER_MARKERS: [&str; 4] = ["TODO", "TBD", "FIXME", "{{"];

/// Pure classification of an edge in the note state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// `target == current`; always a successful no-op.
    Identity,
    /// A guarded happy-path edge.
    Forward,
    /// Into an absorbing terminal state; permitted from anywhere.
    Terminal,
    /// Any other edge; blocked unless explicitly bypassed.
    OffPolicy,
}

/// Classifies `current -> target` without touching the filesystem.
pub fn classify(current: NoteStatus, target: NoteStatus) -> Edge {
    if current == target {
        return Edge::Identity;
    }
    match (current, target) {
        (_, NoteStatus::Rejected | NoteStatus::Ghosted) => Edge::Terminal,
        (NoteStatus::Reviewed, NoteStatus::ArtifactWritten)
        | (NoteStatus::ArtifactWritten, NoteStatus::Submitted) => Edge::Forward,
        _ => Edge::OffPolicy,
    }
}

/// A failed artifact-readiness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardFailure {
    MissingArtifact,
    EmptyArtifact,
    MissingCompanion,
    PlaceholdersFound(Vec<String>),
}

impl GuardFailure {
    /// Machine-readable reason string for results and diagnostics.
    pub fn reason(&self) -> String {
        match self {
            Self::MissingArtifact => "artifact is missing".into(),
            Self::EmptyArtifact => "artifact is empty".into(),
            Self::MissingCompanion => "companion source is missing".into(),
            Self::PlaceholdersFound(markers) => {
                format!("unfilled placeholders in companion source: {}", markers.join(", "))
            }
        }
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blocked {
    OffPolicy {
        current: NoteStatus,
        target: NoteStatus,
    },
    Guardrail(GuardFailure),
}

impl Blocked {
    pub fn reason(&self) -> String {
        match self {
            Self::OffPolicy { current, target } => {
                format!("transition not allowed: {current} -> {target}")
            }
            Self::Guardrail(failure) => failure.reason(),
        }
    }
}

/// Outcome of evaluating a requested transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Identity transition; nothing to write.
    NoOp,
    /// Apply the transition. `warning` is set when an off-policy edge
    /// was permitted by explicit bypass.
    Proceed { warning: Option<String> },
    /// Refused; no write may happen.
    Blocked(Blocked),
}

/// Evaluates `current -> target` against the policy.
///
/// The artifact guardrail runs on every non-identity edge into
/// `artifact_written`, bypass or not: the bypass flag widens which edges
/// are reachable, never the quality bar.
pub fn evaluate(
    current: NoteStatus,
    target: NoteStatus,
    bypass: bool,
    artifact: &Path,
    companion: &Path,
) -> Decision {
    let edge = classify(current, target);
    if edge == Edge::Identity {
        return Decision::NoOp;
    }
    if edge == Edge::OffPolicy && !bypass {
        return Decision::Blocked(Blocked::OffPolicy { current, target });
    }
    if target == NoteStatus::ArtifactWritten {
        if let Err(failure) = check_artifact_ready(artifact, companion) {
            return Decision::Blocked(Blocked::Guardrail(failure));
        }
    }
    let warning = (edge == Edge::OffPolicy).then(|| format!("policy bypass: {current} -> {target}"));
    Decision::Proceed { warning }
}

/// Checks that the artifact and its companion source meet the quality
/// bar: artifact present and non-empty, companion present and free of
/// placeholder markers.
pub fn check_artifact_ready(artifact: &Path, companion: &Path) -> Result<(), GuardFailure> {
    let Ok(meta) = fs::metadata(artifact) else {
        return Err(GuardFailure::MissingArtifact);
    };
    if !meta.is_file() {
        return Err(GuardFailure::MissingArtifact);
    }
    if meta.len() == 0 {
        return Err(GuardFailure::EmptyArtifact);
    }

    let Ok(bytes) = fs::read(companion) else {
        return Err(GuardFailure::MissingCompanion);
    };
    let content = String::from_utf8_lossy(&bytes);
    let found: Vec<String> = PLACEHOLDER_MARKERS
        .iter()
        .filter(|marker| content.contains(**marker))
        .map(|marker| (*marker).to_string())
        .collect();
    if !found.is_empty() {
        return Err(GuardFailure::PlaceholdersFound(found));
    }
    Ok(())
}
