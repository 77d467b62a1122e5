//! Note rendering and metadata parsing.
//!
//! The format is a line-oriented metadata block (`- key: value`) under a
//! title heading, followed by a `## Notes` section that must be present
//! verbatim: downstream tooling locates free text by that heading.

use std::path::PathBuf;

use crate::model::{Job, NoteMeta, NoteStatus};

use super::plan::NotePlan;
use super::{NoteError, Result};

/// Renders a fresh tracker note for a job.
///
/// Deterministic: the same job and plan always render byte-identical
/// content. New notes start at `reviewed`, the first milestone of the
/// note vocabulary.
pub fn render(job: &Job, plan: &NotePlan) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {} at {}\n\n", job.title, job.organization));
    out.push_str(&format!("- source: {}\n", job.source_url));
    out.push_str(&format!("- organization: {}\n", job.organization));
    out.push_str(&format!("- position: {}\n", job.title));
    out.push_str(&format!("- status: {}\n", NoteStatus::Reviewed));
    out.push_str(&format!("- resume: {}\n", plan.artifact.display()));
    out.push_str(&format!("- resume-source: {}\n", plan.companion.display()));
    out.push_str("\n## Notes\n");
    if let Some(description) = &job.description {
        out.push('\n');
        out.push_str(description);
        if !description.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Parses the metadata block of a note.
pub fn parse(content: &str) -> Result<NoteMeta> {
    let mut source = None;
    let mut organization = None;
    let mut position = None;
    let mut status_raw: Option<&str> = None;
    let mut resume = None;
    let mut resume_source = None;

    for line in content.lines() {
        let Some(rest) = line.strip_prefix("- ") else {
            continue;
        };
        let Some((key, value)) = rest.split_once(": ") else {
            continue;
        };
        match key {
            "source" => source = Some(value.to_string()),
            "organization" => organization = Some(value.to_string()),
            "position" => position = Some(value.to_string()),
            "status" => status_raw = Some(value),
            "resume" => resume = Some(PathBuf::from(value)),
            "resume-source" => resume_source = Some(PathBuf::from(value)),
            _ => {}
        }
    }

    if !content.lines().any(|l| l.trim_end() == "## Notes") {
        return Err(NoteError::MissingNotesSection);
    }

    let status_raw = status_raw.ok_or(NoteError::MissingStatusLine)?;
    let status = NoteStatus::parse(status_raw)
        .ok_or_else(|| NoteError::InvalidStatus(status_raw.to_string()))?;

    Ok(NoteMeta {
        source: source.ok_or(NoteError::MissingField("source"))?,
        organization: organization.ok_or(NoteError::MissingField("organization"))?,
        position: position.ok_or(NoteError::MissingField("position"))?,
        status,
        resume,
        resume_source,
    })
}

const STATUS_PREFIX: &str = "- status: ";

/// Replaces the value of the first status line, leaving every other byte
/// of the note untouched.
pub fn set_status(content: &str, status: NoteStatus) -> Result<String> {
    let line_start = if content.starts_with(STATUS_PREFIX) {
        0
    } else {
        content
            .find(&format!("\n{STATUS_PREFIX}"))
            .map(|i| i + 1)
            .ok_or(NoteError::MissingStatusLine)?
    };
    let value_start = line_start + STATUS_PREFIX.len();
    let value_end = content[value_start..]
        .find('\n')
        .map_or(content.len(), |i| value_start + i);

    let mut updated = String::with_capacity(content.len() + status.as_str().len());
    updated.push_str(&content[..value_start]);
    updated.push_str(status.as_str());
    updated.push_str(&content[value_end..]);
    Ok(updated)
}
