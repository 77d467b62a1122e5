//! Tracker notes: the human-facing projection of job state.
//!
//! A note is a markdown file with a fixed metadata block and free-text
//! sections. Notes are derived, never authoritative: the store owns the
//! job lifecycle, the note mirrors milestone state for a human reader.
//!
//! - `plan` — pure identity: slug, filename, workspace paths
//! - `render` — template rendering and metadata parsing
//! - `write` — atomic temp-file-and-rename materialization
//! - `scan` — legacy lookup by source link

mod plan;
mod render;
mod scan;
mod write;

pub use plan::{NotePlan, plan, slugify};
pub use render::{parse, render, set_status};
pub use scan::find_by_source;
pub use write::{WriteAction, materialize, write_atomic};

use std::path::{Path, PathBuf};
use std::{fs, io};

use crate::model::{NoteMeta, NoteStatus};

/// Errors that can occur reading, parsing, or writing notes.
#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("note not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("note is missing required field: {0}")]
    MissingField(&'static str),

    #[error("note has an invalid status value: {0}")]
    InvalidStatus(String),

    #[error("note has no status line")]
    MissingStatusLine,

    #[error("note has no `## Notes` section")]
    MissingNotesSection,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, NoteError>;

/// Loads and parses a tracker note's metadata block.
pub fn load(path: &Path) -> Result<NoteMeta> {
    let content = read(path)?;
    render::parse(&content)
}

/// Rewrites only the note's status line, atomically.
///
/// Every other byte of the file is preserved as-is, so a concurrent
/// reader sees either the fully-old or fully-new note.
pub fn sync_status(path: &Path, status: NoteStatus) -> Result<()> {
    let content = read(path)?;
    let updated = render::set_status(&content, status)?;
    write::write_atomic(path, &updated)
}

fn read(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(NoteError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
