//! Atomic note materialization.
//!
//! A note is rendered fully in memory, written to a uniquely named temp
//! file in the target's own directory, synced, and renamed onto the
//! target. A reader never sees a partial note, and a failure before the
//! rename leaves the prior target byte-for-byte intact.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use super::Result;

/// What [`materialize`] did. Failures travel on the error channel and
/// are reported as `failed` by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Created,
    SkippedExists,
    Overwritten,
}

impl WriteAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::SkippedExists => "skipped_exists",
            Self::Overwritten => "overwritten",
        }
    }
}

/// Materializes `content` at `path`.
///
/// Decision table: missing target is created; an existing target is
/// skipped unless `force`, in which case it is overwritten. All writes
/// go through [`write_atomic`].
pub fn materialize(path: &Path, content: &str, force: bool) -> Result<WriteAction> {
    let exists = path.exists();
    if exists && !force {
        return Ok(WriteAction::SkippedExists);
    }
    write_atomic(path, content)?;
    Ok(if exists {
        WriteAction::Overwritten
    } else {
        WriteAction::Created
    })
}

/// Writes `content` to `path` via temp-file-and-rename.
///
/// The temp file gets a fresh random name on every call; a predictable
/// name could be pre-planted as a symlink and clobber whatever it points
/// at. It lives in the target's directory so the rename stays on one
/// filesystem. On any failure before the rename the temp file is removed
/// and the target is left unchanged.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let Some(file_name) = path.file_name() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "target path has no file name",
        )
        .into());
    };
    let tmp = parent.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        Uuid::new_v4().simple()
    ));

    match write_and_rename(&tmp, path, content) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e.into())
        }
    }
}

fn write_and_rename(tmp: &Path, target: &Path, content: &str) -> io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    fs::rename(tmp, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn creates_a_missing_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");

        let action = materialize(&path, "content\n", false).unwrap();

        assert_eq!(action, WriteAction::Created);
        assert_eq!(fs::read_to_string(&path).unwrap(), "content\n");
    }

    #[test]
    fn skips_an_existing_target_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "original\n").unwrap();

        let action = materialize(&path, "replacement\n", false).unwrap();

        assert_eq!(action, WriteAction::SkippedExists);
        assert_eq!(fs::read_to_string(&path).unwrap(), "original\n");
    }

    #[test]
    fn overwrites_an_existing_target_with_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "original\n").unwrap();

        let action = materialize(&path, "replacement\n", true).unwrap();

        assert_eq!(action, WriteAction::Overwritten);
        assert_eq!(fs::read_to_string(&path).unwrap(), "replacement\n");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("note.md");

        materialize(&path, "content\n", false).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "content\n");
    }

    #[test]
    fn failed_rename_cleans_up_and_preserves_the_target() {
        let dir = TempDir::new().unwrap();
        // A directory at the target path makes the final rename fail
        // after the temp file was fully written.
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        let inner = target.join("keep.txt");
        fs::write(&inner, "keep\n").unwrap();

        let err = write_atomic(&target, "new content\n").unwrap_err();
        assert!(matches!(err, crate::note::NoteError::Io(_)));

        // Target untouched, no temp debris left behind.
        assert_eq!(fs::read_to_string(&inner).unwrap(), "keep\n");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn temp_names_are_unique_per_write() {
        // Two writes to the same target must never collide on the temp
        // name; exercised indirectly by writing twice in a row.
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        write_atomic(&path, "one\n").unwrap();
        write_atomic(&path, "two\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two\n");
    }
}
