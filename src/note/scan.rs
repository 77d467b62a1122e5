//! Legacy note lookup: find an existing note by its source link.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

/// Scans the notes directory for a note whose `source` line matches
/// `source_url`.
///
/// Earlier tooling derived filenames differently, so a job's note may
/// exist under a name the planner would not produce today. Matching on
/// the source link keeps one job from growing two notes. The match is a
/// plain line comparison, deliberately looser than a full parse, so
/// legacy notes with incomplete metadata still count.
///
/// Unreadable files are silently skipped. The walk is sorted, so the
/// first match is stable across runs.
pub fn find_by_source(notes_dir: &Path, source_url: &str) -> Option<PathBuf> {
    if !notes_dir.is_dir() {
        return None;
    }

    let mut builder = WalkBuilder::new(notes_dir);
    builder.sort_by_file_name(Ord::cmp);

    for entry in builder.build().flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };
        if content
            .lines()
            .any(|line| line.strip_prefix("- source: ") == Some(source_url))
        {
            return Some(path.to_path_buf());
        }
    }
    None
}
