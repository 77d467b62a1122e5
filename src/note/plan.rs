//! Note identity planning: slug, filename, and workspace paths.
//!
//! Pure functions, no I/O. The same job always plans to the same
//! identity, which is what makes note materialization idempotent.

use std::path::{Path, PathBuf};

use jiff::tz::TimeZone;

use crate::model::Job;

/// Deterministic identity for one job's note and workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotePlan {
    pub slug: String,
    pub filename: String,
    /// The note file itself, under the notes directory.
    pub path: PathBuf,
    /// The job's workspace directory, created lazily.
    pub workspace: PathBuf,
    /// The compiled application artifact inside the workspace.
    pub artifact: PathBuf,
    /// The artifact's editable companion source.
    pub companion: PathBuf,
}

/// Plans the note identity for a job.
///
/// The filename leads with the UTC capture date so the notes directory
/// sorts chronologically.
pub fn plan(job: &Job, notes_dir: &Path, workspace_root: &Path) -> NotePlan {
    let slug = slugify(&job.organization, job.id);
    let date = job.captured_at.to_zoned(TimeZone::UTC).date();
    let filename = format!("{date}-{slug}.md");
    let workspace = workspace_root.join(&slug);
    NotePlan {
        path: notes_dir.join(&filename),
        artifact: workspace.join("resume.pdf"),
        companion: workspace.join("resume.md"),
        slug,
        filename,
        workspace,
    }
}

/// Derives a slug from an organization name and the job's store id.
///
/// Lowercases, maps every non-alphanumeric run to a single `-`, and
/// appends the id. The id suffix is load-bearing: two jobs at the same
/// organization must not collide, and the id is the only part of a job's
/// identity that is both unique and immutable.
pub fn slugify(organization: &str, id: i64) -> String {
    let mut normalized = String::with_capacity(organization.len());
    let mut prev_sep = true;
    for ch in organization.chars() {
        if ch.is_alphanumeric() {
            normalized.extend(ch.to_lowercase());
            prev_sep = false;
        } else if !prev_sep {
            normalized.push('-');
            prev_sep = true;
        }
    }
    while normalized.ends_with('-') {
        normalized.pop();
    }
    if normalized.is_empty() {
        normalized.push_str("org");
    }
    format!("{normalized}-{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;

    use crate::model::JobStatus;

    fn sample_job(id: i64, organization: &str) -> Job {
        Job {
            id,
            external_id: None,
            title: "Engineer".into(),
            organization: organization.into(),
            description: None,
            source_url: format!("https://jobs.example.com/{id}"),
            location: None,
            origin: None,
            status: JobStatus::Shortlisted,
            captured_at: "2024-06-19T15:22:45Z".parse::<Timestamp>().unwrap(),
            updated_at: "2024-06-19T15:22:45Z".parse::<Timestamp>().unwrap(),
            artifact_path: None,
            completed_at: None,
            run_id: None,
            attempt_count: 0,
            last_error: None,
        }
    }

    #[test]
    fn slug_normalizes_and_appends_id() {
        assert_eq!(slugify("Acme Corp", 7), "acme-corp-7");
        assert_eq!(slugify("  Tilde & Söhne GmbH ", 12), "tilde-söhne-gmbh-12");
        assert_eq!(slugify("!!!", 3), "org-3");
    }

    #[test]
    fn same_organization_different_ids_never_collide() {
        assert_ne!(slugify("Acme Corp", 1), slugify("Acme Corp", 2));
    }

    #[test]
    fn plan_is_deterministic() {
        let job = sample_job(7, "Acme Corp");
        let a = plan(&job, Path::new("notes"), Path::new("work"));
        let b = plan(&job, Path::new("notes"), Path::new("work"));
        assert_eq!(a, b);
    }

    #[test]
    fn filename_leads_with_utc_capture_date() {
        let job = sample_job(7, "Acme Corp");
        let planned = plan(&job, Path::new("notes"), Path::new("work"));
        assert_eq!(planned.filename, "2024-06-19-acme-corp-7.md");
        assert_eq!(planned.path, Path::new("notes/2024-06-19-acme-corp-7.md"));
        assert_eq!(planned.workspace, Path::new("work/acme-corp-7"));
        assert_eq!(planned.artifact, Path::new("work/acme-corp-7/resume.pdf"));
        assert_eq!(planned.companion, Path::new("work/acme-corp-7/resume.md"));
    }
}
