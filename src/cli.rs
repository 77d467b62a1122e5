//! CLI interface for Dossier.
//!
//! Non-interactive subcommands: arguments in, structured output out.
//! Machine-readable JSON goes to stdout; human-readable summaries go to
//! stderr. Batch-shaped commands (`update`, `finalize`) take a JSON
//! request file and print either the structured result or a top-level
//! `{error: ...}` envelope. The two are distinguishable by shape alone,
//! so a caller never has to parse message text.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use jiff::Timestamp;
use serde::Serialize;

use crate::api::ApiError;
use crate::config::Config;
use crate::cursor::Cursor;
use crate::finalize::{self, FinalizeOptions};
use crate::model::{
    BatchUpdateRequest, Candidate, FinalizeRequest, Job, JobSource, JobStatus, NoteStatus,
};
use crate::note::{self, WriteAction};
use crate::policy;
use crate::store::{self, Storage};

/// Dossier — keep the job hunt on the record.
#[derive(Debug, Parser)]
#[command(name = "dossier", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Job store database file (default: ~/.dossier/jobs.db).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Tracker notes directory (default: ~/.dossier/notes).
    #[arg(long, global = true)]
    notes_dir: Option<PathBuf>,

    /// Per-job workspace root (default: ~/.dossier/work).
    #[arg(long, global = true)]
    workspace_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: from posting to submitted application
  1. dossier ingest postings.json
     -> inserts normalized postings as status `new`, skipping known URLs
  2. dossier queue --status new
     -> page through the triage queue (pass --cursor to continue)
  3. dossier update decisions.json
     -> apply triage decisions as one atomic batch
  4. dossier note new --status shortlisted
     -> materialize tracker notes and workspaces
  5. dossier finalize items.json --dry-run
     -> predict, then re-run without --dry-run to commit

Request files:
  decisions.json  {"updates": [{"id": 7, "status": "shortlisted"}]}
  items.json      {"items": [{"id": 7, "note": "notes/2024-06-19-acme-corp-7.md"}]}"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Insert normalized candidate postings from a JSON file.
    ///
    /// Postings whose source URL is already stored are skipped, so
    /// re-running the same file is safe.
    Ingest {
        /// JSON array of candidate postings.
        file: PathBuf,
    },

    /// Page through jobs in a given status, newest first.
    ///
    /// Pure read, no side effects, repeatable. Prints an opaque
    /// `next_cursor` while more rows remain; pass it back to continue.
    Queue {
        /// Status to list.
        #[arg(long)]
        status: String,

        /// Page size.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Opaque cursor from the previous page.
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Apply a batch of status transitions as one atomic transaction.
    Update {
        /// JSON request file with an `updates` array.
        file: PathBuf,
    },

    /// Manage tracker notes.
    Note {
        #[command(subcommand)]
        command: NoteCommand,
    },

    /// Commit completed artifacts: store first, then note, with
    /// compensation if the note sync fails.
    Finalize {
        /// JSON request file with an `items` array.
        file: PathBuf,

        /// Shared run id (generated when omitted).
        #[arg(long)]
        run_id: Option<String>,

        /// Predict outcomes without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Per-status job counts for the whole store.
    Status,
}

#[derive(Debug, Subcommand)]
pub enum NoteCommand {
    /// Materialize tracker notes for jobs in a status.
    ///
    /// Existing notes are left alone unless --force; a note found under
    /// a legacy filename for the same posting also counts as existing.
    New {
        /// Which jobs to cover.
        #[arg(long, default_value = "shortlisted")]
        status: String,

        /// How many jobs to cover, newest first.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Overwrite an existing note at the planned path.
        #[arg(long)]
        force: bool,
    },

    /// Move a note to a new milestone status.
    ///
    /// Forward edges are `reviewed -> artifact_written -> submitted`;
    /// `rejected` and `ghosted` are reachable from anywhere. Anything
    /// else needs --override. The artifact quality check on
    /// `-> artifact_written` can never be overridden.
    Status {
        /// The note file.
        note: PathBuf,

        /// Target status.
        target: String,

        /// Permit an off-policy transition (flagged in the output).
        #[arg(long = "override")]
        bypass: bool,
    },
}

/// Largest queue page served in one call.
const MAX_PAGE: usize = 200;

/// Run the CLI, returning an error message on failure.
pub fn run(config: &Config) -> Result<(), String> {
    let cli = Cli::parse();
    let paths = ResolvedPaths::new(config, &cli)?;

    match cli.command {
        Command::Ingest { file } => cmd_ingest(&paths, &file),
        Command::Queue {
            status,
            limit,
            cursor,
        } => cmd_queue(&paths, &status, limit, cursor.as_deref()),
        Command::Update { file } => cmd_update(&paths, &file),
        Command::Note { command } => match command {
            NoteCommand::New {
                status,
                limit,
                force,
            } => cmd_note_new(&paths, &status, limit, force),
            NoteCommand::Status {
                note,
                target,
                bypass,
            } => cmd_note_status(&note, &target, bypass),
        },
        Command::Finalize {
            file,
            run_id,
            dry_run,
        } => cmd_finalize(&paths, &file, run_id, dry_run),
        Command::Status => cmd_status(&paths),
    }
}

/// Effective locations after flag/config/default resolution.
///
/// The database is kept as flag-vs-fallback because batch request files
/// may carry their own `db_path`; precedence is flag, then request
/// file, then config, then `~/.dossier/`.
struct ResolvedPaths {
    db_flag: Option<PathBuf>,
    db_fallback: PathBuf,
    notes_dir: PathBuf,
    workspace_root: PathBuf,
}

impl ResolvedPaths {
    fn new(config: &Config, cli: &Cli) -> Result<Self, String> {
        const NO_HOME: &str = "could not determine home directory";
        Ok(Self {
            db_flag: cli.db.clone(),
            db_fallback: config
                .db_path
                .clone()
                .or_else(Storage::default_path)
                .ok_or(NO_HOME)?,
            notes_dir: cli
                .notes_dir
                .clone()
                .or_else(|| config.notes_dir.clone())
                .or_else(Config::default_notes_dir)
                .ok_or(NO_HOME)?,
            workspace_root: cli
                .workspace_root
                .clone()
                .or_else(|| config.workspace_root.clone())
                .or_else(Config::default_workspace_root)
                .ok_or(NO_HOME)?,
        })
    }

    fn open_storage(&self, request_db: Option<&Path>) -> Result<Storage, String> {
        let path = self
            .db_flag
            .as_deref()
            .or(request_db)
            .unwrap_or(&self.db_fallback);
        Storage::open(path).map_err(|e| format!("failed to open job store: {e}"))
    }
}

// ── Ingest ──

/// A [`JobSource`] reading pre-normalized candidates from a JSON file.
/// The fetch-and-normalize half of ingestion lives outside this tool.
struct JsonFileSource {
    path: PathBuf,
}

impl JobSource for JsonFileSource {
    fn fetch(&mut self) -> Result<Vec<Candidate>, String> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| format!("failed to read {}: {e}", self.path.display()))?;
        serde_json::from_str(&contents).map_err(|e| format!("invalid candidates file: {e}"))
    }
}

#[derive(Serialize)]
struct IngestItem {
    source_url: String,
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
}

#[derive(Serialize)]
struct IngestResponse {
    inserted_count: usize,
    skipped_count: usize,
    results: Vec<IngestItem>,
}

fn cmd_ingest(paths: &ResolvedPaths, file: &Path) -> Result<(), String> {
    let mut source = JsonFileSource {
        path: file.to_path_buf(),
    };
    let candidates = source.fetch()?;

    let storage = paths.open_storage(None)?;
    let captured_at = Timestamp::now();

    let mut results = Vec::with_capacity(candidates.len());
    let mut inserted_count = 0;
    for candidate in &candidates {
        let known = storage
            .source_url_exists(&candidate.source_url)
            .map_err(|e| format!("failed to check for duplicates: {e}"))?;
        if known {
            results.push(IngestItem {
                source_url: candidate.source_url.clone(),
                action: "skipped_duplicate",
                id: None,
            });
            continue;
        }
        let id = storage
            .insert_job(candidate, captured_at)
            .map_err(|e| format!("failed to insert job: {e}"))?;
        inserted_count += 1;
        results.push(IngestItem {
            source_url: candidate.source_url.clone(),
            action: "inserted",
            id: Some(id),
        });
    }

    let response = IngestResponse {
        inserted_count,
        skipped_count: results.len() - inserted_count,
        results,
    };
    print_json(&response)?;
    eprintln!(
        "Ingested {} posting(s), skipped {} duplicate(s)",
        response.inserted_count, response.skipped_count
    );
    Ok(())
}

// ── Queue ──

#[derive(Serialize)]
struct QueueResponse {
    jobs: Vec<Job>,
    has_more: bool,
    next_cursor: Option<String>,
}

fn cmd_queue(
    paths: &ResolvedPaths,
    status: &str,
    limit: usize,
    cursor: Option<&str>,
) -> Result<(), String> {
    let status = parse_job_status(status)?;
    if limit == 0 || limit > MAX_PAGE {
        return fail(ApiError::validation(format!("limit must be between 1 and {MAX_PAGE}")));
    }
    let cursor = match cursor {
        Some(token) => match Cursor::decode(token) {
            Ok(c) => Some(c),
            Err(_) => return fail(ApiError::validation("malformed cursor token")),
        },
        None => None,
    };

    let storage = paths.open_storage(None)?;
    let page = match storage.read_queue(status, limit, cursor) {
        Ok(page) => page,
        Err(e) => return fail(ApiError::from(&e)),
    };

    let next_cursor = match page.next_cursor {
        Some(c) => Some(c.encode().map_err(|e| format!("failed to encode cursor: {e}"))?),
        None => None,
    };
    print_json(&QueueResponse {
        has_more: page.has_more,
        next_cursor,
        jobs: page.jobs,
    })
}

// ── Update ──

fn cmd_update(paths: &ResolvedPaths, file: &Path) -> Result<(), String> {
    let request: BatchUpdateRequest = read_request(file)?;

    // Shape problems reject the request before the store is opened.
    if let Err(e) = store::validate_batch_request(&request.updates) {
        return fail(ApiError::from(&e));
    }

    let mut storage = paths.open_storage(request.db_path.as_deref())?;
    match storage.apply_status_batch(&request.updates) {
        Ok(result) => {
            print_json(&result)?;
            eprintln!(
                "Updated {} job(s), {} failed",
                result.updated_count, result.failed_count
            );
            Ok(())
        }
        Err(e) => fail(ApiError::from(&e)),
    }
}

// ── Notes ──

#[derive(Serialize)]
struct NoteNewItem {
    id: i64,
    note: PathBuf,
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct NoteNewResponse {
    results: Vec<NoteNewItem>,
}

fn cmd_note_new(
    paths: &ResolvedPaths,
    status: &str,
    limit: usize,
    force: bool,
) -> Result<(), String> {
    let status = parse_job_status(status)?;
    let storage = paths.open_storage(None)?;
    let page = match storage.read_queue(status, limit, None) {
        Ok(page) => page,
        Err(e) => return fail(ApiError::from(&e)),
    };

    let mut results = Vec::with_capacity(page.jobs.len());
    for job in &page.jobs {
        let planned = note::plan(job, &paths.notes_dir, &paths.workspace_root);

        // A note under a legacy filename still belongs to this posting;
        // creating a second one would fork its history.
        if let Some(existing) = note::find_by_source(&paths.notes_dir, &job.source_url)
            && existing != planned.path
        {
            results.push(NoteNewItem {
                id: job.id,
                note: existing,
                action: "skipped_exists",
                error: None,
            });
            continue;
        }

        let item = match materialize_note(job, &planned, force) {
            Ok(action) => NoteNewItem {
                id: job.id,
                note: planned.path,
                action: action.as_str(),
                error: None,
            },
            // One bad note must not stop the rest of the batch.
            Err(e) => NoteNewItem {
                id: job.id,
                note: planned.path,
                action: "failed",
                error: Some(e),
            },
        };
        results.push(item);
    }

    let created = results.iter().filter(|r| r.action == "created").count();
    let skipped = results
        .iter()
        .filter(|r| r.action == "skipped_exists")
        .count();
    print_json(&NoteNewResponse { results })?;
    eprintln!("Notes: {created} created, {skipped} already present");
    Ok(())
}

fn materialize_note(
    job: &Job,
    planned: &note::NotePlan,
    force: bool,
) -> Result<WriteAction, String> {
    fs::create_dir_all(&planned.workspace)
        .map_err(|_| "failed to create workspace directory".to_string())?;
    let content = note::render(job, planned);
    note::materialize(&planned.path, &content, force).map_err(|_| "note write failed".to_string())
}

#[derive(Serialize)]
struct NoteStatusResponse {
    note: PathBuf,
    from: NoteStatus,
    to: NoteStatus,
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

fn cmd_note_status(note_path: &Path, target: &str, bypass: bool) -> Result<(), String> {
    let Some(target) = NoteStatus::parse(target) else {
        return fail(ApiError::validation(format!("unknown note status: {target}")));
    };
    let meta = match note::load(note_path) {
        Ok(meta) => meta,
        Err(e) => return fail(ApiError::validation(e.to_string())),
    };

    // The guard edge needs linked artifact paths to check; absent links
    // read as a missing artifact rather than a free pass.
    let artifact = meta.resume.clone().unwrap_or_else(|| PathBuf::from(""));
    let companion = meta
        .resume_source
        .clone()
        .unwrap_or_else(|| PathBuf::from(""));

    let decision = policy::evaluate(meta.status, target, bypass, &artifact, &companion);
    let response = match decision {
        policy::Decision::NoOp => NoteStatusResponse {
            note: note_path.to_path_buf(),
            from: meta.status,
            to: target,
            result: "noop",
            warning: None,
            reason: None,
        },
        policy::Decision::Proceed { warning } => {
            if let Err(e) = note::sync_status(note_path, target) {
                return fail(ApiError::validation(e.to_string()));
            }
            NoteStatusResponse {
                note: note_path.to_path_buf(),
                from: meta.status,
                to: target,
                result: "applied",
                warning,
                reason: None,
            }
        }
        policy::Decision::Blocked(blocked) => NoteStatusResponse {
            note: note_path.to_path_buf(),
            from: meta.status,
            to: target,
            result: "blocked",
            warning: None,
            reason: Some(blocked.reason()),
        },
    };

    print_json(&response)?;
    match response.result {
        "applied" => eprintln!("{} -> {}", response.from, response.to),
        "noop" => eprintln!("already {}", response.to),
        _ => eprintln!(
            "blocked: {}",
            response.reason.as_deref().unwrap_or("policy violation")
        ),
    }
    Ok(())
}

// ── Finalize ──

fn cmd_finalize(
    paths: &ResolvedPaths,
    file: &Path,
    run_id: Option<String>,
    dry_run: bool,
) -> Result<(), String> {
    let request: FinalizeRequest = read_request(file)?;

    if let Err(e) = finalize::validate_finalize_request(&request.items) {
        return fail(ApiError::from(&e));
    }

    let options = FinalizeOptions {
        // The flag wins over the request file.
        run_id: run_id.or(request.run_id),
        dry_run: dry_run || request.dry_run,
    };

    let mut storage = paths.open_storage(request.db_path.as_deref())?;
    match finalize::run(&mut storage, &request.items, &options) {
        Ok(result) => {
            print_json(&result)?;
            let verb = if result.dry_run { "Would finalize" } else { "Finalized" };
            eprintln!(
                "{verb} {} job(s), {} failed [run {}]",
                result.finalized_count, result.failed_count, result.run_id
            );
            Ok(())
        }
        Err(e) => fail(ApiError::from(&e)),
    }
}

// ── Status counts ──

#[derive(Serialize)]
struct StatusCount {
    status: JobStatus,
    count: i64,
}

#[derive(Serialize)]
struct StatusResponse {
    counts: Vec<StatusCount>,
}

fn cmd_status(paths: &ResolvedPaths) -> Result<(), String> {
    let storage = paths.open_storage(None)?;
    let counts = match storage.status_counts() {
        Ok(counts) => counts,
        Err(e) => return fail(ApiError::from(&e)),
    };
    print_json(&StatusResponse {
        counts: counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
    })
}

// ── Shared helpers ──

fn parse_job_status(s: &str) -> Result<JobStatus, String> {
    JobStatus::parse(s).ok_or_else(|| {
        let valid: Vec<&str> = JobStatus::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown status '{s}' (valid: {})", valid.join(", "))
    })
}

fn read_request<T: serde::de::DeserializeOwned>(file: &Path) -> Result<T, String> {
    let contents =
        fs::read_to_string(file).map_err(|e| format!("failed to read {}: {e}", file.display()))?;
    serde_json::from_str(&contents).map_err(|e| format!("invalid request file: {e}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| format!("failed to serialize: {e}"))?;
    println!("{json}");
    Ok(())
}

/// Prints a top-level error envelope to stdout and fails the command.
fn fail(error: ApiError) -> Result<(), String> {
    let message = error.message.clone();
    print_json(&error.envelope())?;
    Err(message)
}
