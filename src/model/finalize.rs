//! Request and response shapes for finalization runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One job to finalize: the record id, its tracker note, and an optional
/// artifact path overriding the one linked in the note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeItem {
    pub id: i64,
    pub note: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_override: Option<PathBuf>,
}

/// A finalization request as read from the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub items: Vec<FinalizeItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    /// Store override; the `--db` flag wins when both are given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

/// What happened (or would happen) to one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeAction {
    Finalized,
    WouldFinalize,
    Failed,
    WouldFail,
}

/// Per-item outcome, parallel to the request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeItemResult {
    pub id: i64,
    pub action: FinalizeAction,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a finalization run. Items are isolated: one failure never
/// aborts the others, so successes and failures mix freely in `results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResult {
    pub run_id: String,
    pub finalized_count: usize,
    pub failed_count: usize,
    pub dry_run: bool,
    pub results: Vec<FinalizeItemResult>,
}
