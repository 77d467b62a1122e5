//! Request and response shapes for batch status updates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One requested status transition.
///
/// `status` stays a raw string here: per-item validation happens in the
/// writer so a single bad value surfaces as a per-item failure instead of
/// rejecting the whole request at parse time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub id: i64,
    pub status: String,
}

/// A batch update request as read from the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdateRequest {
    pub updates: Vec<StatusUpdate>,
    /// Store override; the `--db` flag wins when both are given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

/// Per-item outcome, parallel to the request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    pub id: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    pub fn ok(id: i64) -> Self {
        Self {
            id,
            success: true,
            error: None,
        }
    }

    pub fn failed(id: i64, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Batch outcome. `results` preserves request order; the batch is atomic,
/// so `updated_count` is either the full batch or zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub updated_count: usize,
    pub failed_count: usize,
    pub results: Vec<ItemResult>,
}
