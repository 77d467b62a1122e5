//! Atomic batch status transitions.
//!
//! One call, one transaction. Validation runs cheapest-first: request
//! shape, then per-item semantics, then a single batched existence
//! query, and only when every item passes do the UPDATEs execute. Any
//! per-item failure rolls the whole batch back and is reported in the
//! structured results, not as a top-level error.

use std::collections::HashSet;

use jiff::Timestamp;
use rusqlite::{Transaction, params};

use crate::model::{BatchResult, ItemResult, JobStatus, StatusUpdate};

use super::{Storage, StoreError};

/// Largest accepted batch.
pub const MAX_BATCH: usize = 500;

/// Batch update failures that reject the request wholesale.
#[derive(Debug, thiserror::Error)]
pub enum BatchRequestError {
    #[error("batch is empty")]
    Empty,

    #[error("batch exceeds {MAX_BATCH} items")]
    TooLarge,

    #[error("duplicate id in batch: {0}")]
    DuplicateId(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates request shape only: emptiness, size, duplicate ids.
///
/// Pure, so callers can reject a malformed request before a store
/// connection is ever opened. A request naming the same id twice is
/// rejected wholesale here, never partially processed.
pub fn validate_batch_request(updates: &[StatusUpdate]) -> Result<(), BatchRequestError> {
    if updates.is_empty() {
        return Err(BatchRequestError::Empty);
    }
    if updates.len() > MAX_BATCH {
        return Err(BatchRequestError::TooLarge);
    }
    let mut seen = HashSet::with_capacity(updates.len());
    for update in updates {
        if !seen.insert(update.id) {
            return Err(BatchRequestError::DuplicateId(update.id));
        }
    }
    Ok(())
}

impl Storage {
    /// Applies a batch of status transitions as one all-or-nothing
    /// transaction.
    ///
    /// Results preserve request order. Setting a job to its current
    /// status is a valid no-op that still refreshes `updated_at`, so an
    /// identical batch can be resubmitted safely after an unknown
    /// outcome. Only `status` and `updated_at` are ever written.
    pub fn apply_status_batch(
        &mut self,
        updates: &[StatusUpdate],
    ) -> Result<BatchResult, BatchRequestError> {
        validate_batch_request(updates)?;

        let tx = self.conn.transaction().map_err(StoreError::from)?;
        // One timestamp for the whole batch: every row it touches moves
        // in the same instant.
        let now_ms = Timestamp::now().as_millisecond();

        let mut results: Vec<ItemResult> = Vec::with_capacity(updates.len());
        let mut parsed: Vec<Option<JobStatus>> = Vec::with_capacity(updates.len());
        for update in updates {
            let (result, status) = check_item(update);
            results.push(result);
            parsed.push(status);
        }

        let existing = existing_ids(&tx, updates).map_err(StoreError::from)?;
        for (result, update) in results.iter_mut().zip(updates) {
            if result.success && !existing.contains(&update.id) {
                *result = ItemResult::failed(update.id, "job not found");
            }
        }

        if results.iter().any(|r| !r.success) {
            // Atomic batch: items that passed validation are still not
            // applied once a sibling has failed.
            for result in &mut results {
                if result.success {
                    *result =
                        ItemResult::failed(result.id, "not applied: another item in the batch failed");
                }
            }
            drop(tx);
            let failed_count = results.len();
            return Ok(BatchResult {
                updated_count: 0,
                failed_count,
                results,
            });
        }

        {
            let mut stmt = tx
                .prepare(
                    "UPDATE job
                     SET status = ?1, updated_at_ms = MAX(updated_at_ms, ?2)
                     WHERE id = ?3",
                )
                .map_err(StoreError::from)?;
            for (update, status) in updates.iter().zip(&parsed) {
                // Every item was validated above, so `status` is present.
                if let Some(status) = status {
                    stmt.execute(params![status.as_str(), now_ms, update.id])
                        .map_err(StoreError::from)?;
                }
            }
        }
        tx.commit().map_err(StoreError::from)?;

        Ok(BatchResult {
            updated_count: updates.len(),
            failed_count: 0,
            results,
        })
    }
}

/// Per-item semantic checks: positive id, exact enum status.
fn check_item(update: &StatusUpdate) -> (ItemResult, Option<JobStatus>) {
    if update.id <= 0 {
        return (
            ItemResult::failed(update.id, "id must be a positive integer"),
            None,
        );
    }
    if update.status != update.status.trim() {
        return (
            ItemResult::failed(update.id, "status has surrounding whitespace"),
            None,
        );
    }
    match JobStatus::parse(&update.status) {
        Some(status) => (ItemResult::ok(update.id), Some(status)),
        None => (
            ItemResult::failed(update.id, format!("unknown status: {}", update.status)),
            None,
        ),
    }
}

/// One batched existence query covering every requested id.
fn existing_ids(tx: &Transaction<'_>, updates: &[StatusUpdate]) -> rusqlite::Result<HashSet<i64>> {
    let placeholders = vec!["?"; updates.len()].join(", ");
    let mut stmt = tx.prepare(&format!("SELECT id FROM job WHERE id IN ({placeholders})"))?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(updates.iter().map(|u| u.id)),
        |row| row.get::<_, i64>(0),
    )?;
    rows.collect()
}
