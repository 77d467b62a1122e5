//! Opaque pagination cursor for queue scans.
//!
//! A cursor pins the position of a descending `(captured_at, id)` scan:
//! the pair of the last row the caller has already seen. The token is a
//! hex-encoded JSON payload. Opaque to callers, stable across runs, and
//! free of wall-clock or random input, so the same position always
//! encodes to the same token.

use serde::{Deserialize, Serialize};

/// Errors from cursor handling.
#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    /// The token was not produced by [`Cursor::encode`].
    #[error("malformed cursor token")]
    Malformed,

    #[error("failed to encode cursor: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, CursorError>;

/// A decoded scan position.
///
/// `captured_at_ms` matches the store's millisecond column exactly, so a
/// round-tripped cursor compares identically to the row it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub captured_at_ms: i64,
    pub id: i64,
}

impl Cursor {
    /// Encodes this position as an opaque token.
    pub fn encode(self) -> Result<String> {
        Ok(hex::encode(serde_json::to_vec(&self)?))
    }

    /// Decodes a token back to its position.
    ///
    /// Total over arbitrary input: anything this crate did not encode
    /// fails with [`CursorError::Malformed`], never a panic.
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = hex::decode(token).map_err(|_| CursorError::Malformed)?;
        serde_json::from_slice(&bytes).map_err(|_| CursorError::Malformed)
    }
}
