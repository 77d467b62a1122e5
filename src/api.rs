//! Wire envelopes: the error taxonomy and its mapping from internal
//! errors.
//!
//! Two failure channels, distinguishable from shape alone: a top-level
//! `{error: ...}` envelope means nothing was attempted; per-item
//! entries inside a `results` array mean the request ran and some items
//! didn't make it. Messages here are sanitized: no raw store error
//! text, no stack traces, no incidental paths.

use serde::Serialize;

use crate::finalize::FinalizeRequestError;
use crate::store::{BatchRequestError, StoreError};

/// Wire error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    /// Malformed or out-of-range request; not retryable.
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    /// A referenced record or file is absent; not retryable without an
    /// external fix.
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    /// The store misbehaved; retryable only for transient subtypes.
    #[serde(rename = "STORE_ERROR")]
    Store,
    /// Anything unexpected; retryable.
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

/// A top-level error: the request was rejected before any item ran.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

/// The `{error: ...}` wrapper callers match on.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: ApiError,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Validation,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn envelope(self) -> ErrorEnvelope {
        ErrorEnvelope { error: self }
    }
}

impl From<&StoreError> for ApiError {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::JobNotFound(id) => Self {
                code: ErrorCode::NotFound,
                message: format!("job not found: {id}"),
                retryable: false,
            },
            // Transient by assumption: a locked or busy database clears.
            StoreError::Sql(_) => Self {
                code: ErrorCode::Store,
                message: "database operation failed".into(),
                retryable: true,
            },
            StoreError::Io(_) => Self {
                code: ErrorCode::Store,
                message: "storage I/O failed".into(),
                retryable: true,
            },
            StoreError::Corrupt(_) => Self {
                code: ErrorCode::Store,
                message: "store returned corrupt data".into(),
                retryable: false,
            },
        }
    }
}

impl From<&BatchRequestError> for ApiError {
    fn from(err: &BatchRequestError) -> Self {
        match err {
            BatchRequestError::Empty
            | BatchRequestError::TooLarge
            | BatchRequestError::DuplicateId(_) => Self::validation(err.to_string()),
            BatchRequestError::Store(store_err) => Self::from(store_err),
        }
    }
}

impl From<&FinalizeRequestError> for ApiError {
    fn from(err: &FinalizeRequestError) -> Self {
        Self::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_to_the_wire_shape() {
        let envelope = ApiError::validation("duplicate id in batch: 7").envelope();
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": {
                    "code": "VALIDATION_ERROR",
                    "message": "duplicate id in batch: 7",
                    "retryable": false,
                }
            })
        );
    }

    #[test]
    fn store_errors_are_sanitized() {
        let err = StoreError::Sql(rusqlite::Error::SqliteSingleThreadedMode);
        let api: ApiError = (&err).into();
        assert_eq!(api.code, ErrorCode::Store);
        assert!(api.retryable);
        // The underlying driver text never reaches the wire.
        assert_eq!(api.message, "database operation failed");
    }

    #[test]
    fn missing_job_maps_to_not_found() {
        let err = StoreError::JobNotFound(42);
        let api: ApiError = (&err).into();
        assert_eq!(api.code, ErrorCode::NotFound);
        assert!(!api.retryable);
    }

    #[test]
    fn corrupt_rows_are_not_retryable() {
        let err = StoreError::Corrupt("bad captured_at".into());
        let api: ApiError = (&err).into();
        assert_eq!(api.code, ErrorCode::Store);
        assert!(!api.retryable);
    }
}
