//! Store error types.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Object not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Object with the same key already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Resource version mismatch (optimistic concurrency control).
    #[error("conflict on {key}: expected version {expected}, got {actual}")]
    Conflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// Write rejected by store validation.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl StoreError {
    /// Transient error; the caller should re-read and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
