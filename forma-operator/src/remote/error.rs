//! Remote client error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by remote account calls.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("account service returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The service refused the operation.
    #[error("{0}")]
    Rejected(String),

    /// Response body could not be interpreted.
    #[error("invalid response: {0}")]
    Decode(String),

    /// Call abandoned because the controller is shutting down.
    #[error("call cancelled, remote outcome unknown")]
    Cancelled,

    /// Call exceeded its deadline.
    #[error("call timed out after {0:?}, remote outcome unknown")]
    Timeout(Duration),
}

/// Result type for remote calls.
pub type Result<T> = std::result::Result<T, RemoteError>;
