use thiserror::Error;

use crate::account::StatusError;
use crate::remote::RemoteError;
use crate::store::StoreError;

/// Errors surfaced to the controller; each one triggers a backoff retry.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("remote: {0}")]
    Remote(#[from] RemoteError),

    #[error("status: {0}")]
    Status(#[from] StatusError),
}
