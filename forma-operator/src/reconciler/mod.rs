//! Reconcilers.
//!
//! A reconciler reads the current object by key and takes the next step
//! toward its desired state. It is invoked by the controller once per
//! delivered event and must be safe to re-run at any point.

pub mod account;
mod error;
pub mod finalizer;

use async_trait::async_trait;

use crate::account::ObjectKey;

pub use account::AccountReconciler;
pub use error::ReconcileError;
pub use finalizer::FinalizerGuard;

/// Scheduling directive returned by a successful invocation.
///
/// An `Err` from [`Reconciler::reconcile`] means "retry after backoff".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Converged for now; wait for the next change.
    Done,
    /// Run again as soon as possible.
    Requeue,
}

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reconcile the object identified by `key`.
    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, Self::Error>;
}
