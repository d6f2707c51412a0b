//! AccountStore trait definition.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::account::{Account, ObjectKey};

use super::error::Result;
use super::event::StoreEvent;

/// Store for Account objects, keyed by namespace and name.
///
/// Writes carry the `resource_version` the caller read; a stale version fails
/// with [`StoreError::Conflict`](super::StoreError::Conflict).
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Get an account. `None` if it does not exist (or was fully deleted).
    async fn get(&self, key: &ObjectKey) -> Result<Option<Account>>;

    /// List all accounts across namespaces.
    async fn list(&self) -> Result<Vec<Account>>;

    /// List accounts in one namespace.
    async fn list_namespace(&self, namespace: &str) -> Result<Vec<Account>>;

    /// Create an account. Status is reset; identity fields are assigned.
    async fn create(&self, account: Account) -> Result<Account>;

    /// Update spec and finalizers.
    ///
    /// If the object is being deleted and no finalizers remain afterwards,
    /// it is physically removed.
    async fn update(&self, account: Account) -> Result<Account>;

    /// Update the status subresource only.
    async fn update_status(&self, account: Account) -> Result<Account>;

    /// Request deletion.
    ///
    /// Objects without finalizers are removed immediately; otherwise the
    /// deletion timestamp is set and removal waits for the finalizers.
    async fn delete(&self, key: &ObjectKey) -> Result<()>;

    /// Subscribe to change events.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
