//! Finalizer-based deletion guard.

use crate::account::{Account, ObjectKey};
use crate::store::{AccountStore, Result as StoreResult};

/// Guard token that keeps an object in the store until its remote resource
/// has been released.
#[derive(Debug, Clone, Copy)]
pub struct FinalizerGuard {
    token: &'static str,
}

impl FinalizerGuard {
    pub const fn new(token: &'static str) -> Self {
        Self { token }
    }

    pub fn is_attached(&self, account: &Account) -> bool {
        account.metadata.finalizers.contains(self.token)
    }

    /// Attach the token and persist.
    pub async fn attach(
        &self,
        store: &dyn AccountStore,
        mut account: Account,
    ) -> StoreResult<Account> {
        if !account.metadata.finalizers.insert(self.token) {
            return Ok(account);
        }
        store.update(account).await
    }

    /// Remove the token and persist. The store removes the object once no
    /// tokens remain on an object being deleted.
    pub async fn release(
        &self,
        store: &dyn AccountStore,
        mut account: Account,
    ) -> StoreResult<ObjectKey> {
        let key = account.key();
        if account.metadata.finalizers.remove(self.token) {
            store.update(account).await?;
        }
        Ok(key)
    }
}
