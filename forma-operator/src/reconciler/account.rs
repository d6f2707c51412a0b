//! Account reconciler - drives Form3 accounts from Account objects.
//!
//! Decision order per invocation:
//!
//! 1. object gone → done
//! 2. deletion requested → delete remote account, release finalizer
//! 3. finalizer missing → attach it, requeue (no remote call yet)
//! 4. state unset → persist `Pending`, create remote account, record result
//! 5. anything else → steady state, nothing to do
//!
//! Accounts are created once and deleted once; remote drift is not corrected.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{Action, FinalizerGuard, ReconcileError, Reconciler};
use crate::account::{
    ACCOUNT_FINALIZER, Account, AccountState, AccountStatus, ObjectKey, StatusError,
};
use crate::audit::AccountAuditLogger;
use crate::controller::wait_for_shutdown;
use crate::remote::{self, AccountClient, CreateAccountRequest, RemoteError};
use crate::store::AccountStore;

/// Default deadline for a single remote call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

const CREATING_MESSAGE: &str = "Creating Form3 account";

/// Tries for writing a create outcome before giving up to a requeue.
const OUTCOME_WRITE_ATTEMPTS: usize = 3;

/// Reconciler for Account objects.
pub struct AccountReconciler {
    store: Arc<dyn AccountStore>,
    client: Arc<dyn AccountClient>,
    audit: Arc<AccountAuditLogger>,
    guard: FinalizerGuard,
    remote_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

impl AccountReconciler {
    /// `shutdown` flipping to `true` cancels in-flight remote calls.
    pub fn new(
        store: Arc<dyn AccountStore>,
        client: Arc<dyn AccountClient>,
        audit: Arc<AccountAuditLogger>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            client,
            audit,
            guard: FinalizerGuard::new(ACCOUNT_FINALIZER),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            shutdown,
        }
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Run a remote call bounded by the deadline and the shutdown signal.
    async fn call_remote<T>(
        &self,
        call: impl Future<Output = remote::Result<T>> + Send,
    ) -> remote::Result<T> {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            result = tokio::time::timeout(self.remote_timeout, call) => {
                result.unwrap_or_else(|_| Err(RemoteError::Timeout(self.remote_timeout)))
            }
            _ = wait_for_shutdown(&mut shutdown) => Err(RemoteError::Cancelled),
        }
    }

    async fn reconcile_account(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let Some(account) = self.store.get(key).await? else {
            debug!("Account {} no longer exists", key);
            return Ok(Action::Done);
        };

        if account.metadata.is_being_deleted() {
            return self.finalize(account).await;
        }

        if !self.guard.is_attached(&account) {
            info!("Attaching finalizer to account {}", key);
            self.guard.attach(self.store.as_ref(), account).await?;
            self.audit.finalizer_attached(key);
            return Ok(Action::Requeue);
        }

        match account.status.state {
            AccountState::Unset => self.create(account).await,
            state => {
                debug!("Account {} in steady state {}", key, state);
                Ok(Action::Done)
            }
        }
    }

    async fn create(&self, mut account: Account) -> Result<Action, ReconcileError> {
        let key = account.key();
        info!("Creating Form3 account for {}", key);

        // Record the attempt before the side effect
        account
            .status
            .transition(AccountState::Pending, CREATING_MESSAGE)?;
        let account = self.store.update_status(account).await?;

        let request = CreateAccountRequest::from(&account.spec);
        match self.call_remote(self.client.create_account(&request)).await {
            Ok(remote) => {
                if let Err(e) = self
                    .persist_outcome(account, |status| status.record_created(&remote))
                    .await
                {
                    error!(
                        "Form3 account {} for {} could not be recorded: {}",
                        remote.id, key, e
                    );
                    self.audit.create_unrecorded(&key, &remote.id, &e.to_string());
                    return Err(e);
                }
                info!("Account {} ready as {}", key, remote.id);
                self.audit.account_created(&key, &remote.id);
                Ok(Action::Done)
            }
            Err(e) => {
                error!("Failed to create Form3 account for {}: {}", key, e);
                let message = e.to_string();
                self.audit.create_failed(&key, &message);
                self.persist_outcome(account, |status| {
                    status.transition(AccountState::Failed, message.as_str())
                })
                .await?;
                Err(e.into())
            }
        }
    }

    /// Write the outcome of a create attempt.
    ///
    /// A conflicting write is re-applied to the fresh object as long as it
    /// still shows the same attempt (`Pending`, no remote id). A delete
    /// request or spec edit racing the remote call must not drop the id.
    async fn persist_outcome<F>(
        &self,
        mut account: Account,
        apply: F,
    ) -> Result<Account, ReconcileError>
    where
        F: Fn(&mut AccountStatus) -> Result<(), StatusError> + Send + Sync,
    {
        let key = account.key();
        let mut attempt = 1;
        loop {
            apply(&mut account.status)?;
            match self.store.update_status(account).await {
                Ok(updated) => return Ok(updated),
                Err(e) if e.is_conflict() && attempt < OUTCOME_WRITE_ATTEMPTS => {
                    attempt += 1;
                    debug!("Conflict recording outcome for {}, re-reading: {}", key, e);
                    match self.store.get(&key).await? {
                        Some(fresh)
                            if fresh.status.state == AccountState::Pending
                                && !fresh.status.has_remote() =>
                        {
                            account = fresh;
                        }
                        _ => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn finalize(&self, account: Account) -> Result<Action, ReconcileError> {
        let key = account.key();
        if !self.guard.is_attached(&account) {
            debug!("Account {} is being deleted, nothing to release", key);
            return Ok(Action::Done);
        }

        if account.status.has_remote() {
            let remote_id = account.status.id.clone();
            info!("Deleting Form3 account {} for {}", remote_id, key);

            if let Err(e) = self
                .call_remote(self.client.delete_account(&remote_id))
                .await
            {
                error!("Failed to delete Form3 account {}: {}", remote_id, e);
                self.audit.delete_failed(&key, &remote_id, &e.to_string());
                self.record_delete_failure(account, &e).await;
                return Err(e.into());
            }
            self.audit.account_deleted(&key, &remote_id);
        } else {
            debug!("Account {} never created a remote account", key);
        }

        self.guard.release(self.store.as_ref(), account).await?;
        info!("Released finalizer on account {}", key);
        self.audit.finalizer_released(&key);
        Ok(Action::Done)
    }

    /// Best effort: the delete error is what gets surfaced.
    async fn record_delete_failure(&self, mut account: Account, cause: &RemoteError) {
        let key = account.key();
        if let Err(e) = account
            .status
            .transition(AccountState::Failed, cause.to_string())
        {
            warn!("Not recording delete failure on {}: {}", key, e);
            return;
        }
        if let Err(e) = self.store.update_status(account).await {
            warn!("Failed to record delete failure on {}: {}", key, e);
        }
    }
}

#[async_trait]
impl Reconciler for AccountReconciler {
    type Error = ReconcileError;

    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        match self.reconcile_account(key).await {
            Err(ReconcileError::Store(e)) if e.is_conflict() => {
                debug!("Write conflict on {}, requeueing: {}", key, e);
                Ok(Action::Requeue)
            }
            other => other,
        }
    }
}
