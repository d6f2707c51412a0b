//! In-process AccountStore.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::account::{Account, ObjectKey};

use super::error::{Result, StoreError};
use super::event::StoreEvent;
use super::traits::AccountStore;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// In-memory store with versioned writes and finalizer-guarded deletion.
///
/// Events are sent while the write lock is held, so subscribers observe them
/// in write order.
pub struct MemoryStore {
    objects: RwLock<HashMap<ObjectKey, Account>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            objects: RwLock::new(HashMap::new()),
            events,
        }
    }

    fn emit(&self, event: StoreEvent) {
        debug!(key = %event.key(), kind = event.kind(), "Store event");
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn check_version(key: &ObjectKey, current: &Account, proposed: &Account) -> Result<()> {
    let expected = current.metadata.resource_version;
    let actual = proposed.metadata.resource_version;
    if expected != actual {
        return Err(StoreError::Conflict {
            key: key.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Account>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<Account>> {
        let objects = self.objects.read().await;
        let mut accounts: Vec<Account> = objects.values().cloned().collect();
        accounts.sort_by(|a, b| a.metadata.key().cmp(&b.metadata.key()));
        Ok(accounts)
    }

    async fn list_namespace(&self, namespace: &str) -> Result<Vec<Account>> {
        let mut accounts = self.list().await?;
        accounts.retain(|a| a.metadata.namespace == namespace);
        Ok(accounts)
    }

    async fn create(&self, account: Account) -> Result<Account> {
        let key = account.key();
        if key.namespace.is_empty() || key.name.is_empty() {
            return Err(StoreError::Invalid(
                "namespace and name are required".to_string(),
            ));
        }

        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }

        let mut created = account;
        created.metadata.uid = uuid::Uuid::new_v4().to_string();
        created.metadata.resource_version = 1;
        created.metadata.creation_timestamp = Some(Utc::now());
        created.metadata.deletion_timestamp = None;
        created.status = Default::default();

        objects.insert(key, created.clone());
        self.emit(StoreEvent::Added(created.clone()));
        Ok(created)
    }

    async fn update(&self, account: Account) -> Result<Account> {
        let key = account.key();
        let mut objects = self.objects.write().await;
        let current = objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        check_version(&key, current, &account)?;

        if current.metadata.is_being_deleted()
            && account.metadata.finalizers.adds_to(&current.metadata.finalizers)
        {
            return Err(StoreError::Invalid(format!(
                "{} is being deleted, finalizers cannot be added",
                key
            )));
        }

        if current.spec == account.spec
            && current.metadata.finalizers == account.metadata.finalizers
        {
            return Ok(current.clone());
        }

        let mut updated = current.clone();
        updated.spec = account.spec;
        updated.metadata.finalizers = account.metadata.finalizers;
        updated.metadata.resource_version += 1;

        if updated.metadata.is_being_deleted() && updated.metadata.finalizers.is_empty() {
            objects.remove(&key);
            self.emit(StoreEvent::Deleted(key));
        } else {
            objects.insert(key, updated.clone());
            self.emit(StoreEvent::Modified(updated.clone()));
        }
        Ok(updated)
    }

    async fn update_status(&self, account: Account) -> Result<Account> {
        let key = account.key();
        let mut objects = self.objects.write().await;
        let current = objects
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        check_version(&key, current, &account)?;
        if current.status == account.status {
            return Ok(current.clone());
        }

        current.status = account.status;
        current.metadata.resource_version += 1;
        let updated = current.clone();
        self.emit(StoreEvent::Modified(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        let mut objects = self.objects.write().await;
        let current = objects
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if current.metadata.finalizers.is_empty() {
            objects.remove(key);
            self.emit(StoreEvent::Deleted(key.clone()));
            return Ok(());
        }

        if current.metadata.deletion_timestamp.is_none() {
            current.metadata.deletion_timestamp = Some(Utc::now());
            current.metadata.resource_version += 1;
            let updated = current.clone();
            self.emit(StoreEvent::Modified(updated));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
