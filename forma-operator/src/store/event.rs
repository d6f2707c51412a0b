//! Events emitted by store writes.

use crate::account::{Account, ObjectKey};

/// Change events, delivered in write order to every subscriber.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A new account was created.
    Added(Account),
    /// An account was updated (spec, finalizers, status or deletion timestamp).
    Modified(Account),
    /// An account was physically removed.
    Deleted(ObjectKey),
}

impl StoreEvent {
    /// Key of the object this event refers to.
    pub fn key(&self) -> ObjectKey {
        match self {
            StoreEvent::Added(a) | StoreEvent::Modified(a) => a.key(),
            StoreEvent::Deleted(key) => key.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StoreEvent::Added(_) => "added",
            StoreEvent::Modified(_) => "modified",
            StoreEvent::Deleted(_) => "deleted",
        }
    }
}
