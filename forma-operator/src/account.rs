//! Account object model.
//!
//! An [`Account`] is the declared desired-state object: `spec` is written by
//! users, `status` is owned by the reconciler and `metadata` carries identity,
//! the resource version used for optimistic concurrency, the deletion
//! timestamp and the finalizer set.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::RemoteAccount;

/// Finalizer token guarding remote account cleanup.
pub const ACCOUNT_FINALIZER: &str = "account.form3.tech/finalizer";

/// Namespaced object identity; the reconciliation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Set of finalizer tokens attached to an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Finalizers(BTreeSet<String>);

impl Finalizers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    /// Insert a token. Returns false if it was already present.
    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        self.0.insert(token.into())
    }

    /// Remove a token. Returns false if it was not present.
    pub fn remove(&mut self, token: &str) -> bool {
        self.0.remove(token)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// True if `self` holds a token that `other` does not.
    pub fn adds_to(&self, other: &Finalizers) -> bool {
        self.0.difference(&other.0).next().is_some()
    }
}

impl<S: Into<String>> FromIterator<S> for Finalizers {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Object metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    /// Bumped by the store on every write.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    /// Set when deletion was requested while finalizers were still attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Finalizers::is_empty")]
    pub finalizers: Finalizers,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    pub fn is_being_deleted(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

/// Desired state of a Form3 account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSpec {
    #[serde(rename = "organisationID")]
    pub organisation_id: String,
    pub country: String,
    #[serde(rename = "bankID")]
    pub bank_id: String,
    #[serde(rename = "bankIDCode")]
    pub bank_id_code: String,
    pub bic: String,
}

/// Lifecycle state of the remote account as observed by the reconciler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountState {
    /// Creation has not been attempted.
    #[default]
    #[serde(rename = "")]
    Unset,
    Pending,
    Ready,
    Failed,
}

impl AccountState {
    /// Transition table for automatic state changes.
    ///
    /// `Ready -> Failed` and `Failed -> Failed` are taken when a remote delete
    /// fails; creation only ever moves `Unset -> Pending -> {Ready, Failed}`.
    pub const fn can_transition_to(self, next: AccountState) -> bool {
        use AccountState::*;
        matches!(
            (self, next),
            (Unset, Pending)
                | (Pending, Ready)
                | (Pending, Failed)
                | (Ready, Failed)
                | (Failed, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Unset => "",
            AccountState::Pending => "Pending",
            AccountState::Ready => "Ready",
            AccountState::Failed => "Failed",
        }
    }
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountState::Unset => f.write_str("Unset"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Rejected status mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("invalid state transition {from} -> {to}")]
    InvalidTransition { from: AccountState, to: AccountState },

    #[error("remote id already recorded as {current}, refusing to overwrite with {proposed}")]
    RemoteIdOverwrite { current: String, proposed: String },
}

/// Observed state of a Form3 account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    /// Remote account ID. Empty until creation succeeds, then write-once.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub iban: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub base_currency: String,
    #[serde(default)]
    pub state: AccountState,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl AccountStatus {
    /// Move to `next`, overwriting the message.
    pub fn transition(
        &mut self,
        next: AccountState,
        message: impl Into<String>,
    ) -> Result<(), StatusError> {
        if !self.state.can_transition_to(next) {
            return Err(StatusError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.message = message.into();
        Ok(())
    }

    /// Record a successful remote create and move to `Ready`.
    pub fn record_created(&mut self, remote: &RemoteAccount) -> Result<(), StatusError> {
        if !self.id.is_empty() && self.id != remote.id {
            return Err(StatusError::RemoteIdOverwrite {
                current: self.id.clone(),
                proposed: remote.id.clone(),
            });
        }
        self.transition(AccountState::Ready, "Account successfully created")?;
        self.id = remote.id.clone();
        self.iban = remote.iban.clone();
        self.account_number = remote.account_number.clone();
        self.base_currency = remote.base_currency.clone();
        Ok(())
    }

    pub fn has_remote(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Account desired-state object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub metadata: ObjectMeta,
    pub spec: AccountSpec,
    #[serde(default)]
    pub status: AccountStatus,
}

impl Account {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: AccountSpec) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: AccountStatus::default(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }
}
