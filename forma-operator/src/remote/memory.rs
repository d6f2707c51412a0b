//! In-process account service.
//!
//! Used by `--dev` mode so the operator can run without a Form3 endpoint, and
//! by tests, which can inject failures and inspect the calls made.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::{AccountClient, CreateAccountRequest, RemoteAccount, RemoteError, Result};

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, RemoteAccount>,
    create_calls: Vec<CreateAccountRequest>,
    delete_calls: Vec<String>,
    create_failures: VecDeque<String>,
    delete_failures: VecDeque<String>,
    next_ids: VecDeque<String>,
}

/// Account service kept in memory.
#[derive(Default)]
pub struct MemoryAccountClient {
    inner: Mutex<Inner>,
}

impl MemoryAccountClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Use `id` for the next created account instead of a random one.
    pub fn push_next_id(&self, id: impl Into<String>) {
        self.lock().next_ids.push_back(id.into());
    }

    /// Make the next create call fail with `message`.
    pub fn fail_next_create(&self, message: impl Into<String>) {
        self.lock().create_failures.push_back(message.into());
    }

    /// Make the next delete call fail with `message`.
    pub fn fail_next_delete(&self, message: impl Into<String>) {
        self.lock().delete_failures.push_back(message.into());
    }

    pub fn create_calls(&self) -> Vec<CreateAccountRequest> {
        self.lock().create_calls.clone()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.lock().delete_calls.clone()
    }

    /// Accounts that currently exist.
    pub fn accounts(&self) -> Vec<RemoteAccount> {
        let mut accounts: Vec<RemoteAccount> = self.lock().accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().accounts.contains_key(id)
    }
}

fn base_currency(country: &str) -> &'static str {
    match country {
        "GB" => "GBP",
        "US" => "USD",
        "CH" => "CHF",
        "AU" => "AUD",
        "CA" => "CAD",
        _ => "EUR",
    }
}

#[async_trait]
impl AccountClient for MemoryAccountClient {
    async fn create_account(&self, req: &CreateAccountRequest) -> Result<RemoteAccount> {
        let mut inner = self.lock();
        inner.create_calls.push(req.clone());
        if let Some(message) = inner.create_failures.pop_front() {
            return Err(RemoteError::Rejected(message));
        }

        let uuid = uuid::Uuid::new_v4();
        let id = inner
            .next_ids
            .pop_front()
            .unwrap_or_else(|| uuid.to_string());
        let account_number = format!("{:08}", uuid.as_u128() % 100_000_000);
        let bank_code: String = req.bic.chars().take(4).collect();
        let account = RemoteAccount {
            iban: format!(
                "{}00{}{}{}",
                req.country, bank_code, req.bank_id, account_number
            ),
            account_number,
            base_currency: base_currency(&req.country).to_string(),
            id: id.clone(),
        };
        debug!("Created in-memory account {}", id);
        inner.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.delete_calls.push(id.to_string());
        if let Some(message) = inner.delete_failures.pop_front() {
            return Err(RemoteError::Rejected(message));
        }
        if inner.accounts.remove(id).is_some() {
            debug!("Deleted in-memory account {}", id);
        }
        Ok(())
    }
}
