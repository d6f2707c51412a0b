//! Clients for the remote account service.
//!
//! - `Form3Client`: HTTP client for the Form3 organisation accounts API
//! - `MemoryAccountClient`: in-process accounts for `--dev` mode and tests

mod error;
pub mod form3;
pub mod memory;

use async_trait::async_trait;

use crate::account::AccountSpec;

pub use error::{RemoteError, Result};
pub use form3::{Form3Client, Form3Config};
pub use memory::MemoryAccountClient;

/// Fields required to open an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccountRequest {
    pub organisation_id: String,
    pub country: String,
    pub bank_id: String,
    pub bank_id_code: String,
    pub bic: String,
}

impl From<&AccountSpec> for CreateAccountRequest {
    fn from(spec: &AccountSpec) -> Self {
        Self {
            organisation_id: spec.organisation_id.clone(),
            country: spec.country.clone(),
            bank_id: spec.bank_id.clone(),
            bank_id_code: spec.bank_id_code.clone(),
            bic: spec.bic.clone(),
        }
    }
}

/// Account as returned by a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccount {
    pub id: String,
    pub iban: String,
    pub account_number: String,
    pub base_currency: String,
}

/// Remote account management capability.
#[async_trait]
pub trait AccountClient: Send + Sync {
    /// Open an account.
    async fn create_account(&self, req: &CreateAccountRequest) -> Result<RemoteAccount>;

    /// Close an account. An account that no longer exists counts as deleted.
    async fn delete_account(&self, id: &str) -> Result<()>;
}
