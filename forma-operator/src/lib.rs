pub mod account;
pub mod audit;
pub mod config;
pub mod controller;
pub mod reconciler;
pub mod remote;
pub mod rest;
pub mod store;

pub use account::{
    ACCOUNT_FINALIZER, Account, AccountSpec, AccountState, AccountStatus, ObjectKey, ObjectMeta,
};
pub use audit::{AccountAuditLogger, create_audit_logger};
pub use config::ControllerConfig;
pub use controller::{Controller, RetryPolicy};
pub use reconciler::{AccountReconciler, Action, ReconcileError, Reconciler};
pub use remote::{AccountClient, Form3Client, Form3Config, MemoryAccountClient};
pub use store::{AccountStore, MemoryStore, StoreError, StoreEvent};
