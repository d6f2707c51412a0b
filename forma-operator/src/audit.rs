//! Audit events for account lifecycle changes.
//!
//! Emitted under the `audit` tracing target with the related object IDs, so
//! they can be routed separately from operational logs.

use std::sync::Arc;

use crate::account::ObjectKey;

/// Audit severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Audit,
    Warn,
    Error,
}

/// Audit logger for a single component.
pub struct AccountAuditLogger {
    component: String,
}

impl AccountAuditLogger {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
        }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>, object_ids: Vec<String>) {
        let message = message.into();
        match level {
            LogLevel::Error => {
                tracing::error!(target: "audit", component = %self.component, objects = ?object_ids, "{}", message)
            }
            LogLevel::Warn => {
                tracing::warn!(target: "audit", component = %self.component, objects = ?object_ids, "{}", message)
            }
            LogLevel::Audit | LogLevel::Info => {
                tracing::info!(target: "audit", component = %self.component, objects = ?object_ids, "{}", message)
            }
            LogLevel::Debug => {
                tracing::debug!(target: "audit", component = %self.component, objects = ?object_ids, "{}", message)
            }
        }
    }

    pub fn finalizer_attached(&self, key: &ObjectKey) {
        self.log(
            LogLevel::Debug,
            format!("Finalizer attached: {}", key),
            vec![key.to_string()],
        );
    }

    pub fn finalizer_released(&self, key: &ObjectKey) {
        self.log(
            LogLevel::Info,
            format!("Finalizer released: {}", key),
            vec![key.to_string()],
        );
    }

    pub fn account_created(&self, key: &ObjectKey, remote_id: &str) {
        self.log(
            LogLevel::Audit,
            format!("Account created: {} ({})", key, remote_id),
            vec![key.to_string(), remote_id.to_string()],
        );
    }

    pub fn create_failed(&self, key: &ObjectKey, error: &str) {
        self.log(
            LogLevel::Error,
            format!("Account creation failed: {}: {}", key, error),
            vec![key.to_string()],
        );
    }

    /// A remote account exists that no status records.
    pub fn create_unrecorded(&self, key: &ObjectKey, remote_id: &str, error: &str) {
        self.log(
            LogLevel::Error,
            format!(
                "Account created but not recorded: {} ({}): {}",
                key, remote_id, error
            ),
            vec![key.to_string(), remote_id.to_string()],
        );
    }

    pub fn account_deleted(&self, key: &ObjectKey, remote_id: &str) {
        self.log(
            LogLevel::Audit,
            format!("Account deleted: {} ({})", key, remote_id),
            vec![key.to_string(), remote_id.to_string()],
        );
    }

    /// Delete failures are retried while the finalizer holds the object.
    pub fn delete_failed(&self, key: &ObjectKey, remote_id: &str, error: &str) {
        self.log(
            LogLevel::Warn,
            format!("Account deletion failed: {} ({}): {}", key, remote_id, error),
            vec![key.to_string(), remote_id.to_string()],
        );
    }
}

/// Create a shared audit logger.
pub fn create_audit_logger(component: &str) -> Arc<AccountAuditLogger> {
    Arc::new(AccountAuditLogger::new(component))
}
