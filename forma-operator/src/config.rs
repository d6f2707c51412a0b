//! Controller configuration.

use std::time::Duration;

use crate::controller::RetryPolicy;

/// Settings for the controller's scheduling layer.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Number of concurrent reconcile workers.
    pub workers: usize,
    /// Re-enqueue every object at this interval; `None` disables resync.
    pub resync_interval: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            resync_interval: Some(Duration::from_secs(600)),
            retry: RetryPolicy::default(),
        }
    }
}
