//! Controller - schedules reconciliations.
//!
//! Store events feed a [`WorkQueue`]; a pool of workers pulls keys and runs
//! the reconciler. The directive it returns decides what happens next:
//!
//! - `Done`: failure count reset, wait for the next change
//! - `Requeue`: key re-queued immediately
//! - `Err`: key re-queued after the [`RetryPolicy`] backoff
//!
//! All keys are re-queued at start, on event lag and every resync interval.

mod queue;
mod retry;

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::reconciler::{Action, Reconciler};
use crate::store::{AccountStore, StoreEvent};

pub use queue::WorkQueue;
pub use retry::{FailureTracker, RetryPolicy};

/// Resolve once `shutdown` is set to `true`. Never resolves if the sender is
/// dropped without signalling.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Drives a reconciler from store events.
pub struct Controller<R> {
    reconciler: Arc<R>,
    store: Arc<dyn AccountStore>,
    queue: Arc<WorkQueue>,
    failures: Arc<FailureTracker>,
    config: ControllerConfig,
}

impl<R> Controller<R>
where
    R: Reconciler + 'static,
{
    pub fn new(reconciler: Arc<R>, store: Arc<dyn AccountStore>, config: ControllerConfig) -> Self {
        Self {
            reconciler,
            store,
            queue: Arc::new(WorkQueue::new()),
            failures: Arc::new(FailureTracker::new()),
            config,
        }
    }

    /// Run until `shutdown` is set. Workers finish their current key first.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        // Subscribe before listing so no change falls between the two
        let events = self.store.subscribe();
        resync(self.store.as_ref(), &self.queue).await;

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        tasks.push(tokio::spawn(watch_events(
            Arc::clone(&self.store),
            events,
            Arc::clone(&self.queue),
            shutdown.clone(),
        )));

        if let Some(interval) = self.config.resync_interval {
            let store = Arc::clone(&self.store);
            let queue = Arc::clone(&self.queue);
            let mut stop = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            debug!("Periodic resync");
                            resync(store.as_ref(), &queue).await;
                        }
                        _ = wait_for_shutdown(&mut stop) => break,
                    }
                }
            }));
        }

        let workers = self.config.workers.max(1);
        info!("Starting controller with {} workers", workers);
        for id in 0..workers {
            tasks.push(tokio::spawn(worker(
                id,
                Arc::clone(&self.reconciler),
                Arc::clone(&self.queue),
                Arc::clone(&self.failures),
                self.config.retry.clone(),
            )));
        }

        wait_for_shutdown(&mut shutdown).await;
        info!("Controller shutting down");
        self.queue.shut_down();

        for task in tasks {
            if let Err(e) = task.await {
                error!("Controller task failed: {}", e);
            }
        }
        info!("Controller stopped");
    }
}

/// Queue every stored object.
async fn resync(store: &dyn AccountStore, queue: &WorkQueue) {
    match store.list().await {
        Ok(accounts) => {
            debug!("Resync: {} accounts", accounts.len());
            for account in accounts {
                queue.add(account.key());
            }
        }
        Err(e) => warn!("Resync failed to list accounts: {}", e),
    }
}

async fn watch_events(
    store: Arc<dyn AccountStore>,
    mut events: broadcast::Receiver<StoreEvent>,
    queue: Arc<WorkQueue>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => queue.add(event.key()),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Missed {} store events, resyncing", missed);
                    resync(store.as_ref(), &queue).await;
                }
                Err(RecvError::Closed) => {
                    info!("Store event stream closed");
                    break;
                }
            },
            _ = wait_for_shutdown(&mut shutdown) => break,
        }
    }
}

async fn worker<R: Reconciler>(
    id: usize,
    reconciler: Arc<R>,
    queue: Arc<WorkQueue>,
    failures: Arc<FailureTracker>,
    retry: RetryPolicy,
) {
    debug!("Worker {} started", id);
    while let Some(key) = queue.get().await {
        match reconciler.reconcile(&key).await {
            Ok(Action::Done) => failures.forget(&key),
            Ok(Action::Requeue) => {
                debug!("Requeueing {}", key);
                queue.add(key.clone());
            }
            Err(e) => {
                let attempt = failures.record(&key);
                match retry.backoff_for(attempt) {
                    Some(delay) => {
                        warn!(
                            "Reconcile of {} failed (attempt {}), retrying in {:?}: {}",
                            key, attempt, delay, e
                        );
                        queue.add_after(key.clone(), delay);
                    }
                    None => {
                        error!("Giving up on {} after {} failed attempts: {}", key, attempt, e);
                        failures.forget(&key);
                    }
                }
            }
        }
        queue.done(&key);
    }
    debug!("Worker {} stopped", id);
}
