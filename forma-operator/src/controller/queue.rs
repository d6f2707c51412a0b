//! Work queue of object keys.
//!
//! A key is in at most one of three places: queued, processing, or neither.
//! Adding a key that is being processed marks it dirty instead of queueing
//! it, and [`WorkQueue::done`] re-queues dirty keys. A key is therefore never
//! handed to two workers at once.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

use crate::account::ObjectKey;

#[derive(Default)]
struct QueueState {
    items: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    processing: HashSet<ObjectKey>,
    dirty: HashSet<ObjectKey>,
    shutting_down: bool,
}

impl QueueState {
    fn push(&mut self, key: ObjectKey) -> bool {
        if self.queued.insert(key.clone()) {
            self.items.push_back(key);
            true
        } else {
            false
        }
    }
}

/// De-duplicating FIFO with per-key serialization.
#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a key unless it is already queued.
    pub fn add(&self, key: ObjectKey) {
        let mut state = self.lock();
        if state.shutting_down {
            return;
        }
        if state.processing.contains(&key) {
            debug!("Key {} is being processed, marking dirty", key);
            state.dirty.insert(key);
            return;
        }
        if state.push(key) {
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Queue a key after `delay`.
    pub fn add_after(self: &Arc<Self>, key: ObjectKey, delay: Duration) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Wait for the next key. `None` once the queue is shut down.
    pub async fn get(&self) -> Option<ObjectKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.items.pop_front() {
                    state.queued.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Mark a key as processed, re-queueing it if it changed meanwhile.
    pub fn done(&self, key: &ObjectKey) {
        let mut state = self.lock();
        state.processing.remove(key);
        if state.dirty.remove(key) && !state.shutting_down && state.push(key.clone()) {
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Stop handing out keys and wake all waiting workers.
    pub fn shut_down(&self) {
        self.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    /// Number of queued keys (excluding those being processed).
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("default", name)
    }

    #[tokio::test]
    async fn test_dedup_and_order() {
        let queue = WorkQueue::new();
        queue.add(key("a"));
        queue.add(key("b"));
        queue.add(key("a"));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.get().await, Some(key("a")));
        assert_eq!(queue.get().await, Some(key("b")));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_processing_key_is_not_handed_out_twice() {
        let queue = WorkQueue::new();
        queue.add(key("a"));
        let first = queue.get().await.unwrap();

        // Changed while processing: held back until done
        queue.add(key("a"));
        queue.add(key("a"));
        assert!(queue.is_empty());

        queue.done(&first);
        assert_eq!(queue.len(), 1);
        let second = queue.get().await.unwrap();
        assert_eq!(second, first);

        // Done without changes: nothing re-queued
        queue.done(&second);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_get_waits_for_add() {
        let queue = Arc::new(WorkQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.get().await })
        };
        tokio::task::yield_now().await;
        queue.add(key("a"));
        assert_eq!(waiter.await.unwrap(), Some(key("a")));
    }

    #[tokio::test]
    async fn test_shut_down_wakes_waiters() {
        let queue = Arc::new(WorkQueue::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.get().await })
            })
            .collect();
        tokio::task::yield_now().await;

        queue.shut_down();
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), None);
        }

        queue.add(key("a"));
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_after_delay() {
        let queue = Arc::new(WorkQueue::new());
        queue.add_after(key("a"), Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(queue.is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(queue.len(), 1);
    }
}
