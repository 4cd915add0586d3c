//! Keyed recurring-timer scheduler.
//!
//! Scheduling under a key that already has an active task aborts the prior
//! one first; there is never more than one live schedule per key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

struct ScheduledTask {
    task_id: u64,
    handle: JoinHandle<()>,
}

/// Handle-per-key scheduler for recurring callbacks.
#[derive(Clone)]
pub struct PollScheduler {
    tasks: Arc<TokioMutex<HashMap<String, ScheduledTask>>>,
    next_task_id: Arc<AtomicU64>,
}

impl PollScheduler {
    pub fn new() -> Self {
        PollScheduler {
            tasks: Arc::new(TokioMutex::new(HashMap::new())),
            next_task_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `tick` every `period` under `key` until it returns `false`.
    ///
    /// The first invocation happens one full period after scheduling. Any
    /// task already scheduled under the key is cancelled first. Returns the
    /// task id of the new schedule.
    pub async fn schedule<F>(&self, key: &str, period: Duration, mut tick: F) -> u64
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let tasks = self.tasks.clone();
        let owned_key = key.to_string();

        let handle = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // An interval's first tick completes immediately; skip it so the
            // callback cadence starts one period from now.
            timer.tick().await;
            loop {
                timer.tick().await;
                if !tick() {
                    break;
                }
            }
            // Natural completion: remove our own entry, but never one a
            // reschedule has since replaced.
            let mut tasks = tasks.lock().await;
            if tasks.get(&owned_key).map(|t| t.task_id) == Some(task_id) {
                tasks.remove(&owned_key);
            }
        });

        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.insert(key.to_string(), ScheduledTask { task_id, handle }) {
            previous.handle.abort();
            debug!("Replaced existing schedule under {}", key);
        }

        task_id
    }

    /// Cancel the schedule under `key` if one is active.
    ///
    /// Idempotent; returns whether anything was cancelled.
    pub async fn cancel(&self, key: &str) -> bool {
        match self.tasks.lock().await.remove(key) {
            Some(task) => {
                task.handle.abort();
                true
            }
            None => false,
        }
    }

    pub async fn is_scheduled(&self, key: &str) -> bool {
        self.tasks.lock().await.contains_key(key)
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}
