//! Transient pub/sub broadcast.
//!
//! A publish is a momentary signal, not a queue entry: the payload is fanned
//! out to current subscribers and parked in a per-topic slot that a spawned
//! task retracts after the TTL, so a consumer arriving later does not replay
//! it. Absence of a slot means "no active broadcast", never an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::Duration;

/// How long a published payload stays current before retraction.
pub const BROADCAST_TTL: Duration = Duration::from_millis(100);

/// Topic notices are broadcast on.
pub const NOTICE_TOPIC: &str = "notice_broadcast";

/// Per-subscriber buffer before fan-out drops a payload.
const SUBSCRIBER_BUFFER: usize = 32;

struct TopicSlot {
    payload: String,
    generation: u64,
}

/// Same-origin broadcast channel with TTL retraction.
#[derive(Clone)]
pub struct BroadcastChannel {
    slots: Arc<TokioMutex<HashMap<String, TopicSlot>>>,
    subscribers: Arc<TokioMutex<HashMap<String, Vec<mpsc::Sender<String>>>>>,
    generation: Arc<AtomicU64>,
    ttl: Duration,
}

impl BroadcastChannel {
    pub fn new() -> Self {
        Self::with_ttl(BROADCAST_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        BroadcastChannel {
            slots: Arc::new(TokioMutex::new(HashMap::new())),
            subscribers: Arc::new(TokioMutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            ttl,
        }
    }

    /// Publish a payload on a topic.
    ///
    /// Current subscribers are notified immediately; the payload then stays
    /// readable via [`current`](Self::current) until the TTL retracts it,
    /// unless a newer publish replaces it first.
    pub async fn publish(&self, topic: &str, payload: String) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        {
            let mut slots = self.slots.lock().await;
            slots.insert(
                topic.to_string(),
                TopicSlot {
                    payload: payload.clone(),
                    generation,
                },
            );
        }

        {
            let mut subscribers = self.subscribers.lock().await;
            if let Some(list) = subscribers.get_mut(topic) {
                list.retain(|tx| match tx.try_send(payload.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("Subscriber on {} is full; payload dropped for it", topic);
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                });
            }
        }

        // Retract after the TTL, but only if no newer publish replaced us.
        let slots = self.slots.clone();
        let topic = topic.to_string();
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut slots = slots.lock().await;
            if slots.get(&topic).map(|slot| slot.generation) == Some(generation) {
                slots.remove(&topic);
                debug!("Retracted broadcast on {}", topic);
            }
        });
    }

    /// Subscribe to future publishes on a topic.
    pub async fn subscribe(&self, topic: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers
            .lock()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// The payload currently parked on a topic, if its TTL has not expired.
    pub async fn current(&self, topic: &str) -> Option<String> {
        self.slots
            .lock()
            .await
            .get(topic)
            .map(|slot| slot.payload.clone())
    }
}

impl Default for BroadcastChannel {
    fn default() -> Self {
        Self::new()
    }
}
