//! The sending side: create notices, broadcast them, watch their status,
//! and ingest read receipts arriving over the query-parameter side channel.

use anyhow::Result;
use chrono::Utc;
use log::{error, info};
use tokio::time::Duration;
use uuid::Uuid;

use crate::channel::{BroadcastChannel, ReceiptMailbox, NOTICE_TOPIC};
use crate::channel::receipt_link::parse_receipt_url;
use crate::models::{BroadcastEnvelope, MessageStatus, ReadReceipt, SentMessage};
use crate::store::{MessageStore, SENDER_NAME_KEY};

use super::scheduler::PollScheduler;

/// Display name recorded on notices until one is configured.
pub const DEFAULT_SENDER_NAME: &str = "Teacher";

/// Creates, broadcasts and tracks outgoing notices.
pub struct NoticeSender {
    store: MessageStore,
    channel: BroadcastChannel,
    scheduler: PollScheduler,
}

impl NoticeSender {
    pub fn new(store: MessageStore, channel: BroadcastChannel) -> Self {
        NoticeSender {
            store,
            channel,
            scheduler: PollScheduler::new(),
        }
    }

    /// Create and persist a new notice with a fresh unique id.
    pub fn send(&self, content: &str) -> Result<SentMessage> {
        let timestamp = Utc::now().timestamp_millis();
        let message = SentMessage {
            id: next_message_id(timestamp),
            content: content.to_string(),
            sender: self.sender_name()?,
            timestamp,
            status: MessageStatus::Sent,
            read_receipts: Vec::new(),
        };

        self.store.save_message(&message)?;
        info!("Created notice {}", message.id);
        Ok(message)
    }

    /// The persisted display name, or the default when none is set.
    pub fn sender_name(&self) -> Result<String> {
        Ok(self
            .store
            .get_entry(SENDER_NAME_KEY)?
            .unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()))
    }

    pub fn set_sender_name(&self, name: &str) -> Result<()> {
        self.store.set_entry(SENDER_NAME_KEY, name)?;
        Ok(())
    }

    /// Publish a notice to any receiver currently listening.
    ///
    /// The publish is a momentary signal; the channel retracts it after its
    /// TTL so a later arrival does not replay it.
    pub async fn broadcast(&self, message: &SentMessage) -> Result<()> {
        let envelope = BroadcastEnvelope {
            message: message.clone(),
            timestamp: Utc::now().timestamp_millis(),
        };
        self.channel
            .publish(NOTICE_TOPIC, serde_json::to_string(&envelope)?)
            .await;
        Ok(())
    }

    /// Re-read a notice every `period` and report it to `on_update`.
    ///
    /// Stops on its own once the notice reaches `Read`. Starting a poll for
    /// an id that is already being polled cancels the previous poll.
    pub async fn poll_status<F>(&self, message_id: &str, period: Duration, mut on_update: F) -> u64
    where
        F: FnMut(SentMessage) + Send + 'static,
    {
        let store = self.store.clone();
        let id = message_id.to_string();

        self.scheduler
            .schedule(message_id, period, move || match store.get_message_by_id(&id) {
                Ok(Some(message)) => {
                    let done = message.status == MessageStatus::Read;
                    on_update(message);
                    !done
                }
                Ok(None) => true,
                Err(e) => {
                    error!("Status poll for {} failed: {}", id, e);
                    true
                }
            })
            .await
    }

    /// Cancel the status poll for an id; returns whether one was active.
    pub async fn stop_polling(&self, message_id: &str) -> bool {
        self.scheduler.cancel(message_id).await
    }

    /// Ingest a read receipt carried in an address's query parameters.
    ///
    /// Returns the receipt when the address carried a well-formed
    /// `action=read_receipt` request; `None` (logged, not an error) for
    /// anything else. The address itself is consumed by the caller and never
    /// persisted, so reprocessing cannot apply it twice.
    pub fn ingest_receipt_from_url(&self, address: &str) -> Result<Option<ReadReceipt>> {
        let receipt = match parse_receipt_url(address) {
            Some(receipt) => receipt,
            None => return Ok(None),
        };

        self.store.save_read_receipt(&receipt)?;
        info!(
            "Ingested read receipt from {} for {}",
            receipt.receiver_id, receipt.message_id
        );
        Ok(Some(receipt))
    }

    /// Drain a receipt mailbox and ingest every entry.
    ///
    /// Draining clears the mailbox, so the side-channel payloads are
    /// consumed exactly once. Returns how many receipts were applied.
    pub async fn ingest_pending_receipts(&self, mailbox: &ReceiptMailbox) -> Result<usize> {
        let mut applied = 0;
        for address in mailbox.drain().await {
            if self.ingest_receipt_from_url(&address)?.is_some() {
                applied += 1;
            }
        }
        Ok(applied)
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }
}

/// Unique-with-high-probability notice id: creation time plus random suffix.
fn next_message_id(timestamp: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("msg_{}_{}", timestamp, &suffix[..8])
}
