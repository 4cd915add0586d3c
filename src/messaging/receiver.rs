//! The receiving side: observe broadcasts, keep the local notice list, and
//! answer with read receipts.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use log::{debug, error, warn};
use tokio::sync::mpsc;

use crate::channel::receipt_link::feedback_url;
use crate::channel::{BroadcastChannel, ReceiptTransport, NOTICE_TOPIC};
use crate::models::{BroadcastEnvelope, MessageStatus, ReadReceipt, ReceivedMessage};
use crate::store::MessageStore;

use super::device;

/// Buffer of new-message events before the consumer falls behind.
const EVENT_BUFFER: usize = 32;

/// Receives broadcast notices and emits read receipts.
pub struct NoticeReceiver {
    store: MessageStore,
    channel: BroadcastChannel,
    transport: Arc<dyn ReceiptTransport>,
    /// Address of the sending side, targeted by receipt delivery.
    feedback_base: String,
    events: mpsc::Sender<ReceivedMessage>,
    device_id: String,
}

impl NoticeReceiver {
    /// Bind a receiver to its store, broadcast channel and receipt transport.
    ///
    /// Resolves (or mints) the persistent device id, and returns the
    /// new-message event stream consumers refresh from.
    pub fn new(
        store: MessageStore,
        channel: BroadcastChannel,
        transport: Arc<dyn ReceiptTransport>,
        feedback_base: &str,
    ) -> Result<(Self, mpsc::Receiver<ReceivedMessage>)> {
        let device_id = device::get_or_create_device_id(&store)?;
        let (events, events_rx) = mpsc::channel(EVENT_BUFFER);

        Ok((
            NoticeReceiver {
                store,
                channel,
                transport,
                feedback_base: feedback_base.to_string(),
                events,
                device_id,
            },
            events_rx,
        ))
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Consume broadcasts until the channel closes.
    ///
    /// Runs for the lifetime of the receiving side; there is no cancellation.
    pub async fn run(&self) {
        let mut broadcasts = self.channel.subscribe(NOTICE_TOPIC).await;
        while let Some(payload) = broadcasts.recv().await {
            if let Err(e) = self.handle_broadcast(&payload).await {
                error!("Failed to store broadcast notice: {}", e);
            }
        }
        debug!("Broadcast subscription closed");
    }

    /// Upsert one broadcast payload into the received collection.
    ///
    /// A payload that does not parse is dropped with a log line; a bad
    /// broadcast must never take the receiver down. Successful receives are
    /// emitted on the new-message event stream.
    pub async fn handle_broadcast(&self, payload: &str) -> Result<Option<ReceivedMessage>> {
        let envelope: BroadcastEnvelope = match serde_json::from_str(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("Failed to parse broadcast payload: {}", e);
                return Ok(None);
            }
        };

        let message = ReceivedMessage {
            id: envelope.message.id,
            content: envelope.message.content,
            sender: envelope.message.sender,
            timestamp: envelope.message.timestamp,
            status: MessageStatus::Delivered,
            received_at: Utc::now().timestamp_millis(),
        };

        self.store.save_received_message(&message)?;

        if let Err(e) = self.events.try_send(message.clone()) {
            debug!("New-message event not delivered: {}", e);
        }

        Ok(Some(message))
    }

    /// Record that this device read a notice and tell the sender about it.
    ///
    /// The receipt is persisted locally first and stands regardless of what
    /// happens to delivery; the delivery itself is fired off best-effort and
    /// only logged. An empty id is a no-op returning `None`.
    pub async fn send_read_receipt(&self, message_id: &str) -> Result<Option<ReadReceipt>> {
        if message_id.is_empty() {
            return Ok(None);
        }

        let receipt = ReadReceipt {
            receiver_id: self.device_id.clone(),
            message_id: message_id.to_string(),
            read_time: Utc::now().timestamp_millis(),
            device_info: device::local_device_info(),
        };

        self.store.save_read_receipt(&receipt)?;

        match feedback_url(&self.feedback_base, &receipt) {
            Ok(url) => {
                let transport = self.transport.clone();
                tokio::spawn(async move {
                    match transport.deliver(&url).await {
                        Ok(()) => debug!("Read receipt delivered"),
                        Err(e) => warn!("Read receipt delivery failed: {}", e),
                    }
                });
            }
            Err(e) => warn!("Could not build feedback address: {}", e),
        }

        Ok(Some(receipt))
    }

    /// Received notices, newest first.
    ///
    /// The sort is stable, so notices with equal timestamps keep their
    /// insertion order.
    pub fn list_all_messages(&self) -> Result<Vec<ReceivedMessage>> {
        let mut messages = self.store.received_messages()?;
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(messages)
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }
}
