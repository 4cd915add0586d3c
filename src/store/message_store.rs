//! The notice record store: three collections plus receipt reconciliation.
//!
//! Every operation is a synchronous read-modify-write of a whole collection.
//! There is no partial or indexed update facility; two processes sharing a
//! file-backed store race last-write-wins, which is accepted for the local
//! single-user deployment this serves.

use std::sync::Arc;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{MessageStatus, ReadReceipt, ReceivedMessage, SentMessage};

use super::{
    Storage, StoreError, DEVICE_ID_KEY, READ_RECEIPTS_KEY, RECEIVED_MESSAGES_KEY,
    RECEIVED_MESSAGE_CAP, REGISTERED_DEVICES_KEY, SENT_MESSAGES_KEY,
};

/// Store for sent messages, received messages and read receipts.
#[derive(Clone)]
pub struct MessageStore {
    storage: Arc<dyn Storage>,
}

impl MessageStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        MessageStore { storage }
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        match self.storage.get(key)? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), StoreError> {
        self.storage.set(key, &serde_json::to_string(items)?)
    }

    /// Append a sent message. The caller guarantees id uniqueness.
    pub fn save_message(&self, message: &SentMessage) -> Result<(), StoreError> {
        let mut messages = self.sent_messages()?;
        messages.push(message.clone());
        self.write_list(SENT_MESSAGES_KEY, &messages)
    }

    /// Upsert a received message by id.
    ///
    /// An existing record with the same id is replaced by the new one; a
    /// fresh insert evicts the oldest entries while the collection is over
    /// its retention bound.
    pub fn save_received_message(&self, message: &ReceivedMessage) -> Result<(), StoreError> {
        let mut messages = self.received_messages()?;

        match messages.iter().position(|m| m.id == message.id) {
            Some(index) => {
                messages[index] = message.clone();
            }
            None => {
                messages.push(message.clone());
                while messages.len() > RECEIVED_MESSAGE_CAP {
                    let evicted = messages.remove(0);
                    debug!("Evicted received message {} past retention bound", evicted.id);
                }
            }
        }

        self.write_list(RECEIVED_MESSAGES_KEY, &messages)
    }

    /// Record a read receipt and propagate its effects to both sides.
    ///
    /// The receipt collection itself takes duplicates as-is; per-receiver
    /// de-duplication happens during sent-side reconciliation.
    pub fn save_read_receipt(&self, receipt: &ReadReceipt) -> Result<(), StoreError> {
        let mut receipts = self.read_receipts()?;
        receipts.push(receipt.clone());
        self.write_list(READ_RECEIPTS_KEY, &receipts)?;

        // The receiver's own copy of the notice goes straight to read.
        let mut received = self.received_messages()?;
        if let Some(message) = received.iter_mut().find(|m| m.id == receipt.message_id) {
            message.status = MessageStatus::Read;
            self.write_list(RECEIVED_MESSAGES_KEY, &received)?;
        }

        self.apply_receipt_to_sent(receipt)
    }

    /// Reconcile a receipt into the sent-side view of the notice.
    ///
    /// No-op when no sent message matches: the receipt may have been
    /// recorded on a store that never sent the notice, which is expected.
    /// Idempotent per `(message_id, receiver_id)` pair.
    pub fn apply_receipt_to_sent(&self, receipt: &ReadReceipt) -> Result<(), StoreError> {
        let mut messages = self.sent_messages()?;

        let message = match messages.iter_mut().find(|m| m.id == receipt.message_id) {
            Some(message) => message,
            None => {
                debug!(
                    "No sent message {} on this store; receipt from {} not reconciled",
                    receipt.message_id, receipt.receiver_id
                );
                return Ok(());
            }
        };

        if !message
            .read_receipts
            .iter()
            .any(|r| r.receiver_id == receipt.receiver_id)
        {
            message.read_receipts.push(receipt.clone());
            info!(
                "Receipt from {} recorded for {} ({} total)",
                receipt.receiver_id,
                receipt.message_id,
                message.read_receipts.len()
            );
        }

        // Any receipt forces at least delivered; never regress from read.
        if message.status != MessageStatus::Delivered && message.status != MessageStatus::Read {
            message.status = MessageStatus::Delivered;
        }

        self.write_list(SENT_MESSAGES_KEY, &messages)
    }

    /// Linear search of the sent collection.
    pub fn get_message_by_id(&self, id: &str) -> Result<Option<SentMessage>, StoreError> {
        Ok(self.sent_messages()?.into_iter().find(|m| m.id == id))
    }

    /// Overwrite the status of a sent message.
    ///
    /// Returns `false` when no message matches the id. This is deliberately
    /// limited to the status field so the receipt list stays append-only.
    pub fn update_sent_message_status(
        &self,
        id: &str,
        status: MessageStatus,
    ) -> Result<bool, StoreError> {
        let mut messages = self.sent_messages()?;

        match messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.status = status;
            }
            None => return Ok(false),
        }

        self.write_list(SENT_MESSAGES_KEY, &messages)?;
        Ok(true)
    }

    pub fn sent_messages(&self) -> Result<Vec<SentMessage>, StoreError> {
        self.read_list(SENT_MESSAGES_KEY)
    }

    pub fn received_messages(&self) -> Result<Vec<ReceivedMessage>, StoreError> {
        self.read_list(RECEIVED_MESSAGES_KEY)
    }

    pub fn read_receipts(&self) -> Result<Vec<ReadReceipt>, StoreError> {
        self.read_list(READ_RECEIPTS_KEY)
    }

    /// Read an auxiliary single-value entry.
    pub fn get_entry(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage.get(key)
    }

    /// Write an auxiliary single-value entry.
    pub fn set_entry(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.storage.set(key, value)
    }

    /// Remove the three collections and the auxiliary device entries.
    pub fn clear_all_data(&self) -> Result<(), StoreError> {
        for key in [
            SENT_MESSAGES_KEY,
            RECEIVED_MESSAGES_KEY,
            READ_RECEIPTS_KEY,
            REGISTERED_DEVICES_KEY,
            DEVICE_ID_KEY,
        ] {
            self.storage.remove(key)?;
        }
        info!("Cleared all notice collections");
        Ok(())
    }
}
