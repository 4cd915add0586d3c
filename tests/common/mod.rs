// Common test utilities for integration tests
// This module contains shared code for all integration tests

// Standard library imports
use std::sync::Arc;
use std::sync::Once;

// External crate imports
use log::LevelFilter;

// Import the crate functionality
use chalkcast::models::{MessageStatus, ReadReceipt, ReceivedMessage, SentMessage};
use chalkcast::store::{MemoryStorage, MessageStore};

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .init();
    });
}

/// A fresh store over in-memory storage
pub fn memory_store() -> MessageStore {
    MessageStore::new(Arc::new(MemoryStorage::new()))
}

/// A sent-side notice record in its initial state
pub fn sent_message(id: &str, content: &str, timestamp: i64) -> SentMessage {
    SentMessage {
        id: id.to_string(),
        content: content.to_string(),
        sender: "Teacher".to_string(),
        timestamp,
        status: MessageStatus::Sent,
        read_receipts: Vec::new(),
    }
}

/// A received-side notice record as a receiver would store it
pub fn received_message(id: &str, content: &str, timestamp: i64) -> ReceivedMessage {
    ReceivedMessage {
        id: id.to_string(),
        content: content.to_string(),
        sender: "Teacher".to_string(),
        timestamp,
        status: MessageStatus::Delivered,
        received_at: timestamp + 5,
    }
}

/// A read receipt from the given receiver for the given notice
pub fn receipt(message_id: &str, receiver_id: &str, read_time: i64) -> ReadReceipt {
    ReadReceipt {
        receiver_id: receiver_id.to_string(),
        message_id: message_id.to_string(),
        read_time,
        device_info: "test-device (linux x86_64)".to_string(),
    }
}
