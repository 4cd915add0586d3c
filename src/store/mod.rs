//! Persistence for the notice collections.
//!
//! Three collections are kept as text-encoded lists under well-known keys
//! (sent messages, received messages, read receipts), plus a handful of
//! auxiliary single-value entries (device id, registered devices, sender
//! display name). Backends implement the [`backend::Storage`] trait;
//! [`MessageStore`] layers the collection operations and receipt
//! reconciliation on top.

use thiserror::Error;

pub mod backend;
pub mod message_store;

pub use backend::{FileStorage, MemoryStorage, Storage};
pub use message_store::MessageStore;

/// Key for the sent-message collection.
pub const SENT_MESSAGES_KEY: &str = "sent_messages";

/// Key for the received-message collection.
pub const RECEIVED_MESSAGES_KEY: &str = "received_messages";

/// Key for the read-receipt collection.
pub const READ_RECEIPTS_KEY: &str = "read_receipts";

/// Key for the receiver's persisted device identifier.
pub const DEVICE_ID_KEY: &str = "device_id";

/// Key for the auxiliary device-registration collection.
pub const REGISTERED_DEVICES_KEY: &str = "registered_devices";

/// Key for the sender's persisted display name.
pub const SENDER_NAME_KEY: &str = "sender_name";

/// Received messages beyond this bound are evicted oldest-first.
pub const RECEIVED_MESSAGE_CAP: usize = 100;

/// Errors that can occur in storage operations.
///
/// A missing key is never an error: reads of absent entries come back as
/// `None` / an empty collection. Malformed stored text surfaces as
/// [`StoreError::Encoding`]; there is no repair logic.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure in a file-backed entry
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored text could not be decoded, or a record could not be encoded
    #[error("Storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}
