use serde::{Deserialize, Serialize};

/// Delivery state of a notice.
///
/// Sent-side records move along `Sent -> Delivered -> Read`; received-side
/// records only ever hold `Delivered` or `Read`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,      // Persisted locally, not yet confirmed by any receiver
    Delivered, // At least one receiver confirmed the notice
    Read,      // Marked read (receiver-local; sender side only via explicit update)
}

/// A notice as recorded by the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id: String,
    pub content: String,
    pub sender: String,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
    pub status: MessageStatus,
    /// At most one receipt per distinct receiver.
    pub read_receipts: Vec<ReadReceipt>,
}

/// A notice as recorded by a receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessage {
    pub id: String,
    pub content: String,
    pub sender: String,
    /// Creation time on the sender, epoch milliseconds.
    pub timestamp: i64,
    pub status: MessageStatus,
    /// Local receive time, epoch milliseconds.
    pub received_at: i64,
}

/// A receiver's assertion that it observed a specific notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub receiver_id: String,
    pub message_id: String,
    /// When the receiver marked the notice read, epoch milliseconds.
    pub read_time: i64,
    /// Free-form device descriptor, not validated.
    pub device_info: String,
}

/// Payload carried on the broadcast topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    pub message: SentMessage,
    pub timestamp: i64,
}
