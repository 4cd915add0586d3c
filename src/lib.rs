// Re-export needed modules for testing
pub mod channel;
pub mod messaging;
pub mod models;
pub mod store;

// Re-export main types for convenience
pub use channel::{BroadcastChannel, ReceiptMailbox};
pub use messaging::{NoticeReceiver, NoticeSender};
pub use models::*;
pub use store::{MessageStore, StoreError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_status_ordering_labels() {
        // The three states a sent notice can be in
        let sent = MessageStatus::Sent;
        let delivered = MessageStatus::Delivered;
        let read = MessageStatus::Read;

        assert_ne!(sent, delivered);
        assert_ne!(delivered, read);

        // Stored format uses lowercase labels
        assert_eq!(serde_json::to_string(&sent).unwrap(), "\"sent\"");
        assert_eq!(serde_json::to_string(&delivered).unwrap(), "\"delivered\"");
        assert_eq!(serde_json::to_string(&read).unwrap(), "\"read\"");
    }

    #[test]
    fn test_sent_message_creation() {
        let msg = SentMessage {
            id: "msg_1700000000000_ab12cd34".to_string(),
            content: "Class starts in five minutes".to_string(),
            sender: "Teacher".to_string(),
            timestamp: 1700000000000,
            status: MessageStatus::Sent,
            read_receipts: Vec::new(),
        };

        assert_eq!(msg.id, "msg_1700000000000_ab12cd34");
        assert_eq!(msg.content, "Class starts in five minutes");
        assert_eq!(msg.sender, "Teacher");
        assert_eq!(msg.timestamp, 1700000000000);
        assert_eq!(msg.status, MessageStatus::Sent);
        assert!(msg.read_receipts.is_empty());
    }

    #[test]
    fn test_record_field_names_in_stored_format() {
        // Persisted records carry camelCase field names
        let receipt = ReadReceipt {
            receiver_id: "classroom_a1b2c3d4e".to_string(),
            message_id: "msg_1".to_string(),
            read_time: 1700000001000,
            device_info: "lab-pc (linux x86_64)".to_string(),
        };

        let encoded = serde_json::to_string(&receipt).unwrap();
        assert!(encoded.contains("\"receiverId\""));
        assert!(encoded.contains("\"messageId\""));
        assert!(encoded.contains("\"readTime\""));
        assert!(encoded.contains("\"deviceInfo\""));

        let decoded: ReadReceipt = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.receiver_id, receipt.receiver_id);
        assert_eq!(decoded.read_time, receipt.read_time);
    }

    #[test]
    fn test_broadcast_envelope_round_trip() {
        let envelope = BroadcastEnvelope {
            message: SentMessage {
                id: "msg_7".to_string(),
                content: "Homework posted".to_string(),
                sender: "Teacher".to_string(),
                timestamp: 1700000000000,
                status: MessageStatus::Sent,
                read_receipts: Vec::new(),
            },
            timestamp: 1700000000123,
        };

        let payload = serde_json::to_string(&envelope).unwrap();
        let decoded: BroadcastEnvelope = serde_json::from_str(&payload).unwrap();

        assert_eq!(decoded.message.id, "msg_7");
        assert_eq!(decoded.message.content, "Homework posted");
        assert_eq!(decoded.timestamp, 1700000000123);
    }
}
