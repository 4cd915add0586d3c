// End-to-end notice flow tests
// These tests drive the full sender -> broadcast -> receiver -> receipt ->
// reconciliation loop through the real components, with the loopback
// transport standing in for the receipt ping.

// Import common test utilities
mod common;
use common::{memory_store, setup_logging};

use std::sync::{Arc, Mutex};

use chalkcast::channel::receipt_link::{feedback_url, parse_receipt_url};
use chalkcast::channel::{BroadcastChannel, LoopbackTransport, ReceiptMailbox};
use chalkcast::messaging::{NoticeReceiver, NoticeSender};
use chalkcast::models::{MessageStatus, ReadReceipt};
use tokio::time::{sleep, Duration};

const FEEDBACK_BASE: &str = "http://localhost/send";

#[tokio::test]
async fn single_receiver_scenario() {
    setup_logging();

    // Sender and receiver share one store, as two pages of the same origin do.
    let store = memory_store();
    let channel = BroadcastChannel::new();
    let mailbox = ReceiptMailbox::new();
    let transport = Arc::new(LoopbackTransport::new(mailbox.clone()));

    let sender = NoticeSender::new(store.clone(), channel.clone());
    let (receiver, mut events) =
        NoticeReceiver::new(store.clone(), channel.clone(), transport, FEEDBACK_BASE)
            .expect("receiver");
    let receiver = Arc::new(receiver);
    {
        let receiver = receiver.clone();
        tokio::spawn(async move {
            receiver.run().await;
        });
    }
    sleep(Duration::from_millis(20)).await;

    // Send: one sent record, status sent.
    let message = sender.send("Test A").expect("send");
    let sent = store.sent_messages().expect("sent");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].status, MessageStatus::Sent);

    // Broadcast: the receiver stores a delivered copy and emits an event.
    sender.broadcast(&message).await.expect("broadcast");
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event within deadline")
        .expect("event");
    assert_eq!(event.id, message.id);
    assert_eq!(event.status, MessageStatus::Delivered);

    let received = store.received_messages().expect("received");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].status, MessageStatus::Delivered);
    assert!(received[0].received_at >= message.timestamp);

    // Receipt: the receiver's copy goes to read, the sender's to delivered.
    let receipt = receiver
        .send_read_receipt(&message.id)
        .await
        .expect("receipt")
        .expect("receipt present");
    assert_eq!(receipt.receiver_id, receiver.device_id());

    let sent = store.get_message_by_id(&message.id).unwrap().unwrap();
    assert_eq!(sent.status, MessageStatus::Delivered);
    assert_eq!(sent.read_receipts.len(), 1);

    let received = store.received_messages().expect("received");
    assert_eq!(received[0].status, MessageStatus::Read);

    // The ping lands in the mailbox; ingesting it is idempotent against the
    // already-reconciled receipt.
    sleep(Duration::from_millis(50)).await;
    assert!(!mailbox.is_empty().await);
    sender
        .ingest_pending_receipts(&mailbox)
        .await
        .expect("ingest");
    assert!(mailbox.is_empty().await);

    let sent = store.get_message_by_id(&message.id).unwrap().unwrap();
    assert_eq!(sent.read_receipts.len(), 1, "same receiver never counts twice");
    assert_eq!(sent.status, MessageStatus::Delivered);
}

#[tokio::test]
async fn two_receivers_leave_the_sender_at_delivered() {
    setup_logging();

    // Distinct devices hold distinct stores; only the channel is shared.
    let sender_store = memory_store();
    let channel = BroadcastChannel::new();
    let mailbox = ReceiptMailbox::new();

    let sender = NoticeSender::new(sender_store.clone(), channel.clone());

    let mut receivers = Vec::new();
    for _ in 0..2 {
        let store = memory_store();
        let transport = Arc::new(LoopbackTransport::new(mailbox.clone()));
        let (receiver, _events) =
            NoticeReceiver::new(store.clone(), channel.clone(), transport, FEEDBACK_BASE)
                .expect("receiver");
        let receiver = Arc::new(receiver);
        {
            let receiver = receiver.clone();
            tokio::spawn(async move {
                receiver.run().await;
            });
        }
        receivers.push((store, receiver));
    }
    assert_ne!(
        receivers[0].1.device_id(),
        receivers[1].1.device_id(),
        "each device mints its own identity"
    );
    sleep(Duration::from_millis(20)).await;

    let message = sender.send("Assembly at noon").expect("send");
    sender.broadcast(&message).await.expect("broadcast");
    sleep(Duration::from_millis(100)).await;

    for (store, receiver) in &receivers {
        let received = store.received_messages().expect("received");
        assert_eq!(received.len(), 1);

        receiver
            .send_read_receipt(&message.id)
            .await
            .expect("receipt")
            .expect("receipt present");

        // The receiver's own copy flips to read even though it holds no
        // sent record to reconcile.
        let received = store.received_messages().expect("received");
        assert_eq!(received[0].status, MessageStatus::Read);
        assert!(store.sent_messages().expect("sent").is_empty());
    }

    // Both pings arrive over the side channel and reconcile on the sender.
    sleep(Duration::from_millis(50)).await;
    let applied = sender
        .ingest_pending_receipts(&mailbox)
        .await
        .expect("ingest");
    assert_eq!(applied, 2);

    let sent = sender_store.get_message_by_id(&message.id).unwrap().unwrap();
    assert_eq!(sent.read_receipts.len(), 2);
    // Receipts only ever imply delivery; the sender never reaches read
    // through this path.
    assert_eq!(sent.status, MessageStatus::Delivered);
}

#[tokio::test]
async fn malformed_broadcast_payload_is_dropped() {
    setup_logging();
    let store = memory_store();
    let channel = BroadcastChannel::new();
    let transport = Arc::new(LoopbackTransport::new(ReceiptMailbox::new()));
    let (receiver, _events) =
        NoticeReceiver::new(store.clone(), channel, transport, FEEDBACK_BASE).expect("receiver");

    let outcome = receiver
        .handle_broadcast("this is not an envelope")
        .await
        .expect("malformed payload is not fatal");
    assert!(outcome.is_none());
    assert!(store.received_messages().expect("received").is_empty());
}

#[tokio::test]
async fn malformed_receipt_addresses_are_ignored() {
    setup_logging();
    let store = memory_store();
    let sender = NoticeSender::new(store.clone(), BroadcastChannel::new());

    for address in [
        "not a url at all",
        "http://localhost/send",
        "http://localhost/send?action=something_else&messageId=m&receiverId=r&timestamp=1",
        "http://localhost/send?action=read_receipt&receiverId=r&timestamp=1",
        "http://localhost/send?action=read_receipt&messageId=m&timestamp=1",
        "http://localhost/send?action=read_receipt&messageId=m&receiverId=r&timestamp=soon",
    ] {
        let outcome = sender.ingest_receipt_from_url(address).expect("ingest");
        assert!(outcome.is_none(), "{} must be dropped", address);
    }

    assert!(store.read_receipts().expect("receipts").is_empty());
}

#[tokio::test]
async fn feedback_url_round_trips_awkward_device_info() {
    setup_logging();
    let receipt = ReadReceipt {
        receiver_id: "classroom_a1b2c3d4e".to_string(),
        message_id: "msg_1700000000000_ab12cd34".to_string(),
        read_time: 1_700_000_123_456,
        device_info: "lab pc #7 (linux x86_64) & más".to_string(),
    };

    let url = feedback_url("http://localhost/send", &receipt).expect("url");
    let parsed = parse_receipt_url(&url).expect("parse back");

    assert_eq!(parsed.receiver_id, receipt.receiver_id);
    assert_eq!(parsed.message_id, receipt.message_id);
    assert_eq!(parsed.read_time, receipt.read_time);
    assert_eq!(parsed.device_info, receipt.device_info);
}

#[tokio::test]
async fn missing_device_info_defaults_to_unknown() {
    setup_logging();
    let parsed = parse_receipt_url(
        "http://localhost/send?action=read_receipt&messageId=msg_1&receiverId=classroom_x&timestamp=42",
    )
    .expect("parse");

    assert_eq!(parsed.device_info, "unknown");
    assert_eq!(parsed.read_time, 42);
}

#[tokio::test]
async fn empty_message_id_yields_no_receipt() {
    setup_logging();
    let store = memory_store();
    let channel = BroadcastChannel::new();
    let transport = Arc::new(LoopbackTransport::new(ReceiptMailbox::new()));
    let (receiver, _events) =
        NoticeReceiver::new(store.clone(), channel, transport, FEEDBACK_BASE).expect("receiver");

    let outcome = receiver.send_read_receipt("").await.expect("no-op");
    assert!(outcome.is_none());
    assert!(store.read_receipts().expect("receipts").is_empty());
}

#[tokio::test]
async fn status_poll_reports_updates_and_stops_at_read() {
    setup_logging();
    let store = memory_store();
    let sender = NoticeSender::new(store.clone(), BroadcastChannel::new());

    let message = sender.send("Poll me").expect("send");
    let observed = Arc::new(Mutex::new(Vec::new()));

    let sink = observed.clone();
    sender
        .poll_status(&message.id, Duration::from_millis(20), move |snapshot| {
            sink.lock().unwrap().push(snapshot.status);
        })
        .await;

    sleep(Duration::from_millis(50)).await;
    assert!(store
        .update_sent_message_status(&message.id, MessageStatus::Read)
        .expect("update"));
    sleep(Duration::from_millis(100)).await;

    let statuses = observed.lock().unwrap().clone();
    assert!(statuses.contains(&MessageStatus::Sent));
    assert_eq!(statuses.last(), Some(&MessageStatus::Read));

    // The poll ended on its own once the notice was read.
    assert!(!sender.stop_polling(&message.id).await);
}
