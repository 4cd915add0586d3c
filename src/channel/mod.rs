//! Side channels between sender and receiver.
//!
//! Two mechanisms stand in for a network: a transient pub/sub broadcast with
//! publish-then-retract TTL semantics ([`BroadcastChannel`]), and a
//! best-effort receipt ping carrying its data in URL query parameters
//! ([`receipt_link`]).

pub mod broadcast;
pub mod receipt_link;

pub use broadcast::{BroadcastChannel, BROADCAST_TTL, NOTICE_TOPIC};
pub use receipt_link::{
    feedback_url, parse_receipt_url, HttpPingTransport, LoopbackTransport, ReceiptMailbox,
    ReceiptTransport,
};
