//! Receipt delivery over a query-parameter side channel.
//!
//! A receiver announces a read receipt by requesting the sender's address
//! with the receipt encoded in query parameters; the sender recovers the
//! receipt by inspecting that address. Delivery is best-effort: the caller
//! fires it, logs the outcome, and never retries.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::Url;
use tokio::sync::Mutex as TokioMutex;

use crate::models::ReadReceipt;

/// Value of the `action` parameter marking a receipt request.
pub const READ_RECEIPT_ACTION: &str = "read_receipt";

/// Build the feedback URL carrying a receipt back to the sender.
pub fn feedback_url(base: &str, receipt: &ReadReceipt) -> Result<String> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .append_pair("action", READ_RECEIPT_ACTION)
        .append_pair("messageId", &receipt.message_id)
        .append_pair("receiverId", &receipt.receiver_id)
        .append_pair("timestamp", &receipt.read_time.to_string())
        .append_pair("deviceInfo", &receipt.device_info);
    Ok(url.to_string())
}

/// Recover a receipt from an address, if it carries one.
///
/// Returns `None` (with a diagnostic log, never an error) unless the
/// address parses, carries `action=read_receipt`, and has the message id,
/// receiver id and a numeric timestamp. A missing device descriptor falls
/// back to `"unknown"`.
pub fn parse_receipt_url(address: &str) -> Option<ReadReceipt> {
    let url = match Url::parse(address) {
        Ok(url) => url,
        Err(e) => {
            debug!("Ignoring unparseable receipt address: {}", e);
            return None;
        }
    };

    let mut action = None;
    let mut message_id = None;
    let mut receiver_id = None;
    let mut timestamp = None;
    let mut device_info = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "action" => action = Some(value.into_owned()),
            "messageId" => message_id = Some(value.into_owned()),
            "receiverId" => receiver_id = Some(value.into_owned()),
            "timestamp" => timestamp = Some(value.into_owned()),
            "deviceInfo" => device_info = Some(value.into_owned()),
            _ => {}
        }
    }

    if action.as_deref() != Some(READ_RECEIPT_ACTION) {
        return None;
    }

    let message_id = match message_id {
        Some(id) if !id.is_empty() => id,
        _ => {
            debug!("Receipt address missing messageId; dropped");
            return None;
        }
    };
    let receiver_id = match receiver_id {
        Some(id) if !id.is_empty() => id,
        _ => {
            debug!("Receipt address missing receiverId; dropped");
            return None;
        }
    };
    let read_time = match timestamp.as_deref().map(str::parse::<i64>) {
        Some(Ok(read_time)) => read_time,
        _ => {
            debug!("Receipt address has no usable timestamp; dropped");
            return None;
        }
    };

    Some(ReadReceipt {
        receiver_id,
        message_id,
        read_time,
        device_info: device_info.unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Best-effort delivery of a feedback URL toward the sender.
///
/// Implementations must not be relied on for completion signaling: callers
/// fire `deliver` without awaiting a business result and only log failures.
#[async_trait]
pub trait ReceiptTransport: Send + Sync {
    async fn deliver(&self, url: &str) -> Result<()>;
}

/// Delivers receipts by requesting the feedback URL over HTTP.
///
/// The response body is irrelevant; reaching the address at all is the
/// signal, as with an image ping.
pub struct HttpPingTransport {
    client: reqwest::Client,
}

impl HttpPingTransport {
    pub fn new() -> Self {
        HttpPingTransport {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpPingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReceiptTransport for HttpPingTransport {
    async fn deliver(&self, url: &str) -> Result<()> {
        let response = self.client.get(url).send().await?;
        debug!("Receipt ping answered with {}", response.status());
        Ok(())
    }
}

/// Queue of feedback URLs delivered in-process.
///
/// Stands in for the sender page's address when both ends share a process:
/// the transport pushes URLs here and the sender drains them on activation.
/// Draining consumes the entries, so a second pass cannot reapply them.
#[derive(Clone, Default)]
pub struct ReceiptMailbox {
    entries: Arc<TokioMutex<Vec<String>>>,
}

impl ReceiptMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, url: String) {
        self.entries.lock().await.push(url);
    }

    /// Take every queued URL, leaving the mailbox empty.
    pub async fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.lock().await)
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// In-process transport delivering into a [`ReceiptMailbox`].
pub struct LoopbackTransport {
    mailbox: ReceiptMailbox,
}

impl LoopbackTransport {
    pub fn new(mailbox: ReceiptMailbox) -> Self {
        LoopbackTransport { mailbox }
    }
}

#[async_trait]
impl ReceiptTransport for LoopbackTransport {
    async fn deliver(&self, url: &str) -> Result<()> {
        self.mailbox.push(url.to_string()).await;
        Ok(())
    }
}
