//! Receiver device identity.
//!
//! Each receiving session gets a stable random identifier, generated on
//! first activation and persisted in the store's `device_id` entry.

use log::info;
use rand::Rng;

use crate::store::{MessageStore, StoreError, DEVICE_ID_KEY};

/// Prefix marking identifiers minted by this tool.
pub const DEVICE_ID_PREFIX: &str = "classroom_";

const DEVICE_ID_SUFFIX_LEN: usize = 9;

/// Read the persisted device id, generating and persisting one on first use.
pub fn get_or_create_device_id(store: &MessageStore) -> Result<String, StoreError> {
    if let Some(device_id) = store.get_entry(DEVICE_ID_KEY)? {
        return Ok(device_id);
    }

    let device_id = generate_device_id();
    store.set_entry(DEVICE_ID_KEY, &device_id)?;
    info!("Generated device id {}", device_id);
    Ok(device_id)
}

/// Generate a random, prefixed device identifier.
pub fn generate_device_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..DEVICE_ID_SUFFIX_LEN)
        .map(|_| {
            let c = rng.sample(rand::distributions::Alphanumeric) as char;
            c.to_ascii_lowercase()
        })
        .collect();
    format!("{}{}", DEVICE_ID_PREFIX, suffix)
}

/// Free-form descriptor of this device, carried in receipts.
pub fn local_device_info() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown-host".to_string());
    format!("{} ({} {})", host, std::env::consts::OS, std::env::consts::ARCH)
}
