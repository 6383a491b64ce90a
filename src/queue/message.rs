use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Entry stored in a [`MessageQueue`](super::MessageQueue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub payload: serde_json::Value,
    /// Microseconds since the Unix epoch.
    pub enqueued_at: u64,
}

impl Message {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            enqueued_at: now_micros(),
        }
    }
}

pub(crate) fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}
