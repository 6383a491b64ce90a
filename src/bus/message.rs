use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::queue::message::now_micros;

/// A published payload as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: Uuid,
    pub event: String,
    pub payload: serde_json::Value,
    /// Microseconds since the Unix epoch.
    pub published_at: u64,
}

impl EventMessage {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event: event.into(),
            payload,
            published_at: now_micros(),
        }
    }

    pub fn to_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_body(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}
