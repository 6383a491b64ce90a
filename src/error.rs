//! Error type shared by the bus, the brokers and the RESP layer.

use thiserror::Error;

/// Errors returned by queuebus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// Event name is empty or not in the configured allow-list.
    #[error("invalid event name: '{0}'")]
    InvalidEvent(String),

    /// Configuration rejected during `configure`.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Socket or other I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame or unexpected reply shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Error reply sent by the server.
    #[error("server error: {0}")]
    Server(String),

    /// Message body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection was not established within the configured timeout.
    #[error("connection timed out")]
    Timeout,

    /// Queue rejected a message because it is at capacity.
    #[error("queue '{0}' is full")]
    QueueFull(String),

    /// Queue lookup failed.
    #[error("queue '{0}' does not exist")]
    QueueNotFound(String),

    /// Queue limit reached, or queue still holds messages.
    #[error("queue error: {0}")]
    Queue(String),

    /// A handle could not be shut down cleanly.
    #[error("shutdown failed: {0}")]
    Shutdown(String),

    /// Handle was already shut down.
    #[error("handle is closed")]
    Closed,
}

pub type BusResult<T> = Result<T, BusError>;
