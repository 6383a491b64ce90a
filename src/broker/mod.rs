//! Transport seam between the event bus and the queue backend.
//!
//! A [`Broker`] hands out one [`Sender`] per producer and one [`Receiver`]
//! per consumer. Receivers follow the reliable-queue pattern: `receive`
//! moves a body into the queue's processing list and `ack` removes it.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::RedisOptions;
use crate::error::BusResult;

pub mod memory;
pub mod redis;

pub use memory::MemoryBroker;
pub use redis::RedisBroker;

#[async_trait]
pub trait Broker: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    async fn open_sender(&self, queue: &str) -> BusResult<Box<dyn Sender>>;

    async fn open_receiver(&self, queue: &str) -> BusResult<Box<dyn Receiver>>;

    /// Applies new connection parameters to senders and receivers opened
    /// from now on.
    fn reconfigure(&self, _options: &RedisOptions) {}
}

#[async_trait]
pub trait Sender: Send {
    async fn send(&mut self, body: &str) -> BusResult<()>;

    /// Fails with `BusError::Closed` when called twice.
    async fn close(&mut self) -> BusResult<()>;
}

#[async_trait]
pub trait Receiver: Send {
    /// Waits up to `timeout` for the next body.
    async fn receive(&mut self, timeout: Duration) -> BusResult<Option<String>>;

    async fn ack(&mut self, body: &str) -> BusResult<()>;

    /// Fails with `BusError::Closed` when called twice.
    async fn close(&mut self) -> BusResult<()>;
}
