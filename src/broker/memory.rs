use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Broker, Receiver, Sender};
use crate::error::{BusError, BusResult};
use crate::queue::{processing_list, QueueManager};

/// In-process broker over a shared [`QueueManager`].
#[derive(Clone)]
pub struct MemoryBroker {
    manager: Arc<QueueManager>,
}

impl MemoryBroker {
    pub fn new(manager: Arc<QueueManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<QueueManager> {
        &self.manager
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(Arc::new(QueueManager::new(100_000, 1000)))
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open_sender(&self, queue: &str) -> BusResult<Box<dyn Sender>> {
        Ok(Box::new(MemorySender {
            manager: self.manager.clone(),
            queue: queue.to_string(),
            closed: false,
        }))
    }

    async fn open_receiver(&self, queue: &str) -> BusResult<Box<dyn Receiver>> {
        self.manager.get_or_create_queue(queue)?;

        Ok(Box::new(MemoryReceiver {
            manager: self.manager.clone(),
            queue: queue.to_string(),
            processing: processing_list(queue),
            closed: false,
        }))
    }
}

struct MemorySender {
    manager: Arc<QueueManager>,
    queue: String,
    closed: bool,
}

#[async_trait]
impl Sender for MemorySender {
    async fn send(&mut self, body: &str) -> BusResult<()> {
        if self.closed {
            return Err(BusError::Closed);
        }

        let payload: serde_json::Value = serde_json::from_str(body)?;
        self.manager.enqueue(&self.queue, payload)?;
        Ok(())
    }

    async fn close(&mut self) -> BusResult<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Err(BusError::Closed);
        }
        Ok(())
    }
}

struct MemoryReceiver {
    manager: Arc<QueueManager>,
    queue: String,
    processing: String,
    closed: bool,
}

#[async_trait]
impl Receiver for MemoryReceiver {
    async fn receive(&mut self, timeout: Duration) -> BusResult<Option<String>> {
        if self.closed {
            return Err(BusError::Closed);
        }

        self.manager
            .dequeue_to_pending(&self.queue, &self.processing, timeout)
            .await
    }

    async fn ack(&mut self, body: &str) -> BusResult<()> {
        if !self.manager.ack_pending(&self.processing, body) {
            tracing::debug!("Ack for unknown message on '{}'", self.processing);
        }
        Ok(())
    }

    async fn close(&mut self) -> BusResult<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Err(BusError::Closed);
        }
        Ok(())
    }
}
