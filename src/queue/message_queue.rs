use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::queue::ArrayQueue;
use tokio::sync::Notify;

use super::message::Message;
use crate::error::{BusError, BusResult};

/// Bounded FIFO queue with async, timeout-bounded dequeue.
pub struct MessageQueue {
    name: String,
    queue: Arc<ArrayQueue<Message>>,
    capacity: usize,
    stats: Arc<QueueStats>,
    notify: Arc<Notify>,
}

pub struct QueueStats {
    enqueued_total: AtomicU64,
    dequeued_total: AtomicU64,
    queue_full_count: AtomicU64,
}

impl QueueStats {
    pub fn new() -> Self {
        Self {
            enqueued_total: AtomicU64::new(0),
            dequeued_total: AtomicU64::new(0),
            queue_full_count: AtomicU64::new(0),
        }
    }

    pub fn enqueued_total(&self) -> u64 {
        self.enqueued_total.load(Ordering::SeqCst)
    }

    pub fn dequeued_total(&self) -> u64 {
        self.dequeued_total.load(Ordering::SeqCst)
    }

    pub fn queue_full_count(&self) -> u64 {
        self.queue_full_count.load(Ordering::SeqCst)
    }

    fn record_dequeue(&self) {
        self.dequeued_total.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for QueueStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new(name: String, capacity: usize) -> Self {
        Self {
            name,
            queue: Arc::new(ArrayQueue::new(capacity.max(1))),
            capacity: capacity.max(1),
            stats: Arc::new(QueueStats::new()),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn enqueue(&self, payload: serde_json::Value) -> BusResult<Message> {
        let message = Message::new(payload);
        match self.queue.push(message.clone()) {
            Ok(()) => {
                self.stats.enqueued_total.fetch_add(1, Ordering::SeqCst);
                // notify_one stores a permit if nobody is waiting yet
                self.notify.notify_one();
                Ok(message)
            }
            Err(_) => {
                self.stats.queue_full_count.fetch_add(1, Ordering::SeqCst);
                Err(BusError::QueueFull(self.name.clone()))
            }
        }
    }

    /// Pops the oldest message, waiting up to `timeout` for one to arrive.
    /// A zero timeout never waits.
    pub async fn dequeue(&self, timeout: Duration) -> Option<Message> {
        if let Some(message) = self.try_pop() {
            return Some(message);
        }

        if timeout.is_zero() {
            return None;
        }

        let waited = tokio::time::timeout(timeout, async {
            loop {
                self.notify.notified().await;

                // Another consumer may have raced us to the message.
                if let Some(message) = self.try_pop() {
                    return message;
                }
            }
        })
        .await;

        match waited {
            Ok(message) => Some(message),
            Err(_) => self.try_pop(),
        }
    }

    fn try_pop(&self) -> Option<Message> {
        let message = self.queue.pop()?;
        self.stats.record_dequeue();
        Some(message)
    }

    pub fn size(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}
