use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use super::message::Message;
use super::message_queue::MessageQueue;
use crate::error::{BusError, BusResult};

/// Name of the processing list that tracks unacknowledged messages of a
/// queue.
pub fn processing_list(queue_name: &str) -> String {
    format!("{}:processing", queue_name)
}

/// Named queues plus the processing lists used for acknowledgement.
///
/// Processing lists hold the serialized payload of every message handed out
/// by [`dequeue_to_pending`](Self::dequeue_to_pending) until it is removed by
/// [`ack_pending`](Self::ack_pending).
pub struct QueueManager {
    queues: Arc<DashMap<String, Arc<MessageQueue>>>,
    pending: Arc<DashMap<String, VecDeque<String>>>,
    default_capacity: usize,
    max_queues: usize,
}

#[derive(Debug, Clone)]
pub struct StatsSummary {
    pub total_queues: usize,
    pub queues: HashMap<String, QueueStatsInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatsInfo {
    pub size: usize,
    pub capacity: usize,
    pub enqueued_total: u64,
    pub dequeued_total: u64,
    pub pending: usize,
}

impl QueueManager {
    pub fn new(default_capacity: usize, max_queues: usize) -> Self {
        Self {
            queues: Arc::new(DashMap::new()),
            pending: Arc::new(DashMap::new()),
            default_capacity,
            max_queues,
        }
    }

    pub fn get_or_create_queue(&self, name: &str) -> BusResult<Arc<MessageQueue>> {
        if let Some(queue) = self.queues.get(name) {
            return Ok(queue.clone());
        }

        if self.queues.len() >= self.max_queues {
            return Err(BusError::Queue(format!(
                "maximum number of queues ({}) reached",
                self.max_queues
            )));
        }

        let queue = self
            .queues
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!("Creating queue '{}'", name);
                Arc::new(MessageQueue::new(name.to_string(), self.default_capacity))
            })
            .clone();

        Ok(queue)
    }

    pub fn get_queue(&self, name: &str) -> Option<Arc<MessageQueue>> {
        self.queues.get(name).map(|queue| queue.clone())
    }

    pub fn enqueue(&self, queue_name: &str, payload: serde_json::Value) -> BusResult<Message> {
        self.get_or_create_queue(queue_name)?.enqueue(payload)
    }

    pub async fn dequeue(&self, queue_name: &str, timeout: Duration) -> BusResult<Option<Message>> {
        let queue = self
            .get_queue(queue_name)
            .ok_or_else(|| BusError::QueueNotFound(queue_name.to_string()))?;

        Ok(queue.dequeue(timeout).await)
    }

    /// Pops from `queue_name` and records the serialized payload in the
    /// `pending` processing list. Waits on the queue even if it does not
    /// exist yet.
    pub async fn dequeue_to_pending(
        &self,
        queue_name: &str,
        pending: &str,
        timeout: Duration,
    ) -> BusResult<Option<String>> {
        let queue = self.get_or_create_queue(queue_name)?;

        let Some(message) = queue.dequeue(timeout).await else {
            return Ok(None);
        };

        let body = message.payload.to_string();
        self.pending
            .entry(pending.to_string())
            .or_default()
            .push_front(body.clone());

        Ok(Some(body))
    }

    /// Removes the first occurrence of `body` from a processing list.
    pub fn ack_pending(&self, pending: &str, body: &str) -> bool {
        let Some(mut list) = self.pending.get_mut(pending) else {
            return false;
        };

        match list.iter().position(|entry| entry == body) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn pending_len(&self, pending: &str) -> usize {
        self.pending.get(pending).map(|list| list.len()).unwrap_or(0)
    }

    pub fn list_queues(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    pub fn get_all_stats(&self) -> HashMap<String, QueueStatsInfo> {
        self.queues
            .iter()
            .map(|entry| {
                let queue = entry.value();
                let stats = queue.stats();
                let info = QueueStatsInfo {
                    size: queue.size(),
                    capacity: queue.capacity(),
                    enqueued_total: stats.enqueued_total(),
                    dequeued_total: stats.dequeued_total(),
                    pending: self.pending_len(&processing_list(entry.key())),
                };
                (entry.key().clone(), info)
            })
            .collect()
    }

    pub fn get_stats_summary(&self) -> StatsSummary {
        let queues = self.get_all_stats();
        StatsSummary {
            total_queues: queues.len(),
            queues,
        }
    }

    /// Deletes an empty queue. Non-empty or unknown queues are an error.
    pub fn delete_queue(&self, name: &str) -> BusResult<()> {
        let queue = self
            .get_queue(name)
            .ok_or_else(|| BusError::QueueNotFound(name.to_string()))?;

        if !queue.is_empty() {
            return Err(BusError::Queue(format!(
                "queue '{}' still holds {} messages",
                name,
                queue.size()
            )));
        }

        self.queues.remove(name);
        self.pending.remove(&processing_list(name));
        tracing::debug!("Deleted queue '{}'", name);
        Ok(())
    }

    /// Drops a queue or processing list regardless of its contents.
    pub fn purge(&self, name: &str) -> bool {
        let queue = self.queues.remove(name).is_some();
        let pending = self.pending.remove(name).is_some();
        queue || pending
    }

    pub fn default_capacity(&self) -> usize {
        self.default_capacity
    }

    pub fn max_queues(&self) -> usize {
        self.max_queues
    }
}
