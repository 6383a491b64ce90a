use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::message::EventMessage;
use super::{BusCounters, Callback};
use crate::broker::Receiver;
use crate::error::{BusError, BusResult};

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Consumer handle for one event name, backed by a delivery task.
pub struct Consumer {
    event: String,
    queue: String,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<BusResult<()>>,
}

pub(crate) struct DeliveryContext {
    pub callback: Callback,
    pub counters: Arc<BusCounters>,
    pub consume_timeout: Duration,
    pub monitor: bool,
}

impl Consumer {
    /// Spawns the delivery task. Must be called within a tokio runtime.
    pub(crate) fn start(
        event: &str,
        queue: String,
        receiver: Box<dyn Receiver>,
        context: DeliveryContext,
    ) -> Self {
        let (shutdown, signal) = watch::channel(false);

        let task = tokio::spawn(deliver(queue.clone(), receiver, context, signal));
        tracing::debug!("Started consumer for '{}'", queue);

        Self {
            event: event.to_string(),
            queue,
            shutdown,
            task,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Signals the delivery task and waits for it to finish.
    pub(crate) async fn stop(self) -> BusResult<()> {
        // The task may already be gone; joining reports why.
        let _ = self.shutdown.send(true);

        self.task
            .await
            .map_err(|e| BusError::Shutdown(format!("consumer for '{}': {}", self.queue, e)))?
    }
}

async fn deliver(
    queue: String,
    mut receiver: Box<dyn Receiver>,
    context: DeliveryContext,
    mut signal: watch::Receiver<bool>,
) -> BusResult<()> {
    loop {
        if *signal.borrow() {
            break;
        }

        let received = tokio::select! {
            _ = signal.changed() => break,
            received = receiver.receive(context.consume_timeout) => received,
        };

        let body = match received {
            Ok(Some(body)) => body,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("Receive on '{}' failed: {}", queue, e);
                tokio::select! {
                    _ = signal.changed() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => continue,
                }
            }
        };

        if let Err(e) = receiver.ack(&body).await {
            tracing::warn!("Ack on '{}' failed: {}", queue, e);
        }

        let message = match EventMessage::from_body(&body) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Dropping undecodable message on '{}': {}", queue, e);
                continue;
            }
        };

        context.counters.delivered.fetch_add(1, Ordering::Relaxed);
        if context.monitor {
            tracing::info!("Delivering {} on '{}'", message.id, queue);
        } else {
            tracing::trace!("Delivering {} on '{}'", message.id, queue);
        }

        let callback = &context.callback;
        if catch_unwind(AssertUnwindSafe(|| callback(message))).is_err() {
            tracing::error!("Subscriber callback for '{}' panicked", queue);
        }
    }

    tracing::debug!("Stopping consumer for '{}'", queue);
    receiver.close().await
}
