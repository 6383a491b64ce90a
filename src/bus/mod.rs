//! Publish/subscribe facade.
//!
//! An [`EventBus`] keeps at most one [`Producer`] and one [`Consumer`] per
//! event name, creating them lazily on the first `publish` or `subscribe`
//! and releasing them on `unpublish`, `unsubscribe` or `destroy`. An
//! optional allow-list restricts which event names are accepted.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::broker::Broker;
use crate::config::{BusConfig, ConfigureOptions};
use crate::error::{BusError, BusResult};
use crate::logging;

pub mod consumer;
pub mod global;
pub mod message;
pub mod producer;

pub use consumer::Consumer;
pub use message::EventMessage;
pub use producer::Producer;

use consumer::DeliveryContext;

/// Subscriber callback. Runs on the consumer's delivery task.
pub type Callback = Arc<dyn Fn(EventMessage) + Send + Sync>;

#[derive(Debug, Default)]
pub(crate) struct BusCounters {
    pub published: AtomicU64,
    pub delivered: AtomicU64,
}

#[derive(Debug, Default)]
struct AllowList {
    names: BTreeSet<String>,
    enforced: bool,
}

impl AllowList {
    fn permits(&self, event: &str) -> bool {
        !self.enforced || self.names.contains(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeStatus {
    Subscribed,
    PreviouslySubscribed,
}

impl SubscribeStatus {
    /// HTTP-style status code: 200 for a new subscription, 204 otherwise.
    pub fn code(&self) -> u16 {
        match self {
            SubscribeStatus::Subscribed => 200,
            SubscribeStatus::PreviouslySubscribed => 204,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub event_name: String,
    pub status: SubscribeStatus,
    pub subscribed: bool,
    pub message: String,
}

impl Subscription {
    fn new(event: &str, status: SubscribeStatus) -> Self {
        let message = match status {
            SubscribeStatus::Subscribed => format!("subscribed to {}", event),
            SubscribeStatus::PreviouslySubscribed => format!("previously subscribed to {}", event),
        };

        Self {
            event_name: event.to_string(),
            status,
            subscribed: true,
            message,
        }
    }
}

/// Result of [`EventBus::destroy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    Cleared,
    Partial { failures: usize },
}

impl DestroyOutcome {
    pub fn is_cleared(&self) -> bool {
        matches!(self, DestroyOutcome::Cleared)
    }
}

impl fmt::Display for DestroyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestroyOutcome::Cleared => write!(f, "All producers & consumers are removed"),
            DestroyOutcome::Partial { .. } => {
                write!(f, "Partially cleared. But something did go wrong")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    pub delivered: u64,
    pub producers: usize,
    pub consumers: usize,
}

pub struct EventBus {
    broker: Arc<dyn Broker>,
    config: RwLock<BusConfig>,
    allow_list: RwLock<AllowList>,
    producers: DashMap<String, Arc<Producer>>,
    consumers: DashMap<String, Consumer>,
    counters: Arc<BusCounters>,
}

impl EventBus {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self::with_config(broker, BusConfig::default())
    }

    pub fn with_config(broker: Arc<dyn Broker>, config: BusConfig) -> Self {
        broker.reconfigure(&config.redis);

        Self {
            broker,
            config: RwLock::new(config),
            allow_list: RwLock::new(AllowList::default()),
            producers: DashMap::new(),
            consumers: DashMap::new(),
            counters: Arc::new(BusCounters::default()),
        }
    }

    /// Replaces the configuration.
    ///
    /// `namespace` falls back to the current one when empty and connection
    /// overrides are merged over the current connection parameters.
    /// A non-empty `supported_events` list turns on allow-list enforcement
    /// for the rest of the bus's life; its names add to any earlier list.
    /// Handles that already exist keep the queue and connection they were
    /// created with.
    pub fn configure(&self, namespace: &str, options: ConfigureOptions) -> BusResult<()> {
        let next = self.config().apply(namespace, &options);
        next.validate()?;

        logging::init(&next.log);
        self.broker.reconfigure(&next.redis);

        if !options.supported_events.is_empty() {
            let mut allow_list = self.allow_list.write().unwrap_or_else(PoisonError::into_inner);
            allow_list.enforced = true;
            allow_list.names.extend(
                options
                    .supported_events
                    .into_iter()
                    .filter(|name| !name.is_empty()),
            );
        }

        tracing::info!(
            "Configured event bus: namespace '{}', {} broker at {}:{}",
            next.namespace,
            self.broker.name(),
            next.redis.host,
            next.redis.port
        );

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }

    /// Snapshot of the active configuration.
    pub fn config(&self) -> BusConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Allow-listed event names, sorted.
    pub fn events(&self) -> Vec<String> {
        self.allow_list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names
            .iter()
            .cloned()
            .collect()
    }

    fn validate_event(&self, event: &str) -> BusResult<()> {
        let permitted = self
            .allow_list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .permits(event);

        if event.is_empty() || !permitted {
            return Err(BusError::InvalidEvent(event.to_string()));
        }
        Ok(())
    }

    pub async fn publish<T: Serialize>(&self, event: &str, payload: T) -> BusResult<EventMessage> {
        self.validate_event(event)?;

        let message = EventMessage::new(event, serde_json::to_value(payload)?);
        let body = message.to_body()?;

        let producer = self.producer_for(event);
        producer.send(&body).await?;

        self.counters.published.fetch_add(1, Ordering::Relaxed);
        if self.config().monitor {
            tracing::info!("Published {} to '{}'", message.id, producer.queue());
        } else {
            tracing::trace!("Published {} to '{}'", message.id, producer.queue());
        }

        Ok(message)
    }

    fn producer_for(&self, event: &str) -> Arc<Producer> {
        if let Some(producer) = self.producers.get(event) {
            return producer.clone();
        }

        let queue = self.config().queue_name(event);
        self.producers
            .entry(event.to_string())
            .or_insert_with(|| Arc::new(Producer::new(event, queue, self.broker.clone())))
            .clone()
    }

    /// Starts delivering messages for `event` to `callback`. Each message is
    /// acknowledged before the callback runs.
    pub async fn subscribe<F>(&self, event: &str, callback: F) -> BusResult<Subscription>
    where
        F: Fn(EventMessage) + Send + Sync + 'static,
    {
        self.validate_event(event)?;

        if self.consumers.contains_key(event) {
            return Ok(Subscription::new(event, SubscribeStatus::PreviouslySubscribed));
        }

        let config = self.config();
        let queue = config.queue_name(event);
        let receiver = self.broker.open_receiver(&queue).await?;

        let spare = match self.consumers.entry(event.to_string()) {
            Entry::Occupied(_) => Some(receiver),
            Entry::Vacant(slot) => {
                let context = DeliveryContext {
                    callback: Arc::new(callback),
                    counters: self.counters.clone(),
                    consume_timeout: config.consumer.consume_timeout(),
                    monitor: config.monitor,
                };
                slot.insert(Consumer::start(event, queue, receiver, context));
                None
            }
        };

        // Lost a race with a concurrent subscribe for the same event.
        if let Some(mut receiver) = spare {
            if let Err(e) = receiver.close().await {
                tracing::debug!("Closing spare receiver for '{}' failed: {}", event, e);
            }
            return Ok(Subscription::new(event, SubscribeStatus::PreviouslySubscribed));
        }

        tracing::info!("Subscribed to '{}'", event);
        Ok(Subscription::new(event, SubscribeStatus::Subscribed))
    }

    /// Shuts down and removes the producer for `event`. Returns whether one
    /// existed.
    pub async fn unpublish(&self, event: &str) -> BusResult<bool> {
        let Some((_, producer)) = self.producers.remove(event) else {
            return Ok(false);
        };

        producer.shutdown().await?;
        tracing::debug!("Removed producer for '{}'", event);
        Ok(true)
    }

    /// Stops and removes the consumer for `event`. Returns whether one
    /// existed.
    pub async fn unsubscribe(&self, event: &str) -> BusResult<bool> {
        let Some((_, consumer)) = self.consumers.remove(event) else {
            return Ok(false);
        };

        consumer.stop().await?;
        tracing::info!("Unsubscribed from '{}'", event);
        Ok(true)
    }

    /// Shuts down every producer and consumer. Both maps end up empty even
    /// when individual shutdowns fail.
    pub async fn destroy(&self) -> DestroyOutcome {
        let mut failures = 0;

        let events: Vec<String> = self.producers.iter().map(|entry| entry.key().clone()).collect();
        for event in events {
            if let Some((_, producer)) = self.producers.remove(&event) {
                if let Err(e) = producer.shutdown().await {
                    tracing::warn!("Shutting down producer for '{}' failed: {}", event, e);
                    failures += 1;
                }
            }
        }

        let events: Vec<String> = self.consumers.iter().map(|entry| entry.key().clone()).collect();
        for event in events {
            if let Some((_, consumer)) = self.consumers.remove(&event) {
                if let Err(e) = consumer.stop().await {
                    tracing::warn!("Stopping consumer for '{}' failed: {}", event, e);
                    failures += 1;
                }
            }
        }

        // Handles created while we were shutting down are dropped too; a
        // dropped consumer's task exits on its own.
        self.producers.clear();
        self.consumers.clear();

        let outcome = if failures == 0 {
            DestroyOutcome::Cleared
        } else {
            DestroyOutcome::Partial { failures }
        };
        tracing::info!("{}", outcome);
        outcome
    }

    pub fn is_publishing(&self, event: &str) -> bool {
        self.producers.contains_key(event)
    }

    pub fn is_subscribed(&self, event: &str) -> bool {
        self.consumers.contains_key(event)
    }

    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            producers: self.producers.len(),
            consumers: self.consumers.len(),
        }
    }
}
