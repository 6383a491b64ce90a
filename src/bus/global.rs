//! Process-wide event bus.
//!
//! The free functions here forward to a single [`EventBus`] backed by a
//! [`RedisBroker`], created on first use from [`BusConfig::from_env`].

use std::sync::{Arc, OnceLock};

use serde::Serialize;

use super::{DestroyOutcome, EventBus, EventMessage, Subscription};
use crate::broker::RedisBroker;
use crate::config::{BusConfig, ConfigureOptions};
use crate::error::BusResult;

static BUS: OnceLock<EventBus> = OnceLock::new();

pub fn bus() -> &'static EventBus {
    BUS.get_or_init(|| {
        let config = BusConfig::from_env();
        let broker = Arc::new(RedisBroker::new(config.redis.clone()));
        EventBus::with_config(broker, config)
    })
}

pub fn configure(namespace: &str, options: ConfigureOptions) -> BusResult<()> {
    bus().configure(namespace, options)
}

pub async fn publish<T: Serialize>(event: &str, payload: T) -> BusResult<EventMessage> {
    bus().publish(event, payload).await
}

pub async fn subscribe<F>(event: &str, callback: F) -> BusResult<Subscription>
where
    F: Fn(EventMessage) + Send + Sync + 'static,
{
    bus().subscribe(event, callback).await
}

pub async fn unpublish(event: &str) -> BusResult<bool> {
    bus().unpublish(event).await
}

pub async fn unsubscribe(event: &str) -> BusResult<bool> {
    bus().unsubscribe(event).await
}

pub async fn destroy() -> DestroyOutcome {
    bus().destroy().await
}

pub fn events() -> Vec<String> {
    bus().events()
}
