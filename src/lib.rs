// queuebus - publish/subscribe event bus over Redis-style message queues
//
// The facade lives in `bus`; transports sit behind `broker::Broker`.
// `queue` and `resp` provide the in-memory store and the RESP2 wire layer
// used by the brokers and the embedded server binary in src/main.rs.

pub mod broker;
pub mod bus;
pub mod config;
pub mod error;
pub mod logging;
pub mod queue;
pub mod resp;

pub use broker::{Broker, MemoryBroker, RedisBroker, Receiver, Sender};
pub use bus::{
    BusStats, Callback, DestroyOutcome, EventBus, EventMessage, SubscribeStatus, Subscription,
};
pub use config::{
    BusConfig, ConfigureOptions, ConsumerOptions, LogOptions, RedisOptions, RedisOverrides,
};
pub use error::{BusError, BusResult};
pub use queue::{Message, MessageQueue, QueueManager, QueueStats};
pub use resp::{RespConfig, RespConnection, RespServer};
