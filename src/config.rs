//! Bus configuration.
//!
//! A [`BusConfig`] is built from defaults, from `QUEUEBUS_*` environment
//! variables, or by applying [`ConfigureOptions`] on top of the previous
//! configuration the way `EventBus::configure` does.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BusError, BusResult};

pub const DEFAULT_NAMESPACE: &str = "mq";

/// Connection parameters for the Redis-compatible server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisOptions {
    pub host: String,
    pub port: u16,
    /// Milliseconds allowed for establishing a connection.
    pub connect_timeout_ms: u64,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            connect_timeout_ms: 3_600_000,
        }
    }
}

impl RedisOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Overwrites every field the overrides set, keeping the rest.
    pub fn merge(&mut self, overrides: &RedisOverrides) {
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(timeout) = overrides.connect_timeout_ms {
            self.connect_timeout_ms = timeout;
        }
    }
}

/// Partial connection parameters merged over the current ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogOptions {
    pub enabled: bool,
    pub level: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "trace".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerOptions {
    /// How long a consumer blocks waiting for a message before polling its
    /// shutdown signal again.
    pub consume_timeout_ms: u64,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            consume_timeout_ms: 2000,
        }
    }
}

impl ConsumerOptions {
    pub fn consume_timeout(&self) -> Duration {
        Duration::from_millis(self.consume_timeout_ms)
    }
}

/// Active configuration of an event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub namespace: String,
    pub redis: RedisOptions,
    pub monitor: bool,
    pub log: LogOptions,
    pub consumer: ConsumerOptions,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            redis: RedisOptions::default(),
            monitor: false,
            log: LogOptions::default(),
            consumer: ConsumerOptions::default(),
        }
    }
}

/// Options accepted by `configure`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigureOptions {
    /// Allow-list of event names. Empty means unrestricted.
    pub supported_events: Vec<String>,
    pub db: RedisOverrides,
    pub monitor: Option<bool>,
    pub log: Option<LogOptions>,
    pub consumer: Option<ConsumerOptions>,
}

impl ConfigureOptions {
    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_events = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_db(mut self, db: RedisOverrides) -> Self {
        self.db = db;
        self
    }

    pub fn with_monitor(mut self, monitor: bool) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_consumer(mut self, consumer: ConsumerOptions) -> Self {
        self.consumer = Some(consumer);
        self
    }
}

impl BusConfig {
    /// Reads `QUEUEBUS_*` variables, falling back to defaults for anything
    /// unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let namespace = std::env::var("QUEUEBUS_NAMESPACE")
            .ok()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(defaults.namespace);

        let host = std::env::var("QUEUEBUS_REDIS_HOST").unwrap_or(defaults.redis.host);
        let port = std::env::var("QUEUEBUS_REDIS_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.redis.port);
        let connect_timeout_ms = std::env::var("QUEUEBUS_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(defaults.redis.connect_timeout_ms);

        let monitor = std::env::var("QUEUEBUS_MONITOR")
            .map(|m| matches!(m.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let log = match std::env::var("QUEUEBUS_LOG_LEVEL") {
            Ok(level) => LogOptions {
                enabled: true,
                level,
            },
            Err(_) => defaults.log,
        };

        Self {
            namespace,
            redis: RedisOptions {
                host,
                port,
                connect_timeout_ms,
            },
            monitor,
            log,
            consumer: defaults.consumer,
        }
    }

    /// Builds the configuration that replaces `self` after a `configure`
    /// call. An empty namespace keeps the current one.
    pub fn apply(&self, namespace: &str, options: &ConfigureOptions) -> Self {
        let mut redis = self.redis.clone();
        redis.merge(&options.db);

        Self {
            namespace: if namespace.is_empty() {
                self.namespace.clone()
            } else {
                namespace.to_string()
            },
            redis,
            monitor: options.monitor.unwrap_or(false),
            log: options.log.clone().unwrap_or_default(),
            consumer: options.consumer.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> BusResult<()> {
        if self.redis.host.is_empty() {
            return Err(BusError::InvalidConfig("redis host is empty".to_string()));
        }
        if self.redis.port == 0 {
            return Err(BusError::InvalidConfig("redis port must be non-zero".to_string()));
        }
        if self.consumer.consume_timeout_ms == 0 {
            return Err(BusError::InvalidConfig(
                "consume timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Queue key backing an event name.
    pub fn queue_name(&self, event: &str) -> String {
        format!("{}:{}", self.namespace, event)
    }
}
