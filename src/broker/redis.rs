use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use redis_protocol::resp2::types::OwnedFrame as RespFrame;

use super::{Broker, Receiver, Sender};
use crate::config::RedisOptions;
use crate::error::{BusError, BusResult};
use crate::queue::processing_list;
use crate::resp::utils::{bulk, command, timeout_arg};
use crate::resp::RespConnection;

/// Broker speaking RESP2 to a Redis-compatible server.
///
/// Every sender and receiver owns its connection, since `BRPOPLPUSH` blocks
/// the connection it runs on. A connection that fails is dropped and
/// re-established on the next call.
pub struct RedisBroker {
    options: Arc<RwLock<RedisOptions>>,
}

impl RedisBroker {
    pub fn new(options: RedisOptions) -> Self {
        Self {
            options: Arc::new(RwLock::new(options)),
        }
    }

    pub fn options(&self) -> RedisOptions {
        self.options
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for RedisBroker {
    fn default() -> Self {
        Self::new(RedisOptions::default())
    }
}

async fn connect(options: &RedisOptions) -> BusResult<RespConnection> {
    RespConnection::connect(&options.host, options.port, options.connect_timeout()).await
}

/// Drops the connection after transport failures so the next call
/// reconnects. Error replies leave it in place.
fn discard_on_failure<T>(conn: &mut Option<RespConnection>, result: BusResult<T>) -> BusResult<T> {
    if matches!(result, Err(BusError::Io(_)) | Err(BusError::Protocol(_))) {
        *conn = None;
    }
    result
}

#[async_trait]
impl Broker for RedisBroker {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn open_sender(&self, queue: &str) -> BusResult<Box<dyn Sender>> {
        let options = self.options();
        let conn = connect(&options).await?;

        Ok(Box::new(RedisSender {
            options,
            conn: Some(conn),
            queue: queue.to_string(),
            closed: false,
        }))
    }

    async fn open_receiver(&self, queue: &str) -> BusResult<Box<dyn Receiver>> {
        let options = self.options();
        let conn = connect(&options).await?;

        Ok(Box::new(RedisReceiver {
            options,
            conn: Some(conn),
            queue: queue.to_string(),
            processing: processing_list(queue),
            closed: false,
        }))
    }

    fn reconfigure(&self, options: &RedisOptions) {
        let mut current = self
            .options
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = options.clone();
    }
}

struct RedisSender {
    options: RedisOptions,
    conn: Option<RespConnection>,
    queue: String,
    closed: bool,
}

#[async_trait]
impl Sender for RedisSender {
    async fn send(&mut self, body: &str) -> BusResult<()> {
        if self.closed {
            return Err(BusError::Closed);
        }

        if self.conn.is_none() {
            self.conn = Some(connect(&self.options).await?);
        }
        let Some(conn) = self.conn.as_mut() else {
            return Err(BusError::Closed);
        };

        let result = conn.request(command(&["LPUSH", &self.queue, body])).await;
        match discard_on_failure(&mut self.conn, result)? {
            RespFrame::Integer(_) => Ok(()),
            other => Err(BusError::Protocol(format!("unexpected LPUSH reply: {:?}", other))),
        }
    }

    async fn close(&mut self) -> BusResult<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Err(BusError::Closed);
        }

        match self.conn.take() {
            Some(conn) => conn.shutdown().await,
            None => Ok(()),
        }
    }
}

struct RedisReceiver {
    options: RedisOptions,
    conn: Option<RespConnection>,
    queue: String,
    processing: String,
    closed: bool,
}

impl RedisReceiver {
    async fn connection(&mut self) -> BusResult<&mut RespConnection> {
        if self.closed {
            return Err(BusError::Closed);
        }

        if self.conn.is_none() {
            tracing::debug!("Reconnecting receiver for '{}'", self.queue);
            self.conn = Some(connect(&self.options).await?);
        }
        self.conn.as_mut().ok_or(BusError::Closed)
    }

    /// `LREM` with the body's exact bytes.
    async fn remove_pending(&mut self, body: &[u8]) -> BusResult<()> {
        let frame = RespFrame::Array(vec![
            bulk("LREM"),
            bulk(&self.processing),
            bulk("1"),
            bulk(body),
        ]);

        let result = self.connection().await?.request(frame).await;
        match discard_on_failure(&mut self.conn, result)? {
            RespFrame::Integer(0) => {
                tracing::debug!("Ack for unknown message on '{}'", self.processing);
                Ok(())
            }
            RespFrame::Integer(_) => Ok(()),
            other => Err(BusError::Protocol(format!("unexpected LREM reply: {:?}", other))),
        }
    }
}

#[async_trait]
impl Receiver for RedisReceiver {
    async fn receive(&mut self, timeout: Duration) -> BusResult<Option<String>> {
        let frame = command(&[
            "BRPOPLPUSH",
            &self.queue,
            &self.processing,
            &timeout_arg(timeout),
        ]);

        let result = self.connection().await?.request(frame).await;
        match discard_on_failure(&mut self.conn, result)? {
            RespFrame::BulkString(body) => match String::from_utf8(body) {
                Ok(body) => Ok(Some(body)),
                Err(e) => {
                    // Lossy text would never match the stored entry on LREM.
                    self.remove_pending(e.as_bytes()).await?;
                    Err(BusError::Protocol(format!(
                        "dropped non UTF-8 message body from '{}'",
                        self.queue
                    )))
                }
            },
            RespFrame::Null => Ok(None),
            other => Err(BusError::Protocol(format!(
                "unexpected BRPOPLPUSH reply: {:?}",
                other
            ))),
        }
    }

    async fn ack(&mut self, body: &str) -> BusResult<()> {
        self.remove_pending(body.as_bytes()).await
    }

    async fn close(&mut self) -> BusResult<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Err(BusError::Closed);
        }

        match self.conn.take() {
            Some(conn) => conn.shutdown().await,
            None => Ok(()),
        }
    }
}
