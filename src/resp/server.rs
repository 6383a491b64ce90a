use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use redis_protocol::resp2::decode::decode;
use redis_protocol::resp2::types::OwnedFrame as RespFrame;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::handler::handle_command;
use super::utils::encode_frame;
use crate::error::BusResult;
use crate::queue::QueueManager;

#[derive(Debug, Clone)]
pub struct RespConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RespConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 6379,
        }
    }
}

/// Embedded broker serving a [`QueueManager`] over RESP2.
pub struct RespServer {
    listener: TcpListener,
    queue_manager: Arc<QueueManager>,
}

impl RespServer {
    pub async fn bind(config: RespConfig, queue_manager: Arc<QueueManager>) -> BusResult<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await?;

        Ok(Self {
            listener,
            queue_manager,
        })
    }

    pub fn local_addr(&self) -> BusResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> BusResult<()> {
        tracing::info!("queuebus RESP server listening on {}", self.local_addr()?);

        loop {
            let (socket, peer_addr) = self.listener.accept().await?;
            tracing::debug!("New connection from {}", peer_addr);

            let queue_manager = self.queue_manager.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(socket, queue_manager).await {
                    tracing::warn!("Connection {} closed with error: {}", peer_addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    queue_manager: Arc<QueueManager>,
) -> BusResult<()> {
    let mut buffer = BytesMut::with_capacity(4096);

    loop {
        let n = socket.read_buf(&mut buffer).await?;

        if n == 0 {
            tracing::debug!("Connection closed by client");
            return Ok(());
        }

        loop {
            match decode(&buffer) {
                Ok(Some((frame, consumed))) => {
                    tracing::trace!("Received frame: {:?}", frame);
                    buffer.advance(consumed);

                    let command = handle_command(frame, queue_manager.clone());
                    let response = run_until_hangup(command, &mut socket, &mut buffer).await?;
                    let Some(response) = response else {
                        tracing::debug!("Connection closed by client during a command");
                        return Ok(());
                    };
                    socket.write_all(&encode_frame(&response)?).await?;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Parse error: {:?}", e);
                    let error_response =
                        RespFrame::Error(format!("ERR protocol error: {:?}", e));
                    socket.write_all(&encode_frame(&error_response)?).await?;

                    buffer.clear();
                    break;
                }
            }
        }
    }
}

/// Drives a command while still reading the socket. Pipelined bytes are
/// buffered for later; on EOF the command is dropped before it completes,
/// so a blocked pop never takes a message for a client that is gone.
async fn run_until_hangup<F>(
    command: F,
    socket: &mut TcpStream,
    buffer: &mut BytesMut,
) -> BusResult<Option<RespFrame>>
where
    F: Future<Output = RespFrame>,
{
    tokio::pin!(command);

    loop {
        tokio::select! {
            response = &mut command => return Ok(Some(response)),
            read = socket.read_buf(buffer) => {
                if read? == 0 {
                    return Ok(None);
                }
            }
        }
    }
}
