use std::time::Duration;

use bytes::{Buf, BytesMut};
use redis_protocol::resp2::decode::decode;
use redis_protocol::resp2::types::OwnedFrame as RespFrame;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::utils::encode_frame;
use crate::error::{BusError, BusResult};

/// A single RESP2 client connection. Requests are strictly sequential.
pub struct RespConnection {
    stream: TcpStream,
    buffer: BytesMut,
    addr: String,
}

impl RespConnection {
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> BusResult<Self> {
        let addr = format!("{}:{}", host, port);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| BusError::Timeout)??;
        stream.set_nodelay(true)?;

        tracing::debug!("Connected to {}", addr);

        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            addr,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Sends one command and waits for its reply. Error replies become
    /// [`BusError::Server`].
    pub async fn request(&mut self, frame: RespFrame) -> BusResult<RespFrame> {
        let bytes = encode_frame(&frame)?;
        self.stream.write_all(&bytes).await?;

        match self.read_frame().await? {
            RespFrame::Error(e) => Err(BusError::Server(e)),
            reply => Ok(reply),
        }
    }

    async fn read_frame(&mut self) -> BusResult<RespFrame> {
        loop {
            match decode(&self.buffer) {
                Ok(Some((frame, consumed))) => {
                    self.buffer.advance(consumed);
                    return Ok(frame);
                }
                Ok(None) => {}
                Err(e) => {
                    self.buffer.clear();
                    return Err(BusError::Protocol(format!("{:?}", e)));
                }
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(BusError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("connection to {} closed", self.addr),
                )));
            }
        }
    }

    pub async fn shutdown(mut self) -> BusResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
