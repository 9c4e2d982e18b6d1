use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use thingwire::session::Transport;
use thingwire::Result;

/// Upper bound on dialing the broker when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Byte transport over a tokio TCP stream.
///
/// Read/write calls are bounded by the caller's timeout; a timeout is an
/// error, not a disconnect. A zero-length read means the peer closed and
/// drops the stream.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    connect_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        TcpTransport { stream: None, connect_timeout: DEFAULT_CONNECT_TIMEOUT }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| anyhow!("connect to {host}:{port} timed out"))??;
        stream.set_nodelay(true)?;
        log::debug!("tcp transport connected to {host}:{port}");
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.shutdown().await {
                log::debug!("tcp shutdown failed: {err}");
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or_else(|| anyhow!("transport is not connected"))?;
        let read = tokio::time::timeout(timeout, stream.read(buf))
            .await
            .map_err(|_| anyhow!("read timed out"))??;
        if read == 0 && !buf.is_empty() {
            self.stream = None;
            return Err(anyhow!("peer closed the connection"));
        }
        Ok(read)
    }

    async fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or_else(|| anyhow!("transport is not connected"))?;
        let written = tokio::time::timeout(timeout, stream.write(buf))
            .await
            .map_err(|_| anyhow!("write timed out"))??;
        Ok(written)
    }
}
