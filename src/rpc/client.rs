//! TCP client for delve's JSON-RPC server
//!
//! The session controller only sees the `Transport` and `Connector`
//! traits, so it can be driven by an in-memory server in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::common::{Error, Result};

use super::codec;
use super::types::{RpcRequest, RpcResponse};

/// One live RPC connection
#[async_trait]
pub trait Transport: Send {
    /// Send a request and wait for its response
    async fn request(&mut self, method: &str, params: Value) -> Result<RpcResponse>;

    /// Close the connection; later requests fail with a connection error
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports to an endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Transport>>;
}

/// JSON-RPC client over a TCP stream
pub struct RpcClient {
    /// Buffered reader for the server's responses
    reader: BufReader<OwnedReadHalf>,
    /// Buffered writer for requests
    writer: BufWriter<OwnedWriteHalf>,
    /// Id of the next request
    next_id: u64,
    /// Set once close() ran
    closed: bool,
}

impl RpcClient {
    /// Connect to a delve server at `host:port`
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(endpoint))
            .await
            .map_err(|_| {
                Error::Connection(format!(
                    "timed out connecting to {} after {}s",
                    endpoint,
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Connection(format!("failed to connect to {}: {}", endpoint, e)))?;

        // Requests are small and latency bound
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Could not set TCP_NODELAY");
        }
        tracing::debug!(endpoint, "Connected to delve");

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            next_id: 1,
            closed: false,
        })
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[async_trait]
impl Transport for RpcClient {
    async fn request(&mut self, method: &str, params: Value) -> Result<RpcResponse> {
        if self.closed {
            return Err(Error::Connection("connection already closed".to_string()));
        }

        let id = self.next_id();
        let request = RpcRequest {
            method,
            params: [params],
            id,
        };
        let json = serde_json::to_string(&request)?;
        tracing::debug!("RPC >>> {}", json);
        codec::write_message(&mut self.writer, &json).await?;

        // Read messages until we get the matching response
        loop {
            let json = codec::read_message(&mut self.reader).await?;
            tracing::debug!("RPC <<< {}", json);

            let response: RpcResponse = serde_json::from_str(&json)
                .map_err(|e| Error::Protocol(format!("Invalid JSON from server: {}", e)))?;

            match response.id {
                Some(resp_id) if resp_id == id => return Ok(response),
                other => {
                    tracing::warn!(expected = id, got = ?other, "Discarding unmatched RPC response");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer
            .shutdown()
            .await
            .map_err(|e| Error::Connection(format!("failed to close connection: {}", e)))
    }
}

/// Connector that opens `RpcClient`s over TCP
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Transport>> {
        let client = RpcClient::connect(endpoint, self.timeout).await?;
        Ok(Box::new(client))
    }
}
