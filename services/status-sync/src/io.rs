//! I/O traits and implementations for the status synchronization client
//!
//! This module provides trait abstractions for push-channel message reading
//! and writing, connection establishment, and REST requests. The traits
//! enable mock-based testing without network access; the production
//! implementations use a WebSocket (tokio-tungstenite) and reqwest.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{Result, SyncError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection pair containing a reader and writer
pub struct ConnectionPair {
    /// Reader for receiving push messages
    pub reader: Box<dyn MessageReader>,
    /// Writer for sending commands
    pub writer: Box<dyn MessageWriter>,
}

// ============================================================================
// MessageReader trait and implementations
// ============================================================================

/// Trait for reading text messages from the push channel
///
/// Returns `Ok(Some(text))` for a received message, `Ok(None)` once the
/// remote has closed the channel, or an error on transport failure.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait MessageReader: Send {
    /// Read the next text message from the channel
    async fn next_message(&mut self) -> Result<Option<String>>;
}

/// WebSocket implementation of MessageReader
pub struct WsMessageReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl MessageReader for WsMessageReader {
    async fn next_message(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                // Control frames are handled by the protocol layer
                Some(Ok(other)) => {
                    debug!("Ignoring non-text frame: {:?}", other);
                }
                Some(Err(e)) => return Err(SyncError::Transport(e.to_string())),
            }
        }
    }
}

// ============================================================================
// MessageWriter trait and implementations
// ============================================================================

/// Trait for writing text commands to the push channel
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait MessageWriter: Send {
    /// Send a text command on the channel
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Close the channel
    async fn shutdown(&mut self) -> Result<()>;
}

/// WebSocket implementation of MessageWriter
pub struct WsMessageWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl MessageWriter for WsMessageWriter {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| SyncError::SendError(e.to_string()))
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.sink
            .close()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))
    }
}

// ============================================================================
// Connector trait and implementations
// ============================================================================

/// Trait for establishing push-channel connections
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync {
    /// Attempt to open the channel at the given endpoint
    async fn connect(&self, endpoint: &str, timeout: Duration) -> Result<ConnectionPair>;
}

/// WebSocket implementation of Connector
#[derive(Default, Clone)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str, timeout: Duration) -> Result<ConnectionPair> {
        debug!("Connecting to {} with timeout {:?}", endpoint, timeout);

        let (stream, _response) = tokio::time::timeout(timeout, connect_async(endpoint))
            .await
            .map_err(|_| SyncError::Timeout(format!("Connection to {} timed out", endpoint)))?
            .map_err(|e| {
                SyncError::ConnectionFailed(format!("Failed to connect to {}: {}", endpoint, e))
            })?;

        debug!("Push channel established to {}", endpoint);

        let (sink, source) = stream.split();

        Ok(ConnectionPair {
            reader: Box::new(WsMessageReader { stream: source }),
            writer: Box::new(WsMessageWriter { sink }),
        })
    }
}

// ============================================================================
// HttpClient trait and implementations
// ============================================================================

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request to the given URL
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// Production HTTP client using reqwest
#[derive(Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::Http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Http(format!("Reading response body: {}", e)))?;

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}
