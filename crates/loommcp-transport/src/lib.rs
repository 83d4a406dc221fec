//! # loommcp-transport
//!
//! Framed byte channels for the loommcp message fabric. A [`Transport`] is a
//! movable, non-shared object that owns its framing: the stdio transports
//! speak newline-delimited JSON, the streamable HTTP transport speaks SSE
//! event frames. Ownership transfers to the session on bind; the session
//! installs the message and error callbacks before calling `connect`.

#![warn(missing_docs)]

pub mod child_process;
pub mod memory;
pub mod stdio;
pub mod streamable_http;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use child_process::{ChildProcessConfig, ChildProcessTransport};
pub use memory::MemoryTransport;
pub use stdio::StdioTransport;
pub use streamable_http::{
    PostOutcome, SseWriter, StreamableHttpConfig, StreamableHttpConfigBuilder,
    StreamableHttpTransport,
};

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors that can occur in transport operations
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The peer closed the stream
    #[error("end of stream")]
    Eof,

    /// Send operation failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive operation failed
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The transport is not connected
    #[error("transport not connected")]
    NotConnected,

    /// A frame violated the transport's framing rules
    #[error("framing violation: {0}")]
    Framing(String),

    /// Unknown or expired session
    #[error("unknown session")]
    UnknownSession,

    /// IO error, stringified to stay cloneable
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Lifecycle state of a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    /// Constructed but never connected
    Detached,
    /// Connected and passing messages
    Connected,
    /// Disconnected, by request or by failure
    Disconnected,
}

/// Callback invoked with each complete inbound frame (framing stripped)
pub type MessageCallback = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Callback invoked when the transport fails out-of-band
pub type ErrorCallback = Arc<dyn Fn(TransportError) + Send + Sync>;

/// Abstract framed byte channel
///
/// `send` never blocks the caller for network I/O beyond a single enqueue;
/// delivery failures after the enqueue surface through the error callback.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the channel and start delivering inbound frames
    async fn connect(&self) -> TransportResult<()>;

    /// Tear the channel down; idempotent
    async fn disconnect(&self) -> TransportResult<()>;

    /// Whether the channel is currently up
    fn is_connected(&self) -> bool;

    /// Enqueue one outbound frame; the transport applies its own framing
    async fn send(&self, frame: Bytes) -> TransportResult<()>;

    /// Install the inbound frame callback; must happen before `connect`
    fn set_message_callback(&self, callback: MessageCallback);

    /// Install the out-of-band error callback; must happen before `connect`
    fn set_error_callback(&self, callback: ErrorCallback);
}
