//! Standard I/O transport over the current process's stdin/stdout.
//!
//! Newline-delimited JSON framing: each outbound frame is written as one
//! line, each complete inbound line invokes the message callback. Partial
//! lines are buffered by the codec until a newline arrives. Frames must not
//! contain embedded newlines; `send` rejects them before they reach the
//! wire.
//!
//! stdout carries the protocol. All diagnostics go through `tracing`, which
//! writes to stderr, never stdout.
//!
//! Lock discipline: `parking_lot::Mutex` for state and callbacks
//! (short-lived, never held across `.await`), `tokio::sync::Mutex` only for
//! the stdout writer, which must be held across the write.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{BufReader, Stdout};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, trace};

use crate::{
    ErrorCallback, MessageCallback, Transport, TransportError, TransportResult, TransportState,
};

type StdoutWriter = FramedWrite<Stdout, LinesCodec>;

/// Transport over inherited stdin/stdout
pub struct StdioTransport {
    state: Arc<Mutex<TransportState>>,
    message_callback: Arc<Mutex<Option<MessageCallback>>>,
    error_callback: Arc<Mutex<Option<ErrorCallback>>>,
    writer: Arc<TokioMutex<Option<StdoutWriter>>>,
    read_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StdioTransport {
    /// Create a detached stdio transport
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState::Detached)),
            message_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            writer: Arc::new(TokioMutex::new(None)),
            read_task: Mutex::new(None),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> TransportResult<()> {
        {
            let mut state = self.state.lock();
            if *state == TransportState::Connected {
                return Ok(());
            }
            *state = TransportState::Connected;
        }

        *self.writer.lock().await = Some(FramedWrite::new(tokio::io::stdout(), LinesCodec::new()));

        let mut reader = FramedRead::new(BufReader::new(tokio::io::stdin()), LinesCodec::new());
        let message_callback = self.message_callback.clone();
        let error_callback = self.error_callback.clone();
        let state = self.state.clone();

        let handle = tokio::spawn(async move {
            while let Some(result) = reader.next().await {
                match result {
                    Ok(line) => {
                        trace!(len = line.len(), "stdio frame received");
                        let callback = message_callback.lock().clone();
                        if let Some(callback) = callback {
                            callback(Bytes::from(line.into_bytes()));
                        } else {
                            debug!("stdio frame dropped: no message callback installed");
                        }
                    }
                    Err(e) => {
                        error!("stdio read failed: {e}");
                        *state.lock() = TransportState::Disconnected;
                        if let Some(callback) = error_callback.lock().clone() {
                            callback(TransportError::ReceiveFailed(e.to_string()));
                        }
                        return;
                    }
                }
            }

            // EOF: the peer closed stdin.
            debug!("stdio reached end of stream");
            *state.lock() = TransportState::Disconnected;
            if let Some(callback) = error_callback.lock().clone() {
                callback(TransportError::Eof);
            }
        });

        *self.read_task.lock() = Some(handle);
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        *self.state.lock() = TransportState::Disconnected;
        if let Some(handle) = self.read_task.lock().take() {
            handle.abort();
        }
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = futures::SinkExt::<String>::flush(&mut writer).await;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.state.lock() == TransportState::Connected
    }

    async fn send(&self, frame: Bytes) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let line = std::str::from_utf8(&frame)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        if line.contains('\n') || line.contains('\r') {
            return Err(TransportError::Framing(
                "message contains embedded newline".to_string(),
            ));
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;
        writer
            .send(line.to_string())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        futures::SinkExt::<String>::flush(writer)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(())
    }

    fn set_message_callback(&self, callback: MessageCallback) {
        *self.message_callback.lock() = Some(callback);
    }

    fn set_error_callback(&self, callback: ErrorCallback) {
        *self.error_callback.lock() = Some(callback);
    }
}
