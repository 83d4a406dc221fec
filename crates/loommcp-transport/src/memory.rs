//! In-memory duplex transport for tests and embedded wiring.
//!
//! [`MemoryTransport::pair`] returns two connected ends: frames sent on one
//! end arrive at the other end's message callback, preserving send order.
//! No framing is applied; frames pass through byte-for-byte.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
    ErrorCallback, MessageCallback, Transport, TransportError, TransportResult, TransportState,
};

/// One end of an in-memory duplex channel
pub struct MemoryTransport {
    state: Arc<Mutex<TransportState>>,
    message_callback: Arc<Mutex<Option<MessageCallback>>>,
    error_callback: Arc<Mutex<Option<ErrorCallback>>>,
    outbound: mpsc::UnboundedSender<Bytes>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Bytes>>>,
    pump: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MemoryTransport {
    /// Create two connected transport ends
    pub fn pair() -> (Self, Self) {
        let (a_to_b_tx, a_to_b_rx) = mpsc::unbounded_channel();
        let (b_to_a_tx, b_to_a_rx) = mpsc::unbounded_channel();

        let a = Self {
            state: Arc::new(Mutex::new(TransportState::Detached)),
            message_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            outbound: a_to_b_tx,
            inbound: Mutex::new(Some(b_to_a_rx)),
            pump: Mutex::new(None),
        };
        let b = Self {
            state: Arc::new(Mutex::new(TransportState::Detached)),
            message_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            outbound: b_to_a_tx,
            inbound: Mutex::new(Some(a_to_b_rx)),
            pump: Mutex::new(None),
        };
        (a, b)
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> TransportResult<()> {
        {
            let mut state = self.state.lock();
            if *state == TransportState::Connected {
                return Ok(());
            }
            *state = TransportState::Connected;
        }

        let mut inbound = self
            .inbound
            .lock()
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("already connected once".into()))?;
        let message_callback = self.message_callback.clone();
        let error_callback = self.error_callback.clone();
        let state = self.state.clone();

        let handle = tokio::spawn(async move {
            while let Some(frame) = inbound.recv().await {
                let callback = message_callback.lock().clone();
                if let Some(callback) = callback {
                    callback(frame);
                }
            }
            *state.lock() = TransportState::Disconnected;
            if let Some(callback) = error_callback.lock().clone() {
                callback(TransportError::Eof);
            }
        });
        *self.pump.lock() = Some(handle);
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        *self.state.lock() = TransportState::Disconnected;
        if let Some(handle) = self.pump.lock().take() {
            handle.abort();
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
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::SendFailed("peer end closed".into()))
    }

    fn set_message_callback(&self, callback: MessageCallback) {
        *self.message_callback.lock() = Some(callback);
    }

    fn set_error_callback(&self, callback: ErrorCallback) {
        *self.error_callback.lock() = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn frames_cross_in_order() {
        let (a, b) = MemoryTransport::pair();
        let received: Arc<Mutex<Vec<Bytes>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        b.set_message_callback(Arc::new(move |frame| sink.lock().push(frame)));
        a.set_message_callback(Arc::new(|_| {}));

        a.connect().await.unwrap();
        b.connect().await.unwrap();

        for n in 0..5u8 {
            a.send(Bytes::from(vec![n])).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let frames = received.lock().clone();
        assert_eq!(frames.len(), 5);
        for (n, frame) in frames.iter().enumerate() {
            assert_eq!(frame[0] as usize, n);
        }
    }
}
