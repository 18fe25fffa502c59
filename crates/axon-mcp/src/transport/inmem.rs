//! In-Memory Transport
//!
//! Two connected endpoints backed by unbounded channels. The reference
//! transport for tests and for embedding a server in the same process as its
//! client.

use std::sync::Mutex;

use async_trait::async_trait;
use axon_core::types::Frame;
use tokio::sync::mpsc;

use super::{Transport, TransportError};
use crate::cancel::CancelToken;

/// One endpoint of an in-memory duplex pair.
pub struct InMemoryTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    closed: CancelToken,
}

impl InMemoryTransport {
    /// Create two connected endpoints. Frames sent on one emerge, in order,
    /// from the other's `recv`.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::endpoint(a_tx, a_rx), Self::endpoint(b_tx, b_rx))
    }

    fn endpoint(
        tx: mpsc::UnboundedSender<String>,
        rx: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            closed: CancelToken::new(),
        }
    }

    fn sender(&self) -> Result<mpsc::UnboundedSender<String>, TransportError> {
        self.tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let raw = frame.encode()?;
        self.sender()?
            .send(raw)
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            // Closing this endpoint ends its own read side immediately,
            // without waiting for buffered frames to drain.
            _ = self.closed.cancelled() => Ok(None),
            raw = rx.recv() => Ok(raw),
        }
    }

    async fn close(&self) {
        // Dropping the sender lets the peer's recv observe end of stream.
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.closed.cancel(None);
    }
}

// ============================================================================
// TESTS
// ============================================================================
