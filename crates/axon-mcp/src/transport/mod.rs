//! Transport Interface
//!
//! A transport is a duplex frame channel between the two peers of a session.
//! Framing — newline-delimited JSON for stdio, channel messages for the
//! in-memory pair — is entirely the transport's concern; the session deals in
//! whole frames.
//!
//! Contract:
//! - exactly one concurrent receiver (the session's reader task owns the read
//!   side) and any number of concurrent senders;
//! - within a direction, frames emerge in the order they were written;
//!   ordering across directions is independent;
//! - the receive stream is finite and not restartable: `Ok(None)` means the
//!   peer is gone for good;
//! - `close` is idempotent.
//!
//! `recv` yields one framed JSON *text* unit rather than a decoded frame:
//! malformed frames must reach the dispatcher, which owns the `-32700` reply
//! policy.

use async_trait::async_trait;
use axon_core::types::Frame;

mod inmem;
mod stdio;

pub use inmem::InMemoryTransport;
pub use stdio::StdioTransport;

/// Errors produced by a transport.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel is closed; no more frames will flow in this direction.
    #[error("transport closed")]
    Closed,
    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A frame could not be encoded for the wire.
    #[error("frame encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A pluggable duplex frame channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one frame. Implementations serialize concurrent senders
    /// internally.
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Read the next framed JSON text. `Ok(None)` signals a clean end of
    /// stream. Only one task may call this at a time.
    async fn recv(&self) -> Result<Option<String>, TransportError>;

    /// Close both directions. Idempotent; pending `recv` calls observe end
    /// of stream promptly.
    async fn close(&self);
}
