//! Stdio Transport
//!
//! Newline-delimited JSON frames over an async reader/writer pair. Two
//! common wirings: serving over the current process's stdin/stdout (the
//! classic MCP server shape — keep logging on stderr, stdout belongs to the
//! protocol), and spawning a child process and talking over its pipes.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use axon_core::types::Frame;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::{Transport, TransportError};
use crate::cancel::CancelToken;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Line-framed transport over arbitrary async byte streams.
pub struct StdioTransport {
    reader: tokio::sync::Mutex<Lines<BufReader<BoxedReader>>>,
    writer: tokio::sync::Mutex<BoxedWriter>,
    child: std::sync::Mutex<Option<Child>>,
    closed: CancelToken,
}

impl StdioTransport {
    /// Wrap an arbitrary reader/writer pair.
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: tokio::sync::Mutex::new(
                BufReader::new(Box::new(reader) as BoxedReader).lines(),
            ),
            writer: tokio::sync::Mutex::new(Box::new(writer) as BoxedWriter),
            child: std::sync::Mutex::new(None),
            closed: CancelToken::new(),
        }
    }

    /// Serve over the current process's stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Spawn a child process and connect to its stdin/stdout. The child's
    /// stderr is inherited so its logs land next to ours. If the child has
    /// not exited by the time the transport is dropped, it is killed.
    pub fn spawn(program: &str, args: &[&str]) -> std::io::Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "child stdin unavailable")
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "child stdout unavailable")
        })?;

        let transport = Self::new(stdout, stdin);
        *transport.child.lock().unwrap_or_else(|e| e.into_inner()) = Some(child);
        Ok(transport)
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let raw = frame.encode()?;

        let mut writer = self.writer.lock().await;
        writer.write_all(raw.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        let mut lines = self.reader.lock().await;
        loop {
            let line = tokio::select! {
                _ = self.closed.cancelled() => return Ok(None),
                line = lines.next_line() => line?,
            };
            match line {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    debug!(bytes = line.len(), "received frame");
                    return Ok(Some(line));
                }
            }
        }
    }

    async fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel(None);

        // Closing our write side signals EOF to the peer; a well-behaved
        // child exits on its own.
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                warn!("failed to shut down stdio writer: {}", e);
            }
        }

        let child = self
            .child
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut child) = child {
            tokio::spawn(async move {
                if tokio::time::timeout(Duration::from_secs(2), child.wait())
                    .await
                    .is_err()
                {
                    warn!("child did not exit after stdin EOF; killing");
                    let _ = child.start_kill();
                }
            });
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::types::JsonRpcRequest;

    /// Build a connected transport pair from two duplex byte pipes.
    fn duplex_pair() -> (StdioTransport, StdioTransport) {
        let (a_read, b_write) = tokio::io::duplex(4096);
        let (b_read, a_write) = tokio::io::duplex(4096);
        (
            StdioTransport::new(a_read, a_write),
            StdioTransport::new(b_read, b_write),
        )
    }

    #[tokio::test]
    async fn test_line_framed_roundtrip() {
        let (a, b) = duplex_pair();

        a.send(Frame::Request(JsonRpcRequest::new(1, "ping", None)))
            .await
            .unwrap();

        let raw = b.recv().await.unwrap().unwrap();
        let frame = Frame::decode(&raw).unwrap();
        assert_eq!(frame.method(), Some("ping"));
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let (reader, mut feed) = tokio::io::duplex(4096);
        let (_unused, writer) = tokio::io::duplex(4096);
        let transport = StdioTransport::new(reader, writer);

        feed.write_all(b"\n  \n{\"jsonrpc\":\"2.0\",\"method\":\"x\"}\n")
            .await
            .unwrap();

        let raw = transport.recv().await.unwrap().unwrap();
        assert!(raw.contains("\"x\""));
    }

    #[tokio::test]
    async fn test_peer_eof_ends_stream() {
        let (a, b) = duplex_pair();
        drop(b);
        assert!(a.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_spawned_child_echoes_frames() {
        let transport = StdioTransport::spawn("cat", &[]).unwrap();

        transport
            .send(Frame::Request(JsonRpcRequest::new(1, "ping", None)))
            .await
            .unwrap();

        let raw = transport.recv().await.unwrap().unwrap();
        let frame = Frame::decode(&raw).unwrap();
        assert_eq!(frame.method(), Some("ping"));

        transport.close().await;
    }

    #[tokio::test]
    async fn test_close_unblocks_receiver() {
        let (a, _b) = duplex_pair();
        let a = std::sync::Arc::new(a);

        let receiver = a.clone();
        let handle = tokio::spawn(async move { receiver.recv().await });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        a.close().await;

        assert!(handle.await.unwrap().unwrap().is_none());
    }
}
