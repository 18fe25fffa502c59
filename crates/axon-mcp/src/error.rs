//! Session Error Types
//!
//! The behavioral error categories a session surfaces to callers, and the
//! mappings between them and wire-level `JsonRpcError` objects.

use std::time::Duration;

use axon_core::types::{ErrorCode, JsonRpcError};
use serde_json::Value;

use crate::transport::TransportError;

/// Errors surfaced by session operations.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session terminated; every in-flight request resolves with this.
    #[error("connection closed")]
    ConnectionClosed { cause: Option<String> },

    /// A per-request deadline fired. `hard` marks the `max_total` ceiling.
    #[error("request timed out after {elapsed:?}")]
    RequestTimeout { elapsed: Duration, hard: bool },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled { reason: Option<String> },

    /// The peer violated the wire contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer advertised a protocol version this runtime does not speak.
    #[error("unsupported protocol version '{received}' (supported: {supported})")]
    VersionMismatch {
        received: String,
        supported: &'static str,
    },

    /// The peer returned an error response.
    #[error("peer returned error {code}: {message}")]
    Remote {
        code: i32,
        message: String,
        data: Option<Value>,
    },

    /// The peer reported `-32601` for the requested method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters (`-32602`), inbound or locally constructed.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Unexpected internal failure (`-32603`), including handler panics.
    #[error("internal error: {0}")]
    Internal(String),

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Session result type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn closed(cause: Option<String>) -> Self {
        Error::ConnectionClosed { cause }
    }

    /// Classify an error response from the peer.
    ///
    /// `-32601` and `-32602` get their own variants so callers can match on
    /// them without digging through codes; everything else stays `Remote`.
    pub fn from_json_rpc(error: JsonRpcError) -> Self {
        match error.code {
            code if code == ErrorCode::MethodNotFound as i32 => {
                Error::MethodNotFound(error.message)
            }
            code if code == ErrorCode::InvalidParams as i32 => Error::InvalidParams(error.message),
            _ => Error::Remote {
                code: error.code,
                message: error.message,
                data: error.data,
            },
        }
    }

    /// Render this error as a wire error object for an error response.
    pub fn to_json_rpc(&self) -> JsonRpcError {
        match self {
            Error::ConnectionClosed { .. } => {
                JsonRpcError::new(ErrorCode::ConnectionClosed, "Connection closed")
            }
            Error::RequestTimeout { elapsed, .. } => {
                JsonRpcError::request_timeout(&format!("Timed out after {}ms", elapsed.as_millis()))
            }
            Error::Cancelled { reason } => {
                JsonRpcError::request_cancelled(reason.as_deref().unwrap_or("Request cancelled"))
            }
            Error::Protocol(message) => JsonRpcError::invalid_request(message),
            Error::VersionMismatch { received, .. } => JsonRpcError::invalid_params(&format!(
                "unsupported protocol version '{}'",
                received
            )),
            Error::Remote {
                code,
                message,
                data,
            } => JsonRpcError {
                code: *code,
                message: message.clone(),
                data: data.clone(),
            },
            Error::MethodNotFound(method) => JsonRpcError::method_not_found(method),
            Error::InvalidParams(message) => JsonRpcError::invalid_params(message),
            Error::Internal(message) => JsonRpcError::internal_error(message),
            Error::Transport(e) => JsonRpcError::internal_error(&e.to_string()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
