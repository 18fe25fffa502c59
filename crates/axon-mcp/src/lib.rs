//! # Axon MCP
//!
//! A bidirectional MCP session runtime: a JSON-RPC 2.0 message engine that
//! connects a client (host application) and a server (capability provider)
//! over a pluggable transport. Either side may originate requests, send
//! notifications, report progress, or cancel in flight.
//!
//! The engine sits above framing and below application logic:
//!
//! - **Transports** frame the wire (newline-delimited stdio, in-memory
//!   pairs); the session deals in whole frames.
//! - **The dispatcher** owns the read side: one reader task correlates
//!   responses with pending requests, routes progress and cancellation, and
//!   spawns handler tasks — handlers never run on the reader, so a handler
//!   may call back into its own session without deadlock.
//! - **Deadlines** are per-request: a base timeout, optional reset-on-progress,
//!   and an optional hard ceiling; expiry cancels the peer's work
//!   best-effort.
//! - **The handshake** negotiates protocol version and capabilities, with
//!   capabilities inferred from the registered handlers and merged with
//!   explicit overrides.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use axon_mcp::{Implementation, InMemoryTransport, Session};
//! use serde_json::json;
//!
//! let (client_end, server_end) = InMemoryTransport::pair();
//!
//! let server = Session::server(Implementation::new("demo-server", "0.1.0"));
//! server.on_request("tools/list", |_params, _ctx| async {
//!     Ok(json!({"tools": []}))
//! });
//!
//! let client = Session::client(Implementation::new("demo-client", "0.1.0"));
//!
//! let (server_up, client_up) =
//!     tokio::join!(server.connect(server_end), client.connect(client_end));
//! server_up?;
//! client_up?;
//!
//! let tools = client.send("tools/list", None).await?;
//! ```

// ============================================================================
// MODULES
// ============================================================================

pub mod error;
pub mod session;
pub mod transport;

mod cancel;
mod capability;
mod context;
mod dispatch;
mod pending;
mod progress;
mod registry;
mod timeout;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use cancel::CancelToken;
pub use context::HandlerContext;
pub use error::{Error, Result};
pub use progress::{Progress, ProgressCallback};
pub use session::{
    RequestOptions, Role, Session, SessionState, DEFAULT_REQUEST_TIMEOUT,
};
pub use transport::{InMemoryTransport, StdioTransport, Transport, TransportError};

// Protocol model, re-exported for convenience
pub use axon_core::capabilities::{ClientCapabilities, ServerCapabilities};
pub use axon_core::messages::{methods, Implementation, ProgressToken, PROTOCOL_VERSION};
pub use axon_core::types::{Frame, JsonRpcError, RequestId};
