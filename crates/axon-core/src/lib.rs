//! # Axon Core
//!
//! Protocol model for the Axon MCP runtime: the JSON-RPC 2.0 envelope and
//! codec, the typed MCP message set, and the capability structures exchanged
//! during the `initialize` handshake.
//!
//! This crate is pure data — no I/O, no runtime. The session engine that
//! drives these types over a transport lives in `axon-mcp`.

// ============================================================================
// MODULES
// ============================================================================

pub mod capabilities;
pub mod error;
pub mod messages;
pub mod types;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use capabilities::{
    ClientCapabilities, CompletionsCapability, ElicitationCapability, LoggingCapability,
    PromptsCapability, ResourcesCapability, RootsCapability, SamplingCapability, ServerCapabilities,
    TasksCapability, ToolsCapability,
};
pub use error::{ProtocolError, Result};
pub use messages::{
    extract_progress_token, inject_progress_token, methods, CancelledParams, Implementation,
    InitializeRequest, InitializeResult, ProgressParams, ProgressToken, PROTOCOL_VERSION,
};
pub use types::{
    DecodeError, ErrorCode, Frame, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, JSONRPC_VERSION,
};
