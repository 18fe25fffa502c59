//! JSON-RPC 2.0 Types
//!
//! Wire envelope for the MCP protocol: requests, responses, notifications,
//! and the error object, plus the codec that discriminates between them.
//!
//! Both peers of a session speak the same envelope; either side may send any
//! frame kind. Discrimination follows JSON-RPC 2.0: a frame with `id` and
//! `method` is a request, `method` without `id` is a notification, and `id`
//! without `method` is a response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// JSON-RPC version string required on every frame.
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// REQUEST ID
// ============================================================================

/// A request identifier, unique per issuing side within a session.
///
/// JSON-RPC permits integer or string IDs; the responder echoes the exact
/// type it received. Axon issues integer IDs from a monotonic counter but
/// accepts either form from the peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

// ============================================================================
// JSON-RPC REQUEST / NOTIFICATION / RESPONSE
// ============================================================================

/// JSON-RPC Request — carries an `id` and expects a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC Notification — no `id`, no response expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC Response — either `result` or `error`, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

// ============================================================================
// JSON-RPC ERROR
// ============================================================================

/// JSON-RPC Error Codes (standard + MCP-specific)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Standard JSON-RPC errors
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,

    // MCP-specific errors (-32000 to -32099)
    ConnectionClosed = -32000,
    RequestTimeout = -32001,
    RequestCancelled = -32002,
    ServerNotInitialized = -32003,
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code as i32
    }
}

/// JSON-RPC Error object carried in an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: ErrorCode, message: &str) -> Self {
        Self {
            code: code.into(),
            message: message.to_string(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(ErrorCode::ParseError, "Parse error")
    }

    pub fn invalid_request(message: &str) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            &format!("Method not found: {}", method),
        )
    }

    pub fn invalid_params(message: &str) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn request_timeout(message: &str) -> Self {
        Self::new(ErrorCode::RequestTimeout, message)
    }

    pub fn request_cancelled(message: &str) -> Self {
        Self::new(ErrorCode::RequestCancelled, message)
    }

    pub fn server_not_initialized() -> Self {
        Self::new(ErrorCode::ServerNotInitialized, "Server not initialized")
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

// ============================================================================
// FRAME ENVELOPE & CODEC
// ============================================================================

/// One decoded JSON-RPC frame.
///
/// Variant order matters for deserialization: a request carries both `id`
/// and `method`, so it must be tried before the weaker notification and
/// response shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
}

/// A frame that failed to decode.
///
/// Carries the offending frame's `id` when one could be recovered, so the
/// dispatcher can answer with a `-32700`/`-32600` error response instead of
/// dropping silently.
#[derive(Debug, Clone)]
pub struct DecodeError {
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for DecodeError {}

impl Frame {
    /// Decode one framed JSON text into an envelope.
    ///
    /// Tolerates arbitrary field order and both integer and string IDs.
    /// Frames that are not JSON yield a parse error; JSON objects missing
    /// `jsonrpc: "2.0"` or not matching any envelope shape yield an
    /// invalid-request error. Either way the recovered `id` (if any) rides
    /// along for the error reply.
    pub fn decode(raw: &str) -> Result<Frame, DecodeError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| DecodeError {
            id: None,
            error: JsonRpcError {
                data: Some(Value::String(e.to_string())),
                ..JsonRpcError::parse_error()
            },
        })?;

        let id = value
            .get("id")
            .and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok());

        match value.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            _ => {
                return Err(DecodeError {
                    id,
                    error: JsonRpcError::invalid_request("missing or invalid jsonrpc version"),
                });
            }
        }

        serde_json::from_value::<Frame>(value).map_err(|e| {
            let error = ProtocolError::InvalidMessage {
                what: "frame",
                detail: e.to_string(),
            };
            DecodeError {
                id,
                error: JsonRpcError::invalid_request(&error.to_string()),
            }
        })
    }

    /// Encode the frame to its wire text.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The frame's request id, if it carries one.
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Frame::Request(r) => Some(&r.id),
            Frame::Response(r) => Some(&r.id),
            Frame::Notification(_) => None,
        }
    }

    /// The frame's method, if it carries one.
    pub fn method(&self) -> Option<&str> {
        match self {
            Frame::Request(r) => Some(&r.method),
            Frame::Notification(n) => Some(&n.method),
            Frame::Response(_) => None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_request() {
        let frame = Frame::decode(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        match frame {
            Frame::Request(r) => {
                assert_eq!(r.id, RequestId::Number(1));
                assert_eq!(r.method, "ping");
                assert!(r.params.is_none());
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_notification() {
        let frame =
            Frame::decode(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(matches!(frame, Frame::Notification(_)));
        assert_eq!(frame.method(), Some("notifications/initialized"));
        assert!(frame.request_id().is_none());
    }

    #[test]
    fn test_decode_response() {
        let frame = Frame::decode(r#"{"jsonrpc":"2.0","id":"abc","result":{}}"#).unwrap();
        match frame {
            Frame::Response(r) => {
                assert_eq!(r.id, RequestId::String("abc".to_string()));
                assert!(r.result.is_some());
                assert!(r.error.is_none());
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_response() {
        let frame = Frame::decode(
            r#"{"jsonrpc":"2.0","id":7,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        match frame {
            Frame::Response(r) => {
                assert_eq!(r.error.unwrap().code, -32601);
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_tolerates_field_order() {
        let frame =
            Frame::decode(r#"{"method":"tools/list","params":{},"id":3,"jsonrpc":"2.0"}"#).unwrap();
        assert!(matches!(frame, Frame::Request(_)));
    }

    #[test]
    fn test_decode_rejects_missing_jsonrpc() {
        let err = Frame::decode(r#"{"id":1,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.error.code, ErrorCode::InvalidRequest as i32);
        assert_eq!(err.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn test_decode_rejects_wrong_jsonrpc_version() {
        let err = Frame::decode(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.error.code, ErrorCode::InvalidRequest as i32);
    }

    #[test]
    fn test_decode_invalid_json_carries_no_id() {
        let err = Frame::decode("{not json").unwrap_err();
        assert_eq!(err.error.code, ErrorCode::ParseError as i32);
        assert!(err.id.is_none());
    }

    #[test]
    fn test_decode_rejects_frame_matching_no_envelope() {
        // Right version, but neither request (no method) nor notification
        // (no method) nor response (no id)
        let err = Frame::decode(r#"{"jsonrpc":"2.0","params":{}}"#).unwrap_err();
        assert_eq!(err.error.code, ErrorCode::InvalidRequest as i32);
        assert!(err.error.message.contains("invalid frame"));
    }

    #[test]
    fn test_encode_roundtrip() {
        let request = JsonRpcRequest::new(42, "tools/call", Some(json!({"name": "add"})));
        let raw = Frame::Request(request).encode().unwrap();
        let parsed = Frame::decode(&raw).unwrap();
        assert_eq!(parsed.method(), Some("tools/call"));
        assert_eq!(parsed.request_id(), Some(&RequestId::Number(42)));
    }

    #[test]
    fn test_string_and_number_ids_are_distinct() {
        assert_ne!(
            RequestId::Number(1),
            RequestId::String("1".to_string()),
            "id type must be preserved, not coerced"
        );
    }

    #[test]
    fn test_response_constructors() {
        let ok = JsonRpcResponse::success(RequestId::Number(1), json!({"ok": true}));
        assert!(ok.result.is_some() && ok.error.is_none());

        let err = JsonRpcResponse::error(RequestId::Number(2), JsonRpcError::parse_error());
        assert!(err.result.is_none());
        assert_eq!(err.error.unwrap().code, -32700);
    }
}
