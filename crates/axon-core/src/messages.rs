//! MCP Message Types
//!
//! Typed payloads for the protocol-level messages the session core speaks
//! itself: the `initialize` handshake, progress, and cancellation. Tool,
//! prompt, and resource payloads stay untyped `serde_json::Value` — they
//! belong to the application layer above the core.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capabilities::{ClientCapabilities, ServerCapabilities};
use crate::error::{ProtocolError, Result};

/// MCP protocol version implemented by this runtime.
pub const PROTOCOL_VERSION: &str = "2025-11-25";

// ============================================================================
// METHOD NAMES
// ============================================================================

/// The MCP method set, as wire strings.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";

    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
    pub const COMPLETION_COMPLETE: &str = "completion/complete";

    pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
    pub const ELICITATION_CREATE: &str = "elicitation/create";
    pub const ROOTS_LIST: &str = "roots/list";
    pub const TASKS_PREFIX: &str = "tasks/";

    pub const NOTIF_INITIALIZED: &str = "notifications/initialized";
    pub const NOTIF_CANCELLED: &str = "notifications/cancelled";
    pub const NOTIF_PROGRESS: &str = "notifications/progress";
    pub const NOTIF_TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    pub const NOTIF_PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
    pub const NOTIF_RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
    pub const NOTIF_ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";
}

// ============================================================================
// INITIALIZE HANDSHAKE
// ============================================================================

/// Name and version of one side's implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

impl Implementation {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

/// Params of the `initialize` request, sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    pub client_info: Implementation,
}

/// Result of the `initialize` request, returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// ============================================================================
// PROGRESS
// ============================================================================

/// Opaque token correlating `notifications/progress` with an in-flight
/// request. Axon allocates numeric tokens from a per-session counter but
/// echoes back whatever form a peer used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    Number(i64),
    String(String),
}

impl std::fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressToken::Number(n) => write!(f, "{}", n),
            ProgressToken::String(s) => write!(f, "{}", s),
        }
    }
}

/// Params of `notifications/progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    pub progress_token: ProgressToken,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Params of `notifications/cancelled`. `request_id` names a request the
/// *sender's peer* originated, i.e. one the receiver is currently handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledParams {
    pub request_id: crate::types::RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ============================================================================
// PROGRESS TOKEN PIGGYBACK
// ============================================================================

/// Attach a progress token to request params as `_meta.progressToken`.
///
/// Absent params become `{"_meta": {...}}`; an existing `_meta` object is
/// extended. Non-object params cannot carry metadata and are rejected.
pub fn inject_progress_token(params: Option<Value>, token: &ProgressToken) -> Result<Value> {
    let mut map = match params {
        None => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(ProtocolError::NonObjectParams),
    };

    let meta = map
        .entry("_meta".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    match meta {
        Value::Object(meta) => {
            meta.insert(
                "progressToken".to_string(),
                serde_json::to_value(token).unwrap_or(Value::Null),
            );
        }
        _ => return Err(ProtocolError::NonObjectParams),
    }

    Ok(Value::Object(map))
}

/// Read `_meta.progressToken` out of inbound request params, if present.
pub fn extract_progress_token(params: Option<&Value>) -> Option<ProgressToken> {
    let token = params?.get("_meta")?.get("progressToken")?;
    serde_json::from_value(token.clone()).ok()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initialize_request_uses_camel_case() {
        let request = InitializeRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation::new("test-client", "1.0.0"),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(value["clientInfo"]["name"], "test-client");
    }

    #[test]
    fn test_initialize_result_roundtrip() {
        let raw = json!({
            "protocolVersion": "2025-11-25",
            "capabilities": { "tools": { "listChanged": true } },
            "serverInfo": { "name": "demo", "version": "0.1.0" },
            "instructions": "be gentle"
        });

        let result: InitializeResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.protocol_version, PROTOCOL_VERSION);
        assert!(result.capabilities.tools.is_some());
        assert_eq!(result.instructions.as_deref(), Some("be gentle"));
    }

    #[test]
    fn test_inject_token_into_absent_params() {
        let params = inject_progress_token(None, &ProgressToken::Number(7)).unwrap();
        assert_eq!(params["_meta"]["progressToken"], 7);
    }

    #[test]
    fn test_inject_token_preserves_existing_fields() {
        let params = inject_progress_token(
            Some(json!({"name": "add", "_meta": {"traceId": "x"}})),
            &ProgressToken::Number(3),
        )
        .unwrap();
        assert_eq!(params["name"], "add");
        assert_eq!(params["_meta"]["traceId"], "x");
        assert_eq!(params["_meta"]["progressToken"], 3);
    }

    #[test]
    fn test_inject_token_rejects_non_object_params() {
        let result = inject_progress_token(Some(json!([1, 2])), &ProgressToken::Number(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_token() {
        let params = json!({"_meta": {"progressToken": "tok-1"}});
        assert_eq!(
            extract_progress_token(Some(&params)),
            Some(ProgressToken::String("tok-1".to_string()))
        );
        assert_eq!(extract_progress_token(Some(&json!({}))), None);
        assert_eq!(extract_progress_token(None), None);
    }

    #[test]
    fn test_cancelled_params_wire_shape() {
        let params = CancelledParams {
            request_id: crate::types::RequestId::Number(9),
            reason: Some("Timed out after 200ms".to_string()),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["requestId"], 9);
        assert_eq!(value["reason"], "Timed out after 200ms");
    }

    #[test]
    fn test_progress_params_flat_shape() {
        let raw = json!({"progressToken": 5, "progress": 0.4, "total": 1.0});
        let params: ProgressParams = serde_json::from_value(raw).unwrap();
        assert_eq!(params.progress_token, ProgressToken::Number(5));
        assert_eq!(params.progress, 0.4);
        assert!(params.message.is_none());
    }
}
