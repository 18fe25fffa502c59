//! Capability Model
//!
//! Structured feature flags exchanged during the `initialize` handshake.
//! The server advertises what it serves (tools, prompts, resources, logging,
//! completions); the client advertises what it can be asked for (sampling,
//! elicitation, roots, tasks). Each side uses the peer's set to decide which
//! methods to attempt.
//!
//! The session runtime infers a capability set from the registered handlers
//! and merges it with explicit overrides via [`ServerCapabilities::merged`] /
//! [`ClientCapabilities::merged`]: the explicit side wins field-by-field, and
//! `experimental` is always taken from the explicit side.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// SERVER-SIDE CAPABILITIES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Empty marker capability — advertised as `{}` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingCapability {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionsCapability {}

/// Capabilities a server advertises in `InitializeResult`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<CompletionsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
}

impl ServerCapabilities {
    /// Merge an inferred set with explicit overrides.
    ///
    /// Explicit wins wherever it is non-null; `experimental` always comes
    /// from the explicit side (it cannot be inferred from handlers).
    pub fn merged(inferred: Self, explicit: &Self) -> Self {
        Self {
            tools: explicit.tools.clone().or(inferred.tools),
            prompts: explicit.prompts.clone().or(inferred.prompts),
            resources: explicit.resources.clone().or(inferred.resources),
            logging: explicit.logging.clone().or(inferred.logging),
            completions: explicit.completions.clone().or(inferred.completions),
            experimental: explicit.experimental.clone(),
        }
    }
}

// ============================================================================
// CLIENT-SIDE CAPABILITIES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingCapability {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElicitationCapability {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootsCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasksCapability {}

/// Capabilities a client advertises in the `initialize` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TasksCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
}

impl ClientCapabilities {
    /// Merge an inferred set with explicit overrides; same rules as
    /// [`ServerCapabilities::merged`].
    pub fn merged(inferred: Self, explicit: &Self) -> Self {
        Self {
            sampling: explicit.sampling.clone().or(inferred.sampling),
            elicitation: explicit.elicitation.clone().or(inferred.elicitation),
            roots: explicit.roots.clone().or(inferred.roots),
            tasks: explicit.tasks.clone().or(inferred.tasks),
            experimental: explicit.experimental.clone(),
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
    fn test_empty_capabilities_serialize_to_empty_object() {
        let value = serde_json::to_value(ServerCapabilities::default()).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_wire_shape_uses_camel_case() {
        let caps = ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(true),
            }),
            resources: Some(ResourcesCapability {
                subscribe: Some(false),
                list_changed: None,
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&caps).unwrap();
        assert_eq!(value["tools"]["listChanged"], true);
        assert_eq!(value["resources"]["subscribe"], false);
    }

    #[test]
    fn test_merge_explicit_wins_per_field() {
        let inferred = ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: None }),
            prompts: Some(PromptsCapability { list_changed: None }),
            ..Default::default()
        };
        let explicit = ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(true),
            }),
            logging: Some(LoggingCapability {}),
            ..Default::default()
        };

        let merged = ServerCapabilities::merged(inferred, &explicit);
        // Explicit tools replaces inferred tools wholesale
        assert_eq!(merged.tools.unwrap().list_changed, Some(true));
        // Inferred prompts survives where explicit is silent
        assert!(merged.prompts.is_some());
        // Explicit-only logging is carried
        assert!(merged.logging.is_some());
    }

    #[test]
    fn test_merge_experimental_always_from_explicit() {
        let inferred = ServerCapabilities {
            experimental: Some(HashMap::from([("x".to_string(), json!(1))])),
            ..Default::default()
        };
        let explicit = ServerCapabilities::default();

        let merged = ServerCapabilities::merged(inferred, &explicit);
        assert!(merged.experimental.is_none());
    }

    #[test]
    fn test_client_merge() {
        let inferred = ClientCapabilities {
            sampling: Some(SamplingCapability {}),
            ..Default::default()
        };
        let explicit = ClientCapabilities {
            roots: Some(RootsCapability {
                list_changed: Some(true),
            }),
            ..Default::default()
        };

        let merged = ClientCapabilities::merged(inferred, &explicit);
        assert!(merged.sampling.is_some());
        assert!(merged.roots.is_some());
    }
}
