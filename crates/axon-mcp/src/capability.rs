//! Capability Inference
//!
//! Derives the capability set to advertise at handshake from the handlers
//! actually registered, then merges in explicit overrides (explicit wins
//! field-by-field; `experimental` only ever comes from the explicit side).
//!
//! Advertising a capability with no matching handler is a warning, not an
//! error — useful for testing and forward compatibility. The reverse (a
//! handler for an unadvertised capability) is logged less severely.

use axon_core::capabilities::{
    ClientCapabilities, CompletionsCapability, ElicitationCapability, LoggingCapability,
    PromptsCapability, ResourcesCapability, RootsCapability, SamplingCapability,
    ServerCapabilities, TasksCapability, ToolsCapability,
};
use axon_core::messages::methods;
use tracing::{debug, warn};

use crate::registry::HandlerRegistry;

fn has_any(registry: &HandlerRegistry, candidates: &[&str]) -> bool {
    candidates
        .iter()
        .any(|method| registry.has_request_handler(method))
}

/// Infer server-side capabilities from registered request handlers.
pub(crate) fn infer_server_capabilities(registry: &HandlerRegistry) -> ServerCapabilities {
    ServerCapabilities {
        tools: has_any(registry, &[methods::TOOLS_LIST, methods::TOOLS_CALL])
            .then(ToolsCapability::default),
        prompts: has_any(registry, &[methods::PROMPTS_LIST, methods::PROMPTS_GET])
            .then(PromptsCapability::default),
        resources: has_any(
            registry,
            &[
                methods::RESOURCES_LIST,
                methods::RESOURCES_READ,
                methods::RESOURCES_SUBSCRIBE,
            ],
        )
        .then(ResourcesCapability::default),
        logging: has_any(registry, &[methods::LOGGING_SET_LEVEL]).then(LoggingCapability::default),
        completions: has_any(registry, &[methods::COMPLETION_COMPLETE])
            .then(CompletionsCapability::default),
        experimental: None,
    }
}

/// Infer client-side capabilities from registered request handlers.
pub(crate) fn infer_client_capabilities(registry: &HandlerRegistry) -> ClientCapabilities {
    let has_tasks = registry
        .request_methods()
        .any(|method| method.starts_with(methods::TASKS_PREFIX));

    ClientCapabilities {
        sampling: has_any(registry, &[methods::SAMPLING_CREATE_MESSAGE])
            .then(SamplingCapability::default),
        elicitation: has_any(registry, &[methods::ELICITATION_CREATE])
            .then(ElicitationCapability::default),
        roots: has_any(registry, &[methods::ROOTS_LIST]).then(RootsCapability::default),
        tasks: has_tasks.then(TasksCapability::default),
        experimental: None,
    }
}

fn check(advertised: bool, handled: bool, capability: &str) {
    if advertised && !handled {
        warn!(
            capability,
            "capability advertised without a registered handler"
        );
    } else if handled && !advertised {
        debug!(
            capability,
            "handler registered for a capability that is not advertised"
        );
    }
}

/// Log mismatches between the advertised server capabilities and the
/// registry they will be served from.
pub(crate) fn audit_server_capabilities(
    advertised: &ServerCapabilities,
    registry: &HandlerRegistry,
) {
    check(
        advertised.tools.is_some(),
        has_any(registry, &[methods::TOOLS_LIST, methods::TOOLS_CALL]),
        "tools",
    );
    check(
        advertised.prompts.is_some(),
        has_any(registry, &[methods::PROMPTS_LIST, methods::PROMPTS_GET]),
        "prompts",
    );
    check(
        advertised.resources.is_some(),
        has_any(
            registry,
            &[
                methods::RESOURCES_LIST,
                methods::RESOURCES_READ,
                methods::RESOURCES_SUBSCRIBE,
            ],
        ),
        "resources",
    );
    check(
        advertised.logging.is_some(),
        has_any(registry, &[methods::LOGGING_SET_LEVEL]),
        "logging",
    );
    check(
        advertised.completions.is_some(),
        has_any(registry, &[methods::COMPLETION_COMPLETE]),
        "completions",
    );
}

/// Log mismatches between the advertised client capabilities and the
/// registry they will be served from.
pub(crate) fn audit_client_capabilities(
    advertised: &ClientCapabilities,
    registry: &HandlerRegistry,
) {
    check(
        advertised.sampling.is_some(),
        has_any(registry, &[methods::SAMPLING_CREATE_MESSAGE]),
        "sampling",
    );
    check(
        advertised.elicitation.is_some(),
        has_any(registry, &[methods::ELICITATION_CREATE]),
        "elicitation",
    );
    check(
        advertised.roots.is_some(),
        has_any(registry, &[methods::ROOTS_LIST]),
        "roots",
    );
    check(
        advertised.tasks.is_some(),
        registry
            .request_methods()
            .any(|method| method.starts_with(methods::TASKS_PREFIX)),
        "tasks",
    );
}

// ============================================================================
// TESTS
// ============================================================================
