//! Progress Router
//!
//! Allocates progress tokens for outbound requests and routes inbound
//! `notifications/progress` to the registered sink. Token lifetime is tied
//! to the pending entry: registered together, removed together, never reused
//! within a session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use axon_core::messages::{ProgressParams, ProgressToken};
use axon_core::types::RequestId;
use tracing::debug;

/// One progress update, as delivered to an `on_progress` sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub value: f64,
    pub total: Option<f64>,
    pub message: Option<String>,
}

/// Sink invoked for each progress update of one request. Runs on the
/// session's reader task, so it should return quickly.
pub type ProgressCallback = Box<dyn Fn(Progress) + Send + Sync>;

struct Sink {
    request_id: RequestId,
    callback: Arc<ProgressCallback>,
    last_value: Option<f64>,
}

/// The `token → sink` map plus the per-session token counter.
#[derive(Default)]
pub(crate) struct ProgressRouter {
    sinks: Mutex<HashMap<ProgressToken, Sink>>,
    next_token: AtomicI64,
}

impl ProgressRouter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh token and register `callback` as the sink for it.
    pub(crate) fn register(&self, request_id: RequestId, callback: ProgressCallback) -> ProgressToken {
        let token = ProgressToken::Number(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(
            token.clone(),
            Sink {
                request_id,
                callback: Arc::new(callback),
                last_value: None,
            },
        );
        token
    }

    /// Route one inbound progress notification. Returns the request id the
    /// token belongs to so the caller can reset its deadline, or `None` for
    /// unknown tokens (dropped). The sink is invoked without holding locks.
    pub(crate) fn route(&self, params: &ProgressParams) -> Option<RequestId> {
        let (request_id, callback) = {
            let mut sinks = self.lock();
            let sink = match sinks.get_mut(&params.progress_token) {
                Some(sink) => sink,
                None => {
                    debug!(token = %params.progress_token, "dropping progress for unknown token");
                    return None;
                }
            };
            // Forward-and-log: a non-increasing value is suspicious but the
            // protocol does not forbid it, so the sink still sees it.
            if sink.last_value.is_some_and(|last| params.progress <= last) {
                debug!(
                    token = %params.progress_token,
                    value = params.progress,
                    "non-monotonic progress value"
                );
            }
            sink.last_value = Some(params.progress);
            (sink.request_id.clone(), sink.callback.clone())
        };

        callback(Progress {
            value: params.progress,
            total: params.total,
            message: params.message.clone(),
        });
        Some(request_id)
    }

    /// Drop every sink registered for `request_id`. Called when the request
    /// completes, times out, or is cancelled.
    pub(crate) fn remove_for_request(&self, request_id: &RequestId) {
        self.lock().retain(|_, sink| sink.request_id != *request_id);
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ProgressToken, Sink>> {
        self.sinks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn params(token: &ProgressToken, value: f64) -> ProgressParams {
        ProgressParams {
            progress_token: token.clone(),
            progress: value,
            total: None,
            message: None,
        }
    }

    #[test]
    fn test_tokens_are_unique() {
        let router = ProgressRouter::new();
        let a = router.register(RequestId::Number(1), Box::new(|_| {}));
        let b = router.register(RequestId::Number(2), Box::new(|_| {}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_route_invokes_sink_and_returns_request_id() {
        let router = ProgressRouter::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_sink = seen.clone();
        let token = router.register(
            RequestId::Number(7),
            Box::new(move |progress| {
                assert_eq!(progress.value, 0.5);
                seen_in_sink.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let routed = router.route(&params(&token, 0.5));
        assert_eq!(routed, Some(RequestId::Number(7)));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_token_is_dropped() {
        let router = ProgressRouter::new();
        assert!(router.route(&params(&ProgressToken::Number(99), 1.0)).is_none());
    }

    #[test]
    fn test_non_monotonic_progress_is_still_forwarded() {
        let router = ProgressRouter::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_sink = seen.clone();
        let token = router.register(
            RequestId::Number(1),
            Box::new(move |_| {
                seen_in_sink.fetch_add(1, Ordering::SeqCst);
            }),
        );

        router.route(&params(&token, 2.0));
        router.route(&params(&token, 1.0));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_for_request_unregisters_sink() {
        let router = ProgressRouter::new();
        let token = router.register(RequestId::Number(1), Box::new(|_| {}));
        router.remove_for_request(&RequestId::Number(1));
        assert!(router.route(&params(&token, 1.0)).is_none());
    }
}
