//! Pending Request Table
//!
//! Correlates outbound request IDs with their awaiting callers. Entries are
//! inserted *before* the request frame hits the wire, so a response can never
//! race past its own registration. Every entry resolves exactly once: with
//! the response, a timeout, a cancellation, or `ConnectionClosed` when the
//! session shuts down.

use std::collections::HashMap;
use std::sync::Mutex;

use axon_core::types::RequestId;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::Error;

/// Bookkeeping for one outbound request awaiting its response.
pub(crate) struct PendingEntry {
    method: String,
    tx: oneshot::Sender<Result<Value, Error>>,
}

impl PendingEntry {
    pub(crate) fn method(&self) -> &str {
        &self.method
    }

    /// Fulfill the caller's completion slot. A dropped receiver (caller gave
    /// up) is not an error.
    pub(crate) fn resolve(self, outcome: Result<Value, Error>) {
        let _ = self.tx.send(outcome);
    }
}

/// The `request_id → PendingEntry` map.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: Mutex<HashMap<RequestId, PendingEntry>>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id` and hand back its completion slot.
    pub(crate) fn insert(
        &self,
        id: RequestId,
        method: &str,
    ) -> oneshot::Receiver<Result<Value, Error>> {
        let (tx, rx) = oneshot::channel();
        let entry = PendingEntry {
            method: method.to_string(),
            tx,
        };
        let previous = self.lock().insert(id, entry);
        debug_assert!(previous.is_none(), "request id reused within session");
        rx
    }

    /// Resolve the entry for `id`, if one is still waiting. Returns `false`
    /// for unknown IDs — late responses after a timeout or cancel are
    /// expected and must not be treated as errors.
    pub(crate) fn complete(&self, id: &RequestId, outcome: Result<Value, Error>) -> bool {
        match self.take(id) {
            Some(entry) => {
                entry.resolve(outcome);
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `id` without resolving it. Used by the cancel
    /// and timeout paths, which resolve with their own error.
    pub(crate) fn take(&self, id: &RequestId) -> Option<PendingEntry> {
        self.lock().remove(id)
    }

    /// Resolve every entry with `ConnectionClosed`. Called on session close.
    pub(crate) fn fail_all(&self, cause: Option<String>) {
        let drained: Vec<(RequestId, PendingEntry)> = self.lock().drain().collect();
        for (id, entry) in drained {
            debug!(%id, method = entry.method(), "failing pending request: connection closed");
            entry.resolve(Err(Error::closed(cause.clone())));
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, PendingEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================================================
// TESTS
// ============================================================================
