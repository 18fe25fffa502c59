//! Cancellation Signal
//!
//! A small observable flag with an async waiter, used in two places: as the
//! caller-side cancel handle carried in `RequestOptions`, and as the
//! per-request signal a handler observes through its `HandlerContext` when
//! the peer (or a timeout on the peer's side) cancels the work.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

struct CancelState {
    flag: watch::Sender<bool>,
    reason: Mutex<Option<String>>,
}

/// Cloneable cancellation token. Triggering is one-way and idempotent; the
/// first reason provided wins.
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            state: Arc::new(CancelState {
                flag,
                reason: Mutex::new(None),
            }),
        }
    }

    /// Trigger the token. Later calls keep the original reason.
    pub fn cancel(&self, reason: Option<String>) {
        {
            let mut slot = self.state.reason.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_none() {
                *slot = reason;
            }
        }
        let _ = self.state.flag.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.flag.borrow()
    }

    /// The reason given when the token was triggered, if any.
    pub fn reason(&self) -> Option<String> {
        self.state
            .reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Wait until the token is triggered. Resolves immediately if it already
    /// was; safe to call from any number of tasks.
    pub async fn cancelled(&self) {
        let mut rx = self.state.flag.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone means the token can never fire; park forever
                // rather than spuriously reporting cancellation.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancelled_resolves_after_trigger() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
            waiter.reason()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel(Some("done waiting".to_string()));

        let reason = handle.await.unwrap();
        assert_eq!(reason.as_deref(), Some("done waiting"));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_already_triggered() {
        let token = CancelToken::new();
        token.cancel(None);
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_first_reason_wins() {
        let token = CancelToken::new();
        token.cancel(Some("first".to_string()));
        token.cancel(Some("second".to_string()));
        assert_eq!(token.reason().as_deref(), Some("first"));
    }
}
