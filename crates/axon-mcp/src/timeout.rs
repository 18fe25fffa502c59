//! Deadline Queue
//!
//! Per-request deadlines with optional progress-reset and a hard ceiling.
//! One manager task per session waits on the queue, fails the expired
//! request's pending entry, and emits the best-effort cancellation
//! notification to the peer.
//!
//! Arithmetic per request:
//! - `timeout = T` arms `fire_at = now + T`; `timeout = None` with no
//!   ceiling arms nothing.
//! - each progress arrival (when `reset_on_progress`) moves `fire_at` to
//!   `now + T`, clamped to the ceiling;
//! - `max_total = H` fixes `hard_limit_at = started_at + H`; `fire_at` never
//!   passes it, so the request fails by `H` regardless of progress count.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use axon_core::types::RequestId;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::session::RequestOptions;

/// Deadline state for one in-flight request.
#[derive(Debug, Clone)]
struct Deadline {
    base: Option<Duration>,
    reset_on_progress: bool,
    started_at: Instant,
    last_reset_at: Instant,
    fire_at: Instant,
    hard_limit_at: Option<Instant>,
}

/// An expired deadline, ready to be turned into a `RequestTimeout`.
#[derive(Debug)]
pub(crate) struct Expired {
    pub id: RequestId,
    pub elapsed: Duration,
    pub hard: bool,
}

/// The deadline queue. `next_expired` is driven by a single consumer (the
/// session's timeout-manager task); `notify_one` keeps a permit when the
/// queue changes while the consumer is mid-computation.
#[derive(Default)]
pub(crate) struct DeadlineQueue {
    entries: Mutex<HashMap<RequestId, Deadline>>,
    changed: Notify,
}

impl DeadlineQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Arm a deadline for `id` per the request options. No-op when neither a
    /// timeout nor a ceiling is configured.
    pub(crate) fn arm(&self, id: RequestId, options: &RequestOptions) {
        let now = Instant::now();
        let hard_limit_at = options.max_total.map(|h| now + h);
        let base_fire = options.timeout.map(|t| now + t);

        let fire_at = match (base_fire, hard_limit_at) {
            (Some(base), Some(hard)) => base.min(hard),
            (Some(base), None) => base,
            (None, Some(hard)) => hard,
            (None, None) => return,
        };

        self.lock().insert(
            id,
            Deadline {
                base: options.timeout,
                reset_on_progress: options.reset_on_progress,
                started_at: now,
                last_reset_at: now,
                fire_at,
                hard_limit_at,
            },
        );
        self.changed.notify_one();
    }

    /// Drop the deadline for `id` (response arrived, cancelled, or failed).
    pub(crate) fn disarm(&self, id: &RequestId) {
        if self.lock().remove(id).is_some() {
            self.changed.notify_one();
        }
    }

    /// Progress arrived for `id`: push the deadline out to `now + base`,
    /// never past the hard ceiling. No-op unless `reset_on_progress` was set.
    pub(crate) fn reset(&self, id: &RequestId) {
        let mut entries = self.lock();
        let Some(deadline) = entries.get_mut(id) else {
            return;
        };
        if !deadline.reset_on_progress {
            return;
        }
        let Some(base) = deadline.base else {
            return;
        };

        let now = Instant::now();
        let mut fire_at = now + base;
        if let Some(hard) = deadline.hard_limit_at {
            fire_at = fire_at.min(hard);
        }
        debug!(
            %id,
            since_last_reset = ?now.duration_since(deadline.last_reset_at),
            "deadline reset on progress"
        );
        deadline.last_reset_at = now;
        deadline.fire_at = fire_at;
        drop(entries);
        self.changed.notify_one();
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
        self.changed.notify_one();
    }

    /// Wait for the next deadline to expire and remove it. Pends forever
    /// while the queue is empty; a reset that moves a deadline re-enters the
    /// wait. Single consumer only.
    pub(crate) async fn next_expired(&self) -> Expired {
        loop {
            let next = self
                .lock()
                .iter()
                .min_by_key(|(_, deadline)| deadline.fire_at)
                .map(|(id, deadline)| (id.clone(), deadline.fire_at));

            match next {
                Some((id, fire_at)) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(fire_at) => {
                            if let Some(expired) = self.take_if_due(&id) {
                                return expired;
                            }
                            // A reset moved it while we slept; recompute.
                        }
                        _ = self.changed.notified() => {}
                    }
                }
                None => self.changed.notified().await,
            }
        }
    }

    fn take_if_due(&self, id: &RequestId) -> Option<Expired> {
        let mut entries = self.lock();
        let due = entries
            .get(id)
            .is_some_and(|deadline| deadline.fire_at <= Instant::now());
        if !due {
            return None;
        }
        let deadline = entries.remove(id)?;
        Some(Expired {
            id: id.clone(),
            elapsed: deadline.started_at.elapsed(),
            hard: deadline
                .hard_limit_at
                .is_some_and(|hard| deadline.fire_at >= hard),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, Deadline>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn options(
        timeout: Option<Duration>,
        reset_on_progress: bool,
        max_total: Option<Duration>,
    ) -> RequestOptions {
        let mut opts = match timeout {
            Some(t) => RequestOptions::with_timeout(t),
            None => RequestOptions::no_timeout(),
        };
        opts.reset_on_progress = reset_on_progress;
        opts.max_total = max_total;
        opts
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_after_timeout() {
        let queue = DeadlineQueue::new();
        queue.arm(
            RequestId::Number(1),
            &options(Some(Duration::from_millis(100)), false, None),
        );

        let expired = queue.next_expired().await;
        assert_eq!(expired.id, RequestId::Number(1));
        assert!(expired.elapsed >= Duration::from_millis(100));
        assert!(!expired.hard);
    }

    #[tokio::test(start_paused = true)]
    async fn test_earliest_deadline_fires_first() {
        let queue = DeadlineQueue::new();
        queue.arm(
            RequestId::Number(1),
            &options(Some(Duration::from_millis(500)), false, None),
        );
        queue.arm(
            RequestId::Number(2),
            &options(Some(Duration::from_millis(100)), false, None),
        );

        assert_eq!(queue.next_expired().await.id, RequestId::Number(2));
        assert_eq!(queue.next_expired().await.id, RequestId::Number(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_pushes_deadline_out() {
        let queue = std::sync::Arc::new(DeadlineQueue::new());
        queue.arm(
            RequestId::Number(1),
            &options(Some(Duration::from_millis(100)), true, None),
        );

        let resetter = queue.clone();
        tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(60)).await;
                resetter.reset(&RequestId::Number(1));
            }
        });

        let expired = queue.next_expired().await;
        // Three resets at 60ms intervals: expiry lands near 180 + 100 = 280ms
        assert!(expired.elapsed >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_never_passes_hard_ceiling() {
        let queue = std::sync::Arc::new(DeadlineQueue::new());
        queue.arm(
            RequestId::Number(1),
            &options(
                Some(Duration::from_millis(200)),
                true,
                Some(Duration::from_millis(300)),
            ),
        );

        let resetter = queue.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                resetter.reset(&RequestId::Number(1));
            }
        });

        let expired = queue.next_expired().await;
        assert!(expired.hard);
        assert!(expired.elapsed >= Duration::from_millis(300));
        assert!(expired.elapsed < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_without_flag_is_ignored() {
        let queue = DeadlineQueue::new();
        queue.arm(
            RequestId::Number(1),
            &options(Some(Duration::from_millis(100)), false, None),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        queue.reset(&RequestId::Number(1));

        let expired = queue.next_expired().await;
        assert!(expired.elapsed < Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timeout_with_ceiling_fires_hard() {
        let queue = DeadlineQueue::new();
        queue.arm(
            RequestId::Number(1),
            &options(None, true, Some(Duration::from_millis(250))),
        );

        let expired = queue.next_expired().await;
        assert!(expired.hard);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_prevents_expiry() {
        let queue = std::sync::Arc::new(DeadlineQueue::new());
        queue.arm(
            RequestId::Number(1),
            &options(Some(Duration::from_millis(100)), false, None),
        );
        queue.arm(
            RequestId::Number(2),
            &options(Some(Duration::from_millis(200)), false, None),
        );
        queue.disarm(&RequestId::Number(1));

        let expired = queue.next_expired().await;
        assert_eq!(expired.id, RequestId::Number(2));
    }
}
