//! Handler Context
//!
//! Per-invocation view of the session handed to every handler. Holds only a
//! weak reference back to the session, so a handler that stashes its context
//! cannot keep a disconnected session alive.

use std::sync::Weak;

use axon_core::messages::{methods, ProgressParams, ProgressToken};
use axon_core::types::RequestId;
use serde_json::Value;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::session::{RequestOptions, Session, SessionInner};

/// Context passed to request and notification handlers.
pub struct HandlerContext {
    pub(crate) inner: Weak<SessionInner>,
    pub(crate) method: String,
    pub(crate) request_id: Option<RequestId>,
    pub(crate) progress_token: Option<ProgressToken>,
    pub(crate) cancel: CancelToken,
}

impl HandlerContext {
    /// The inbound message's method. Lets a fallback handler see which
    /// method it caught.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The inbound request's id; `None` for notification handlers.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// True once the peer cancelled this request (or the session closed).
    /// Handlers are expected to check this at await points; work done after
    /// cancellation is wasted — the response will be discarded.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for cancellation. Useful in `select!` against the real work.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// The peer's stated reason for cancelling, if it gave one.
    pub fn cancel_reason(&self) -> Option<String> {
        self.cancel.reason()
    }

    /// The live session, if it still exists.
    pub fn session(&self) -> Option<Session> {
        self.inner.upgrade().map(Session::from_inner)
    }

    /// Report progress for the request being handled.
    ///
    /// Silently does nothing when the caller did not ask for progress (no
    /// `_meta.progressToken` on the inbound request).
    pub async fn report_progress(
        &self,
        value: f64,
        total: Option<f64>,
        message: Option<String>,
    ) -> Result<()> {
        let Some(token) = &self.progress_token else {
            debug!("progress reported for a request without a progress token");
            return Ok(());
        };
        let inner = self.inner.upgrade().ok_or_else(|| Error::closed(None))?;

        let params = ProgressParams {
            progress_token: token.clone(),
            progress: value,
            total,
            message,
        };
        let params =
            serde_json::to_value(params).map_err(|e| Error::Internal(e.to_string()))?;
        inner
            .send_notification(methods::NOTIF_PROGRESS, Some(params))
            .await
    }

    /// Issue a request back into the session. Handlers run off the reader
    /// task, so this cannot deadlock the session's message loop.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let inner = self.inner.upgrade().ok_or_else(|| Error::closed(None))?;
        inner
            .send_request(method, params, RequestOptions::default(), None)
            .await
    }

    /// Send a notification on the session.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let inner = self.inner.upgrade().ok_or_else(|| Error::closed(None))?;
        inner.send_notification(method, params).await
    }

    /// A context wired to nothing — for exercising handlers in isolation.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            inner: Weak::new(),
            method: String::new(),
            request_id: None,
            progress_token: None,
            cancel: CancelToken::new(),
        }
    }
}
