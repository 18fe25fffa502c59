//! Session
//!
//! The public facade over the message engine. A session is created in a
//! role (client or server), handlers are registered while it is `Created`,
//! and `connect` hands it a transport: the reader and timeout-manager tasks
//! start, the initialize handshake runs, and the session enters the
//! `Initialized` serving phase. Beyond the handshake the two roles are
//! symmetric — either side may send requests, notifications, progress, and
//! cancellations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

use axon_core::capabilities::{ClientCapabilities, ServerCapabilities};
use axon_core::messages::{
    inject_progress_token, methods, CancelledParams, Implementation, InitializeRequest,
    InitializeResult, PROTOCOL_VERSION,
};
use axon_core::types::{Frame, JsonRpcNotification, JsonRpcRequest, RequestId};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::capability::{
    audit_client_capabilities, audit_server_capabilities, infer_client_capabilities,
    infer_server_capabilities,
};
use crate::context::HandlerContext;
use crate::dispatch;
use crate::error::{Error, Result};
use crate::pending::PendingTable;
use crate::progress::{ProgressCallback, ProgressRouter};
use crate::registry::{HandlerRegistry, NotificationHandlerFn, RequestHandlerFn};
use crate::timeout::DeadlineQueue;
use crate::transport::{Transport, TransportError};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// STATE MACHINE & ROLE
// ============================================================================

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, handlers may be registered.
    Created,
    /// `connect` is running; the initialize handshake is in flight.
    Connecting,
    /// Handshake complete; serving.
    Initialized,
    /// `disconnect` in progress.
    Closing,
    /// Closed for good.
    Closed,
}

/// Which side of the handshake this session plays. The core is symmetric
/// beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

// ============================================================================
// REQUEST OPTIONS
// ============================================================================

/// Per-request timeout and cancellation policy.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Base timeout; `None` disarms the deadline entirely.
    pub timeout: Option<Duration>,
    /// Reset the deadline to `now + timeout` on each progress notification.
    pub reset_on_progress: bool,
    /// Hard ceiling from the moment the request is sent; expiry fails the
    /// request regardless of progress.
    pub max_total: Option<Duration>,
    /// Caller-side cancel handle. Triggering it resolves the request with
    /// `Cancelled` and tells the peer to stop working.
    pub cancel: Option<CancelToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            reset_on_progress: false,
            max_total: None,
            cancel: None,
        }
    }
}

impl RequestOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn no_timeout() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }

    pub fn reset_on_progress(mut self) -> Self {
        self.reset_on_progress = true;
        self
    }

    pub fn max_total(mut self, ceiling: Duration) -> Self {
        self.max_total = Some(ceiling);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// A bidirectional MCP session. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a client-side session with default (inferred) capabilities.
    pub fn client(info: Implementation) -> Self {
        Self::with_role(Role::Client, info, Default::default(), Default::default())
    }

    /// Create a client-side session with explicit capability overrides.
    pub fn client_with_capabilities(info: Implementation, capabilities: ClientCapabilities) -> Self {
        Self::with_role(Role::Client, info, capabilities, Default::default())
    }

    /// Create a server-side session with default (inferred) capabilities.
    pub fn server(info: Implementation) -> Self {
        Self::with_role(Role::Server, info, Default::default(), Default::default())
    }

    /// Create a server-side session with explicit capability overrides.
    pub fn server_with_capabilities(info: Implementation, capabilities: ServerCapabilities) -> Self {
        Self::with_role(Role::Server, info, Default::default(), capabilities)
    }

    fn with_role(
        role: Role,
        info: Implementation,
        client_caps: ClientCapabilities,
        server_caps: ServerCapabilities,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Created);
        Self {
            inner: Arc::new(SessionInner {
                role,
                local_info: info,
                instructions: Mutex::new(None),
                explicit_client_caps: client_caps,
                explicit_server_caps: server_caps,
                state,
                registry: RwLock::new(Arc::new(HandlerRegistry::default())),
                transport: OnceLock::new(),
                pending: PendingTable::new(),
                deadlines: DeadlineQueue::new(),
                progress: ProgressRouter::new(),
                inflight: Mutex::new(HashMap::new()),
                next_request_id: AtomicI64::new(0),
                closing: AtomicBool::new(false),
                advertised_server_caps: OnceLock::new(),
                advertised_client_caps: OnceLock::new(),
                peer_info: OnceLock::new(),
                peer_server_caps: OnceLock::new(),
                peer_client_caps: OnceLock::new(),
                peer_protocol_version: OnceLock::new(),
                peer_instructions: OnceLock::new(),
                shutdown: CancelToken::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Human-readable instructions included in this server's
    /// `InitializeResult`. Ignored on client sessions.
    pub fn set_instructions(&self, instructions: &str) {
        *self
            .inner
            .instructions
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(instructions.to_string());
    }

    // ------------------------------------------------------------------
    // Handler registration (before connect)
    // ------------------------------------------------------------------

    /// Register a request handler for `method`.
    ///
    /// Registration normally happens before `connect`; capabilities are
    /// inferred from what is registered at that point. Late registration is
    /// allowed (the registry view swaps atomically) but does not change the
    /// advertised capabilities.
    pub fn on_request<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Option<Value>, HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        let handler: RequestHandlerFn = Arc::new(move |params, ctx| Box::pin(handler(params, ctx)));
        self.register(move |registry| registry.set_request_handler(method.to_string(), handler));
    }

    /// Register a notification handler for `method`.
    pub fn on_notification<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Option<Value>, HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let handler: NotificationHandlerFn =
            Arc::new(move |params, ctx| Box::pin(handler(params, ctx)));
        self.register(move |registry| {
            registry.set_notification_handler(method.to_string(), handler)
        });
    }

    /// Register the catch-all for requests with no specific handler. Must be
    /// set before `connect`.
    pub fn set_fallback_request_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Option<Value>, HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        if self.state() != SessionState::Created {
            warn!("fallback request handler must be set before connect; ignored");
            return;
        }
        let handler: RequestHandlerFn = Arc::new(move |params, ctx| Box::pin(handler(params, ctx)));
        self.register(move |registry| registry.set_fallback_request_handler(handler));
    }

    /// Register the catch-all for notifications with no specific handler.
    /// Must be set before `connect`.
    pub fn set_fallback_notification_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Option<Value>, HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        if self.state() != SessionState::Created {
            warn!("fallback notification handler must be set before connect; ignored");
            return;
        }
        let handler: NotificationHandlerFn =
            Arc::new(move |params, ctx| Box::pin(handler(params, ctx)));
        self.register(move |registry| registry.set_fallback_notification_handler(handler));
    }

    /// Apply one registration as a copy-and-swap: handlers already running
    /// keep the view they were dispatched from.
    fn register(&self, install: impl FnOnce(&mut HandlerRegistry)) {
        let mut guard = self
            .inner
            .registry
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let mut updated = HandlerRegistry::clone(&guard);
        install(&mut updated);
        *guard = Arc::new(updated);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Attach a transport and run the initialize handshake.
    ///
    /// Client role: sends `initialize`, validates the server's protocol
    /// version (strict equality), sends `notifications/initialized`.
    /// Server role: serves the inbound handshake and returns once the
    /// client's `notifications/initialized` arrives.
    pub async fn connect(&self, transport: impl Transport + 'static) -> Result<()> {
        let inner = &self.inner;

        let started = inner.state.send_if_modified(|state| {
            if *state == SessionState::Created {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(Error::Protocol(
                "connect may only be called once".to_string(),
            ));
        }

        // Capabilities are inferred from the registry as it stands now.
        let registry = inner.registry_snapshot();
        match inner.role {
            Role::Server => {
                let advertised = ServerCapabilities::merged(
                    infer_server_capabilities(&registry),
                    &inner.explicit_server_caps,
                );
                audit_server_capabilities(&advertised, &registry);
                let _ = inner.advertised_server_caps.set(advertised);
            }
            Role::Client => {
                let advertised = ClientCapabilities::merged(
                    infer_client_capabilities(&registry),
                    &inner.explicit_client_caps,
                );
                audit_client_capabilities(&advertised, &registry);
                let _ = inner.advertised_client_caps.set(advertised);
            }
        }

        let transport: Arc<dyn Transport> = Arc::new(transport);
        let _ = inner.transport.set(transport);

        tokio::spawn(dispatch::run_reader(inner.clone()));
        tokio::spawn(dispatch::run_timeout_manager(inner.clone()));

        let outcome = match inner.role {
            Role::Client => inner.client_handshake().await,
            Role::Server => inner.await_initialized().await,
        };
        if let Err(error) = &outcome {
            warn!(%error, "handshake failed; closing session");
            inner
                .shutdown_with(Some(format!("handshake failed: {}", error)))
                .await;
        }
        outcome
    }

    /// Close the session: stop the reader, fail all pending requests with
    /// `ConnectionClosed`, signal in-flight handlers, close the transport.
    /// Idempotent.
    pub async fn disconnect(&self) {
        self.inner.shutdown_with(None).await;
    }

    // ------------------------------------------------------------------
    // Outbound traffic
    // ------------------------------------------------------------------

    /// Issue a request with default options and await its result.
    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.inner
            .send_request(method, params, RequestOptions::default(), None)
            .await
    }

    /// Issue a request with explicit options and an optional progress sink.
    pub async fn send_with(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Value> {
        self.inner
            .send_request(method, params, options, on_progress)
            .await
    }

    /// Fire-and-forget notification. Ordering relative to other outbound
    /// writes follows the transport.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.inner.send_notification(method, params).await
    }

    /// Liveness probe; the peer answers from its core without touching
    /// application handlers.
    pub async fn ping(&self) -> Result<()> {
        self.send(methods::PING, None).await.map(|_| ())
    }

    // ------------------------------------------------------------------
    // Peer identity (after handshake)
    // ------------------------------------------------------------------

    pub fn peer_info(&self) -> Option<Implementation> {
        self.inner.peer_info.get().cloned()
    }

    pub fn peer_server_capabilities(&self) -> Option<ServerCapabilities> {
        self.inner.peer_server_caps.get().cloned()
    }

    pub fn peer_client_capabilities(&self) -> Option<ClientCapabilities> {
        self.inner.peer_client_caps.get().cloned()
    }

    /// Protocol version the peer reported during the handshake.
    pub fn peer_protocol_version(&self) -> Option<String> {
        self.inner.peer_protocol_version.get().cloned()
    }

    /// Instructions the server offered during initialize, if any.
    pub fn peer_instructions(&self) -> Option<String> {
        self.inner.peer_instructions.get().cloned()
    }
}

// ============================================================================
// SESSION INTERNALS
// ============================================================================

pub(crate) struct SessionInner {
    pub(crate) role: Role,
    local_info: Implementation,
    instructions: Mutex<Option<String>>,
    explicit_client_caps: ClientCapabilities,
    explicit_server_caps: ServerCapabilities,

    state: watch::Sender<SessionState>,
    registry: RwLock<Arc<HandlerRegistry>>,
    transport: OnceLock<Arc<dyn Transport>>,

    pub(crate) pending: PendingTable,
    pub(crate) deadlines: DeadlineQueue,
    pub(crate) progress: ProgressRouter,
    inflight: Mutex<HashMap<RequestId, CancelToken>>,

    next_request_id: AtomicI64,
    closing: AtomicBool,

    advertised_server_caps: OnceLock<ServerCapabilities>,
    advertised_client_caps: OnceLock<ClientCapabilities>,
    peer_info: OnceLock<Implementation>,
    peer_server_caps: OnceLock<ServerCapabilities>,
    peer_client_caps: OnceLock<ClientCapabilities>,
    peer_protocol_version: OnceLock<String>,
    peer_instructions: OnceLock<String>,

    /// Cancelled exactly once, on shutdown; stops the reader and timeout
    /// manager and doubles as the cancel signal for notification handlers.
    pub(crate) shutdown: CancelToken,
}

impl SessionInner {
    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SessionState) {
        let _ = self.state.send_replace(state);
    }

    pub(crate) fn mark_initialized(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Connecting {
                *state = SessionState::Initialized;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn registry_snapshot(&self) -> Arc<HandlerRegistry> {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn transport_arc(&self) -> Option<Arc<dyn Transport>> {
        self.transport.get().cloned()
    }

    pub(crate) fn register_inflight(&self, id: RequestId, token: CancelToken) {
        self.inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, token);
    }

    pub(crate) fn remove_inflight(&self, id: &RequestId) {
        self.inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }

    pub(crate) fn inflight_token(&self, id: &RequestId) -> Option<CancelToken> {
        self.inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    // ------------------------------------------------------------------
    // Outbound paths
    // ------------------------------------------------------------------

    fn ensure_sendable(&self, method: &str) -> Result<()> {
        match self.state() {
            SessionState::Initialized => Ok(()),
            SessionState::Connecting if method == methods::INITIALIZE => Ok(()),
            SessionState::Closing | SessionState::Closed => Err(Error::closed(None)),
            state => Err(Error::Protocol(format!(
                "cannot send request '{}' in state {:?}",
                method, state
            ))),
        }
    }

    pub(crate) async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Value> {
        self.ensure_sendable(method)?;

        let id = RequestId::Number(self.next_request_id.fetch_add(1, Ordering::Relaxed));
        // Registered before the frame hits the wire: a fast peer must not be
        // able to respond before the waiter exists.
        let completion = self.pending.insert(id.clone(), method);

        let mut params = params;
        if let Some(callback) = on_progress {
            let token = self.progress.register(id.clone(), callback);
            match inject_progress_token(params.take(), &token) {
                Ok(injected) => params = Some(injected),
                Err(error) => {
                    self.pending.take(&id);
                    self.progress.remove_for_request(&id);
                    return Err(Error::InvalidParams(error.to_string()));
                }
            }
        }

        self.deadlines.arm(id.clone(), &options);
        debug!(%id, method, "sending request");

        let frame = Frame::Request(JsonRpcRequest::new(id.clone(), method, params));
        if let Err(error) = self.write_frame(frame).await {
            self.pending.take(&id);
            self.deadlines.disarm(&id);
            self.progress.remove_for_request(&id);
            return Err(error);
        }

        let outcome = match options.cancel {
            Some(cancel) => {
                tokio::select! {
                    outcome = completion => outcome,
                    _ = cancel.cancelled() => {
                        let reason = cancel.reason();
                        self.cancel_request(
                            &id,
                            reason
                                .clone()
                                .or_else(|| Some("Cancelled by caller".to_string())),
                        )
                        .await;
                        return Err(Error::Cancelled { reason });
                    }
                }
            }
            None => completion.await,
        };

        match outcome {
            Ok(result) => result,
            // Completion slot dropped without resolving: session closed.
            Err(_) => Err(Error::closed(None)),
        }
    }

    pub(crate) async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        match self.state() {
            SessionState::Initialized | SessionState::Connecting => {}
            SessionState::Closing | SessionState::Closed => return Err(Error::closed(None)),
            state => {
                return Err(Error::Protocol(format!(
                    "cannot send notification '{}' in state {:?}",
                    method, state
                )));
            }
        }
        self.write_frame(Frame::Notification(JsonRpcNotification::new(method, params)))
            .await
    }

    pub(crate) async fn write_frame(&self, frame: Frame) -> Result<()> {
        let transport = self
            .transport
            .get()
            .ok_or_else(|| Error::Protocol("session is not connected".to_string()))?
            .clone();
        transport.send(frame).await.map_err(|error| match error {
            TransportError::Closed => Error::closed(None),
            other => Error::Transport(other),
        })
    }

    /// Caller-side cancellation: drop the pending entry and tell the peer to
    /// stop. The notification is written before this returns, so it precedes
    /// any further outbound writes from the caller.
    pub(crate) async fn cancel_request(&self, id: &RequestId, reason: Option<String>) {
        if self.pending.take(id).is_none() {
            return;
        }
        self.deadlines.disarm(id);
        self.progress.remove_for_request(id);
        info!(%id, ?reason, "cancelling in-flight request");
        self.notify_cancelled(id, reason).await;
    }

    /// Best-effort `notifications/cancelled`; a failed send is logged, never
    /// fatal.
    pub(crate) async fn notify_cancelled(&self, id: &RequestId, reason: Option<String>) {
        let params = CancelledParams {
            request_id: id.clone(),
            reason,
        };
        let params = match serde_json::to_value(params) {
            Ok(params) => params,
            Err(error) => {
                debug!(%error, "failed to encode cancellation params");
                return;
            }
        };
        let frame = Frame::Notification(JsonRpcNotification::new(
            methods::NOTIF_CANCELLED,
            Some(params),
        ));
        if let Err(error) = self.write_frame(frame).await {
            debug!(%id, %error, "failed to send cancellation notification");
        }
    }

    // ------------------------------------------------------------------
    // Handshake
    // ------------------------------------------------------------------

    pub(crate) async fn client_handshake(&self) -> Result<()> {
        let capabilities = self
            .advertised_client_caps
            .get()
            .cloned()
            .unwrap_or_default();
        let request = InitializeRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities,
            client_info: self.local_info.clone(),
        };
        let params = serde_json::to_value(request).map_err(|e| Error::Internal(e.to_string()))?;

        let value = self
            .send_request(
                methods::INITIALIZE,
                Some(params),
                RequestOptions::default(),
                None,
            )
            .await?;
        let result: InitializeResult = serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("malformed initialize result: {}", e)))?;

        if result.protocol_version != PROTOCOL_VERSION {
            return Err(Error::VersionMismatch {
                received: result.protocol_version,
                supported: PROTOCOL_VERSION,
            });
        }

        info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            "initialize handshake complete"
        );
        let _ = self.peer_info.set(result.server_info);
        let _ = self.peer_server_caps.set(result.capabilities);
        let _ = self.peer_protocol_version.set(result.protocol_version);
        if let Some(instructions) = result.instructions {
            let _ = self.peer_instructions.set(instructions);
        }

        self.send_notification(methods::NOTIF_INITIALIZED, None)
            .await?;
        self.mark_initialized();
        Ok(())
    }

    /// Server role: wait for the reader to see `initialize` +
    /// `notifications/initialized`.
    pub(crate) async fn await_initialized(&self) -> Result<()> {
        let mut state = self.state.subscribe();
        loop {
            match *state.borrow_and_update() {
                SessionState::Initialized => return Ok(()),
                SessionState::Closing | SessionState::Closed => {
                    return Err(Error::closed(Some(
                        "session closed before initialization completed".to_string(),
                    )));
                }
                _ => {}
            }
            if state.changed().await.is_err() {
                return Err(Error::closed(None));
            }
        }
    }

    pub(crate) fn record_peer_client(&self, request: InitializeRequest) {
        let _ = self.peer_info.set(request.client_info);
        let _ = self.peer_client_caps.set(request.capabilities);
        let _ = self.peer_protocol_version.set(request.protocol_version);
    }

    pub(crate) fn build_initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: self
                .advertised_server_caps
                .get()
                .cloned()
                .unwrap_or_default(),
            server_info: self.local_info.clone(),
            instructions: self
                .instructions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Converge every close path: `disconnect`, transport EOF, read errors,
    /// and handshake failure all land here. First caller wins.
    pub(crate) async fn shutdown_with(&self, cause: Option<String>) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(?cause, "closing session");
        self.set_state(SessionState::Closing);

        // Stops the reader and timeout manager.
        self.shutdown.cancel(cause.clone());

        self.pending.fail_all(cause);
        self.deadlines.clear();
        self.progress.clear();

        // In-flight handlers observe cancellation; their responses are
        // discarded.
        let inflight: Vec<CancelToken> = self
            .inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, token)| token)
            .collect();
        for token in inflight {
            token.cancel(Some("session closed".to_string()));
        }

        if let Some(transport) = self.transport.get() {
            transport.close().await;
        }
        self.set_state(SessionState::Closed);
        info!("session closed");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_created() {
        let session = Session::client(Implementation::new("test", "0.0.0"));
        assert_eq!(session.state(), SessionState::Created);
        assert_eq!(session.role(), Role::Client);
    }

    #[test]
    fn test_default_options_use_default_timeout() {
        let options = RequestOptions::default();
        assert_eq!(options.timeout, Some(DEFAULT_REQUEST_TIMEOUT));
        assert!(!options.reset_on_progress);
        assert!(options.max_total.is_none());
    }

    #[test]
    fn test_options_builder() {
        let options = RequestOptions::with_timeout(Duration::from_millis(200))
            .reset_on_progress()
            .max_total(Duration::from_millis(300));
        assert_eq!(options.timeout, Some(Duration::from_millis(200)));
        assert!(options.reset_on_progress);
        assert_eq!(options.max_total, Some(Duration::from_millis(300)));
    }

    #[tokio::test]
    async fn test_send_before_connect_is_rejected() {
        let session = Session::client(Implementation::new("test", "0.0.0"));
        let result = session.send("ping", None).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_request_ids_are_monotonic() {
        let session = Session::client(Implementation::new("test", "0.0.0"));
        let a = session.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let b = session.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        assert!(b > a);
    }
}
