//! Dispatcher
//!
//! The heart of the session: a single reader task pulls frames from the
//! transport and classifies them. Responses complete pending entries on the
//! reader task itself, and progress is routed there too — funneling both
//! through the same queue is what guarantees a request's progress is seen
//! before its completion. Handlers, by contrast, always run in their own
//! tasks: a handler that calls back into the session must never be able to
//! block the reader.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axon_core::messages::{
    extract_progress_token, methods, CancelledParams, InitializeRequest, ProgressParams,
    PROTOCOL_VERSION,
};
use axon_core::types::{
    DecodeError, Frame, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};
use futures::FutureExt;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::context::HandlerContext;
use crate::error::Error;
use crate::session::{Role, SessionInner, SessionState};
use crate::timeout::Expired;

// ============================================================================
// READER TASK
// ============================================================================

/// Read frames until the transport ends, an I/O error occurs, or the session
/// shuts down. Exactly one reader runs per session.
pub(crate) async fn run_reader(inner: Arc<SessionInner>) {
    let Some(transport) = inner.transport_arc() else {
        return;
    };

    let cause = loop {
        let received = tokio::select! {
            _ = inner.shutdown.cancelled() => return,
            received = transport.recv() => received,
        };

        let raw = match received {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("transport reached end of stream");
                break None;
            }
            Err(error) => {
                warn!(%error, "transport read error");
                break Some(error.to_string());
            }
        };

        match Frame::decode(&raw) {
            Ok(Frame::Response(response)) => handle_response(&inner, response),
            Ok(Frame::Notification(notification)) => handle_notification(&inner, notification),
            Ok(Frame::Request(request)) => handle_request(&inner, request).await,
            Err(decode) => handle_decode_error(&inner, decode).await,
        }
    };

    inner.shutdown_with(cause).await;
}

// ============================================================================
// TIMEOUT MANAGER TASK
// ============================================================================

/// Drive the deadline queue: fail expired requests and tell the peer to stop
/// working on them. One manager runs per session.
pub(crate) async fn run_timeout_manager(inner: Arc<SessionInner>) {
    loop {
        let expired = tokio::select! {
            _ = inner.shutdown.cancelled() => return,
            expired = inner.deadlines.next_expired() => expired,
        };

        let Expired { id, elapsed, hard } = expired;
        inner.progress.remove_for_request(&id);
        let Some(entry) = inner.pending.take(&id) else {
            continue;
        };
        warn!(%id, method = entry.method(), ?elapsed, hard, "request timed out");
        entry.resolve(Err(Error::RequestTimeout { elapsed, hard }));

        // Best effort: the peer should stop working, but a failed send must
        // not take the session down.
        let reason = format!("Timed out after {}ms", elapsed.as_millis());
        inner.notify_cancelled(&id, Some(reason)).await;
    }
}

// ============================================================================
// FRAME HANDLERS
// ============================================================================

async fn handle_decode_error(inner: &Arc<SessionInner>, decode: DecodeError) {
    warn!(error = %decode.error, "failed to decode inbound frame");
    if let Some(id) = decode.id {
        let response = JsonRpcResponse::error(id, decode.error);
        if let Err(error) = inner.write_frame(Frame::Response(response)).await {
            debug!(%error, "failed to send decode error response");
        }
    }
}

fn handle_response(inner: &Arc<SessionInner>, response: JsonRpcResponse) {
    let id = response.id.clone();
    let outcome = match response.error {
        Some(error) => Err(Error::from_json_rpc(error)),
        None => Ok(response.result.unwrap_or(Value::Null)),
    };

    inner.deadlines.disarm(&id);
    inner.progress.remove_for_request(&id);
    if !inner.pending.complete(&id, outcome) {
        debug!(%id, "dropping response with no pending waiter (late response after cancel or timeout)");
    }
}

fn handle_notification(inner: &Arc<SessionInner>, notification: JsonRpcNotification) {
    match notification.method.as_str() {
        methods::NOTIF_PROGRESS => {
            let params = notification
                .params
                .and_then(|params| serde_json::from_value::<ProgressParams>(params).ok());
            let Some(params) = params else {
                warn!("dropping malformed progress notification");
                return;
            };
            if let Some(request_id) = inner.progress.route(&params) {
                inner.deadlines.reset(&request_id);
            }
        }

        methods::NOTIF_CANCELLED => {
            let params = notification
                .params
                .and_then(|params| serde_json::from_value::<CancelledParams>(params).ok());
            let Some(params) = params else {
                warn!("dropping malformed cancellation notification");
                return;
            };
            let token = inner.inflight_token(&params.request_id);
            match token {
                Some(token) => {
                    info!(id = %params.request_id, reason = ?params.reason, "peer cancelled in-flight request");
                    token.cancel(params.reason);
                }
                None => {
                    debug!(id = %params.request_id, "cancellation for unknown request; ignoring");
                }
            }
        }

        methods::NOTIF_INITIALIZED => {
            if inner.role == Role::Server {
                if inner.mark_initialized() {
                    info!("session initialized");
                } else {
                    debug!("unexpected initialized notification; ignoring");
                }
            } else {
                debug!("ignoring initialized notification from server");
            }
        }

        method => {
            let Some(handler) = inner.registry_snapshot().notification_handler(method) else {
                debug!(method, "no handler for notification; dropping");
                return;
            };

            let method = method.to_string();
            let ctx = HandlerContext {
                inner: Arc::downgrade(inner),
                method: method.clone(),
                request_id: None,
                progress_token: None,
                cancel: inner.shutdown.clone(),
            };
            let params = notification.params;
            tokio::spawn(async move {
                // Notification handler failures have nowhere to go but the log.
                if let Err(panic) = AssertUnwindSafe(handler(params, ctx)).catch_unwind().await {
                    warn!(
                        method,
                        message = panic_message(panic.as_ref()),
                        "notification handler panicked"
                    );
                }
            });
        }
    }
}

async fn handle_request(inner: &Arc<SessionInner>, request: JsonRpcRequest) {
    let JsonRpcRequest {
        id, method, params, ..
    } = request;

    // The handshake and liveness probes belong to the core, not the registry.
    if method == methods::INITIALIZE {
        if inner.role == Role::Server {
            handle_initialize(inner, id, params).await;
        } else {
            respond_error(inner, id, JsonRpcError::method_not_found(&method)).await;
        }
        return;
    }

    if inner.state() != SessionState::Initialized {
        warn!(method, "rejecting request: session not initialized");
        respond_error(inner, id, JsonRpcError::server_not_initialized()).await;
        return;
    }

    if method == methods::PING {
        respond_result(inner, id, json!({})).await;
        return;
    }

    let Some(handler) = inner.registry_snapshot().request_handler(&method) else {
        warn!(method, "no handler for request");
        respond_error(inner, id, JsonRpcError::method_not_found(&method)).await;
        return;
    };

    let cancel = CancelToken::new();
    inner.register_inflight(id.clone(), cancel.clone());
    let ctx = HandlerContext {
        inner: Arc::downgrade(inner),
        method: method.clone(),
        request_id: Some(id.clone()),
        progress_token: extract_progress_token(params.as_ref()),
        cancel: cancel.clone(),
    };

    debug!(%id, method, "dispatching request to handler");
    let inner = inner.clone();
    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(handler(params, ctx)).catch_unwind().await;
        inner.remove_inflight(&id);

        // The peer stopped waiting; neither a result nor an error goes back.
        if cancel.is_cancelled() {
            debug!(%id, "discarding handler outcome for cancelled request");
            return;
        }

        let response = match outcome {
            Ok(Ok(result)) => JsonRpcResponse::success(id, result),
            Ok(Err(handler_error)) => {
                debug!(%handler_error, "handler returned error");
                JsonRpcResponse::error(id, handler_error.to_json_rpc())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(%message, "handler panicked");
                JsonRpcResponse::error(id, JsonRpcError::internal_error(&message))
            }
        };
        if let Err(error) = inner.write_frame(Frame::Response(response)).await {
            warn!(%error, "failed to send response");
        }
    });
}

async fn handle_initialize(inner: &Arc<SessionInner>, id: RequestId, params: Option<Value>) {
    let request = match params.map(serde_json::from_value::<InitializeRequest>) {
        Some(Ok(request)) => request,
        Some(Err(error)) => {
            respond_error(inner, id, JsonRpcError::invalid_params(&error.to_string())).await;
            return;
        }
        None => {
            respond_error(
                inner,
                id,
                JsonRpcError::invalid_params("initialize requires params"),
            )
            .await;
            return;
        }
    };

    if request.protocol_version != PROTOCOL_VERSION {
        // Answer with our own version; the client decides whether to proceed.
        warn!(
            requested = %request.protocol_version,
            supported = PROTOCOL_VERSION,
            "client requested an unsupported protocol version"
        );
    }
    info!(
        client = %request.client_info.name,
        version = %request.client_info.version,
        "initialize received"
    );

    inner.record_peer_client(request);
    match serde_json::to_value(inner.build_initialize_result()) {
        Ok(result) => respond_result(inner, id, result).await,
        Err(error) => {
            respond_error(inner, id, JsonRpcError::internal_error(&error.to_string())).await;
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

async fn respond_result(inner: &Arc<SessionInner>, id: RequestId, result: Value) {
    let response = JsonRpcResponse::success(id, result);
    if let Err(error) = inner.write_frame(Frame::Response(response)).await {
        warn!(%error, "failed to send response");
    }
}

async fn respond_error(inner: &Arc<SessionInner>, id: RequestId, error: JsonRpcError) {
    let response = JsonRpcResponse::error(id, error);
    if let Err(error) = inner.write_frame(Frame::Response(response)).await {
        warn!(%error, "failed to send error response");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
