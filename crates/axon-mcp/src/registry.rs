//! Handler Registry
//!
//! Method-name → handler maps for inbound requests and notifications, plus
//! optional fallbacks. The session publishes the registry behind an `Arc`
//! that is swapped wholesale on every registration, so each handler
//! invocation sees one consistent view — late registration is safe, it just
//! takes effect from the next inbound message.
//!
//! Lookup order: exact method match → fallback (if set) → `-32601` for
//! requests, silent drop for notifications. Specific always wins.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::HandlerContext;
use crate::error::Error;

/// Type-erased request handler: `(params, context) → result`.
pub(crate) type RequestHandlerFn =
    Arc<dyn Fn(Option<Value>, HandlerContext) -> BoxFuture<'static, Result<Value, Error>> + Send + Sync>;

/// Type-erased notification handler: `(params, context) → ()`.
pub(crate) type NotificationHandlerFn =
    Arc<dyn Fn(Option<Value>, HandlerContext) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default, Clone)]
pub(crate) struct HandlerRegistry {
    request_handlers: HashMap<String, RequestHandlerFn>,
    notification_handlers: HashMap<String, NotificationHandlerFn>,
    fallback_request: Option<RequestHandlerFn>,
    fallback_notification: Option<NotificationHandlerFn>,
}

impl HandlerRegistry {
    pub(crate) fn set_request_handler(&mut self, method: String, handler: RequestHandlerFn) {
        self.request_handlers.insert(method, handler);
    }

    pub(crate) fn set_notification_handler(
        &mut self,
        method: String,
        handler: NotificationHandlerFn,
    ) {
        self.notification_handlers.insert(method, handler);
    }

    pub(crate) fn set_fallback_request_handler(&mut self, handler: RequestHandlerFn) {
        self.fallback_request = Some(handler);
    }

    pub(crate) fn set_fallback_notification_handler(&mut self, handler: NotificationHandlerFn) {
        self.fallback_notification = Some(handler);
    }

    /// Resolve the handler for an inbound request.
    pub(crate) fn request_handler(&self, method: &str) -> Option<RequestHandlerFn> {
        self.request_handlers
            .get(method)
            .or(self.fallback_request.as_ref())
            .cloned()
    }

    /// Resolve the handler for an inbound notification.
    pub(crate) fn notification_handler(&self, method: &str) -> Option<NotificationHandlerFn> {
        self.notification_handlers
            .get(method)
            .or(self.fallback_notification.as_ref())
            .cloned()
    }

    pub(crate) fn has_request_handler(&self, method: &str) -> bool {
        self.request_handlers.contains_key(method)
    }

    /// Methods with a specific (non-fallback) request handler.
    pub(crate) fn request_methods(&self) -> impl Iterator<Item = &str> {
        self.request_handlers.keys().map(String::as_str)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_handler(tag: &'static str) -> RequestHandlerFn {
        Arc::new(move |_params, _ctx| Box::pin(async move { Ok(json!(tag)) }))
    }

    #[tokio::test]
    async fn test_exact_match_wins_over_fallback() {
        let mut registry = HandlerRegistry::default();
        registry.set_request_handler("tools/list".to_string(), request_handler("specific"));
        registry.set_fallback_request_handler(request_handler("fallback"));

        let handler = registry.request_handler("tools/list").unwrap();
        let ctx = HandlerContext::detached();
        assert_eq!(handler(None, ctx).await.unwrap(), json!("specific"));
    }

    #[tokio::test]
    async fn test_fallback_catches_unknown_methods() {
        let mut registry = HandlerRegistry::default();
        registry.set_fallback_request_handler(request_handler("fallback"));

        let handler = registry.request_handler("no/such/method").unwrap();
        let ctx = HandlerContext::detached();
        assert_eq!(handler(None, ctx).await.unwrap(), json!("fallback"));
    }

    #[test]
    fn test_no_handler_no_fallback() {
        let registry = HandlerRegistry::default();
        assert!(registry.request_handler("missing").is_none());
        assert!(registry.notification_handler("missing").is_none());
    }

    #[test]
    fn test_request_methods_lists_specific_handlers_only() {
        let mut registry = HandlerRegistry::default();
        registry.set_request_handler("tools/list".to_string(), request_handler("a"));
        registry.set_fallback_request_handler(request_handler("b"));

        let methods: Vec<&str> = registry.request_methods().collect();
        assert_eq!(methods, vec!["tools/list"]);
    }
}
