use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use wshub_core::error::{ClientCode, HubError, Result};
use wshub_core::protocol::{outbound, parse_frame, Envelope};

use crate::dispatch::builtin;
use crate::hub::{ConnectionHub, Fanout, HubCtx};

/// Handler for one message type.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, ctx: HubCtx, env: Envelope) -> Result<()>;
}

/// What `handle_incoming` did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Handled,
    InvalidJson,
    BadRequest,
    UnknownType,
    HandlerFailed,
}

/// Tagged dispatch table: `type -> handler`.
///
/// Handlers are registered while the router is being built at startup; once
/// it is shared behind an `Arc` the table is fixed. Registering the same type
/// twice replaces the earlier handler (last wins) and logs a warning.
pub struct MessageRouter {
    hub: Arc<ConnectionHub>,
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl MessageRouter {
    /// Router with an empty table.
    pub fn new(hub: Arc<ConnectionHub>) -> Self {
        Self {
            hub,
            handlers: HashMap::new(),
        }
    }

    /// Router with `heartbeat`, `ping`, `subscribe` and `unsubscribe` wired.
    pub fn with_builtins(hub: Arc<ConnectionHub>) -> Self {
        let mut router = Self::new(hub);
        builtin::register(&mut router);
        router
    }

    /// Returns the handler that was replaced, if any.
    pub fn register_handler(
        &mut self,
        msg_type: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Option<Arc<dyn MessageHandler>> {
        let prev = self.handlers.insert(msg_type.to_string(), handler);
        if prev.is_some() {
            warn!(msg_type, "handler replaced (last registration wins)");
        }
        prev
    }

    pub fn registered_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// Decode one text frame from `connection_id` and dispatch it.
    ///
    /// Decode and dispatch failures are answered with an `error` envelope to
    /// the sender; nothing here drops the connection.
    pub async fn handle_incoming(&self, connection_id: &str, raw_text: &str) -> RouteOutcome {
        let raw = match parse_frame(raw_text) {
            Ok(v) => v,
            Err(e) => {
                debug!(connection_id, error = %e, "inbound frame is not json");
                self.count_error("invalid_json");
                self.reply_error(connection_id, ClientCode::InvalidJson, "Invalid JSON format", None)
                    .await;
                return RouteOutcome::InvalidJson;
            }
        };

        let env = match Envelope::from_value(raw.clone()) {
            Ok(env) => env,
            Err(e) => {
                debug!(connection_id, error = %e, "inbound envelope rejected");
                self.count_error("bad_request");
                let msg = outbound::error(e.client_code().as_str(), "Invalid message format", Some(&raw))
                    .with("detail", e.to_string());
                self.hub.send_to_one(connection_id, &msg).await;
                return RouteOutcome::BadRequest;
            }
        };

        let Some(handler) = self.handlers.get(env.msg_type.as_str()).cloned() else {
            debug!(connection_id, msg_type = %env.msg_type, "unknown message type");
            self.count_error("unknown_type");
            let text = format!("Unknown message type: {}", env.msg_type);
            self.reply_error(connection_id, ClientCode::UnknownType, &text, Some(&env.raw))
                .await;
            return RouteOutcome::UnknownType;
        };

        let msg_type = env.msg_type.clone();
        let ctx = HubCtx::new(connection_id, Arc::clone(&self.hub));
        let started = Instant::now();
        let res = AssertUnwindSafe(handler.handle(ctx, env)).catch_unwind().await;
        self.hub
            .metrics()
            .dispatch_duration
            .observe(&[("type", msg_type.as_str())], started.elapsed());

        let err = match res {
            Ok(Ok(())) => return RouteOutcome::Handled,
            Ok(Err(e)) => e,
            Err(_) => HubError::Internal("handler panicked".into()),
        };

        error!(connection_id, msg_type = %msg_type, error = %err, "message handler failed");
        self.count_error("handler");
        let code = err.client_code();
        let mut reply = outbound::error(code.as_str(), "Internal error", None).with("message_type", msg_type);
        if matches!(code, ClientCode::BadRequest | ClientCode::NotConnected) {
            reply = reply.with("detail", err.to_string());
        }
        self.hub.send_to_one(connection_id, &reply).await;
        RouteOutcome::HandlerFailed
    }

    async fn reply_error(&self, connection_id: &str, code: ClientCode, text: &str, original: Option<&Value>) {
        let msg = outbound::error(code.as_str(), text, original);
        if !self.hub.send_to_one(connection_id, &msg).await {
            debug!(connection_id, "error reply not delivered");
        }
    }

    fn count_error(&self, kind: &str) {
        self.hub.metrics().inbound_errors.inc(&[("kind", kind)]);
    }
}
