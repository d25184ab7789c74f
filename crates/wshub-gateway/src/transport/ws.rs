//! WebSocket session handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS, optional `user_id`/`session_id` from the query string
//! - Register the connection with a fresh id and send `welcome`
//! - Writer task drains the bounded outbound queue into the socket
//! - Reader loop feeds text frames to the message router
//! - Unregister on close, read error, writer failure, or hub close signal

use std::sync::Arc;

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, Notify};
use tokio::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use wshub_core::error::{ClientCode, HubError, Result};
use wshub_core::protocol::outbound;

use crate::app_state::AppState;
use crate::hub::{ConnectionHub, ConnectionOptions, ConnectionSink, Fanout, QueueSink};
use crate::transport::codec::{classify, frame_len, Inbound};

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn ws_upgrade(
    State(app): State<AppState>,
    ws: WebSocketUpgrade,
    Query(q): Query<WsQuery>,
) -> Response {
    if app.is_draining() {
        return (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response();
    }
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = run_session(app, q, socket).await {
            warn!(error = %e, "ws session ended with error");
        }
    })
}

/// Register under a fresh UUID, retrying once on the (unlikely) collision.
fn register_fresh(
    hub: &ConnectionHub,
    sink: Arc<dyn ConnectionSink>,
    opts: ConnectionOptions,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    match hub.register(Arc::clone(&sink), &id, opts.clone()) {
        Err(HubError::DuplicateConnection(_)) => {
            let retry = Uuid::new_v4().to_string();
            hub.register(sink, &retry, opts)?;
            Ok(retry)
        }
        other => other.map(|()| id),
    }
}

async fn reject(hub: &ConnectionHub, connection_id: &str, kind: &str, text: &str) {
    hub.metrics().inbound_errors.inc(&[("kind", kind)]);
    let msg = outbound::error(ClientCode::BadRequest.as_str(), text, None);
    hub.send_to_one(connection_id, &msg).await;
}

async fn run_session(app: AppState, q: WsQuery, socket: WebSocket) -> Result<()> {
    let gw = app.cfg().gateway.clone();
    let hub = app.hub();

    // ---- outbound queue + hub-side handle
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(gw.outbound_queue);
    let shutdown = Arc::new(Notify::new());
    let sink: Arc<dyn ConnectionSink> = Arc::new(QueueSink::new(
        out_tx,
        Arc::clone(&shutdown),
        Duration::from_millis(gw.write_timeout_ms),
    ));

    let user_id = q.user_id.clone();
    let opts = ConnectionOptions {
        user_id: q.user_id,
        session_id: q.session_id,
        ..ConnectionOptions::default()
    };
    let connection_id = register_fresh(&hub, sink, opts)?;

    let span = info_span!("ws_session", connection_id = %connection_id, user_id = ?user_id);
    async move {
        let (mut ws_tx, mut ws_rx) = socket.split();

        // ---- writer
        let mut writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if ws_tx.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        hub.send_to_one(&connection_id, &outbound::welcome(&connection_id, gw.heartbeat_interval))
            .await;
        info!("session started");

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("closed by hub");
                    break;
                }
                _ = &mut writer => {
                    debug!("writer finished");
                    break;
                }
                incoming = ws_rx.next() => {
                    let Some(Ok(msg)) = incoming else { break; };

                    let len = frame_len(&msg);
                    if len > gw.max_frame_bytes {
                        let text = format!("Frame exceeds {} bytes", gw.max_frame_bytes);
                        reject(&hub, &connection_id, "oversized", &text).await;
                        continue;
                    }

                    match classify(msg) {
                        Inbound::Text(text) => {
                            app.router().handle_incoming(&connection_id, &text).await;
                        }
                        Inbound::Binary(_) => {
                            reject(&hub, &connection_id, "binary", "Binary frames are not supported").await;
                        }
                        // Pongs to client pings are written by the ws layer itself.
                        Inbound::Ping | Inbound::Pong => {}
                        Inbound::Close => break,
                    }
                }
            }
        }

        hub.unregister(&connection_id);
        writer.abort();
        info!("session ended");
    }
    .instrument(span)
    .await;

    Ok(())
}
