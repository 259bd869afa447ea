//! WebSocket connection handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS, reading identity from the handshake only
//! - Bind the connection before any frame is read, unbind on every exit
//! - Lifecycle: outbound queue writer, ping, idle timeout, frame size limit
//! - Decode `private_message` frames and hand them to the router

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::Instrument;

use chatline_core::error::{ChatError, ClientCode, Result};
use chatline_core::protocol::events;

use crate::app_state::AppState;
use crate::realtime::{BoundSession, Connection, Credentials, RealtimeCore};
use crate::transport::codec::{decode_text, InboundEvent};
use crate::transport::USER_HEADER;

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

/// Why a connection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    StreamEnded,
    WriteFailed,
    IdleTimeout,
    FrameTooLarge,
}

impl CloseReason {
    fn as_str(self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::StreamEnded => "stream_ended",
            CloseReason::WriteFailed => "write_failed",
            CloseReason::IdleTimeout => "idle_timeout",
            CloseReason::FrameTooLarge => "frame_too_large",
        }
    }
}

fn frame_len(msg: &Message) -> usize {
    match msg {
        Message::Text(s) => s.len(),
        Message::Binary(b) => b.len(),
        Message::Ping(v) | Message::Pong(v) => v.len(),
        Message::Close(_) => 0,
    }
}

pub fn handshake_credentials(headers: &HeaderMap, query: WsQuery) -> Credentials {
    let auth = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    Credentials::new(auth, query.user_id)
}

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(
    State(app): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if app.is_draining() {
        return (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response();
    }
    let creds = handshake_credentials(&headers, q);
    ws.on_upgrade(move |socket| run_connection(app, creds, socket))
}

async fn run_connection(app: AppState, creds: Credentials, socket: WebSocket) {
    let rt = app.realtime();
    let (out_tx, out_rx) = mpsc::channel::<Message>(app.cfg().gateway.outbound_queue);
    let conn = Connection::new(rt.registry.next_conn_id(), out_tx.clone());
    let user = creds.identity().ok();

    let span = tracing::info_span!(
        "conn",
        conn_id = %conn.id(),
        user = user.as_deref().unwrap_or("-")
    );

    async move {
        // First frame on the wire: who the server thinks we are.
        let _ = out_tx.try_send(Message::Text(events::session_json(user.as_deref(), conn.id().0)));
        drop(out_tx);

        let (session, guard) = rt.binder.bind_guarded(conn, &creds).await;

        match connection_loop(&app, &rt, &session, out_rx, socket).await {
            Ok(reason) => tracing::info!(reason = reason.as_str(), "connection closed"),
            Err(e) => tracing::debug!(error = %e, "connection ended with error"),
        }

        guard.release().await;
    }
    .instrument(span)
    .await
}

// --------------------
// Core connection loop
// --------------------
async fn connection_loop(
    app: &AppState,
    rt: &RealtimeCore,
    session: &BoundSession,
    mut out_rx: mpsc::Receiver<Message>,
    socket: WebSocket,
) -> Result<CloseReason> {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let gw = &app.cfg().gateway;
    let max_frame = gw.max_frame_bytes;
    let idle_timeout = Duration::from_millis(gw.idle_timeout_ms);

    let mut ping_tick = tokio::time::interval(Duration::from_millis(gw.ping_interval_ms));
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut idle_tick = tokio::time::interval(Duration::from_millis(500));
    idle_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            // outbound writer; the registry holds a sender, so `None` only
            // happens once every handle is gone
            maybe_out = out_rx.recv() => {
                let Some(m) = maybe_out else { return Ok(CloseReason::StreamEnded); };
                if ws_tx.send(m).await.is_err() {
                    return Ok(CloseReason::WriteFailed);
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(incoming) = incoming else { return Ok(CloseReason::StreamEnded); };
                let msg = incoming
                    .map_err(|e| ChatError::TransportFailure(format!("read failed: {e}")))?;
                last_activity = Instant::now();

                if frame_len(&msg) > max_frame {
                    let frame = events::error_json(None, ClientCode::PayloadTooLarge, "frame exceeds max_frame_bytes");
                    let _ = ws_tx.send(Message::Text(frame)).await;
                    return Ok(CloseReason::FrameTooLarge);
                }

                let reply = match msg {
                    Message::Text(s) => Some(handle_text(app, rt, session, &s).await),
                    Message::Binary(_) => Some(events::error_json(
                        None,
                        ClientCode::BadRequest,
                        "binary frames are not supported",
                    )),
                    // tungstenite answers pings itself
                    Message::Ping(_) | Message::Pong(_) => None,
                    Message::Close(_) => return Ok(CloseReason::ClientClosed),
                };

                if let Some(reply) = reply {
                    if ws_tx.send(Message::Text(reply)).await.is_err() {
                        return Ok(CloseReason::WriteFailed);
                    }
                }
            }

            _ = ping_tick.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    return Ok(CloseReason::WriteFailed);
                }
            }

            _ = idle_tick.tick() => {
                if last_activity.elapsed() >= idle_timeout {
                    let frame = events::error_json(None, ClientCode::BadRequest, "idle timeout");
                    let _ = ws_tx.send(Message::Text(frame)).await;
                    return Ok(CloseReason::IdleTimeout);
                }
            }
        }
    }
}

/// Handle one text frame; always produces a reply frame.
async fn handle_text(app: &AppState, rt: &RealtimeCore, session: &BoundSession, s: &str) -> String {
    let inbound = match decode_text(s) {
        Ok(inbound) => inbound,
        Err(rejected) => {
            tracing::debug!(error = %rejected.err, "frame rejected");
            return events::error_json(rejected.seq, rejected.err.client_code(), &rejected.err.to_string());
        }
    };

    let seq = inbound.seq;
    match inbound.event {
        InboundEvent::Ping => events::pong_json(seq),
        InboundEvent::PrivateMessage(pm) => {
            let to = pm.to.clone();
            match send_private(app, rt, session, pm).await {
                Ok(outcome) => events::message_status_json(seq, &to, outcome),
                Err(e) => {
                    tracing::debug!(%to, error = %e, "private message rejected");
                    events::error_json(seq, e.client_code(), &e.to_string())
                }
            }
        }
    }
}

async fn send_private(
    app: &AppState,
    rt: &RealtimeCore,
    session: &BoundSession,
    pm: events::PrivateMessage,
) -> Result<chatline_core::message::RouteOutcome> {
    let from = session.identity()?;
    app.attachments().check_opt(pm.attachment.as_ref())?;
    let msg = pm.into_message(from);
    msg.check_recipient()?;
    rt.router.route(msg).await
}
