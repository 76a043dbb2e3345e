// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection gateway: WebSocket upgrade and the per-connection loops.
//!
//! Credentials and the requested room are checked before the upgrade, so a
//! refused request never creates a session. Each accepted connection runs
//! two halves: a writer task draining the session's bounded queue into the
//! socket, and a reader loop dispatching inbound frames. Direct replies go
//! through the same queue as broadcasts.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::error::BrokerError;
use crate::frame::{decode_client_frame, ClientFrame, FrameText, ServerFrame};
use crate::model::{RoomId, SessionId};
use crate::state::AppState;
use crate::transport::auth;

/// Query parameters for the WS upgrade.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
    /// Room to bind immediately after connecting.
    pub room: Option<RoomId>,
}

/// Lifecycle of one gateway connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticated,
    RoomBound(RoomId),
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticated => "authenticated",
            Self::RoomBound(_) => "room_bound",
            Self::Closed => "closed",
        }
    }

    pub fn room(&self) -> Option<&str> {
        match self {
            Self::RoomBound(room) => Some(room),
            _ => None,
        }
    }
}

/// Per-connection bookkeeping owned by the reader loop.
#[derive(Debug)]
pub struct Connection {
    pub session: SessionId,
    state: ConnectionState,
}

impl Connection {
    pub fn new(session: SessionId) -> Self {
        Self { session, state: ConnectionState::Connecting }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn set_state(&mut self, next: ConnectionState) {
        if self.state == ConnectionState::Closed || self.state == next {
            return;
        }
        debug!(
            session_id = %self.session,
            from = self.state.as_str(),
            to = next.as_str(),
            room_id = next.room(),
            "connection state"
        );
        self.state = next;
    }
}

fn refuse(code: BrokerError, message: &str) -> Response {
    axum::http::Response::builder()
        .status(code.http_status())
        .body(axum::body::Body::from(message.to_owned()))
        .unwrap_or_default()
        .into_response()
}

/// `GET /ws?token=...&room=...`
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let identity =
        match auth::authenticate(state.auth.as_ref(), &headers, query.token.as_deref()) {
            Ok(identity) => identity,
            Err(code) => return refuse(code, "unauthorized"),
        };

    if let Some(ref room) = query.room {
        if !state.broker.directory().contains(room) {
            return refuse(BrokerError::RoomNotFound, "room not found");
        }
    }

    ws.on_upgrade(move |socket| async move {
        let (tx, rx) = mpsc::channel(state.config.send_queue);
        let session = state.broker.connect(identity, tx);
        handle_connection(state, socket, session, rx, query.room).await;
    })
    .into_response()
}

/// Run one accepted connection to completion.
async fn handle_connection(
    state: Arc<AppState>,
    socket: WebSocket,
    session: SessionId,
    rx: mpsc::Receiver<FrameText>,
    room: Option<RoomId>,
) {
    let broker = &state.broker;
    let Some(entry) = broker.registry().get(session) else {
        return;
    };
    let cancel = entry.cancel.clone();
    drop(entry);

    let mut conn = Connection::new(session);
    conn.set_state(ConnectionState::Authenticated);
    info!(session_id = %session, room_id = room.as_deref(), "ws connected");

    let (ws_tx, mut ws_rx) = socket.split();
    let writer = tokio::spawn(write_loop(
        ws_tx,
        rx,
        cancel.clone(),
        state.config.send_timeout(),
        state.config.heartbeat_interval(),
        session,
    ));

    if let Some(room_id) = room {
        let join = ClientFrame::Join { room_id };
        if let Some(reply) = handle_client_frame(broker, &mut conn, join).await {
            send_direct(broker, session, &reply);
        }
    }

    let idle_timeout = state.config.idle_timeout();
    loop {
        let idle = async {
            match idle_timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = idle => {
                info!(session_id = %session, "idle timeout, closing connection");
                break;
            }
            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(_)) | None => break,
                };
                broker.registry().touch(session);

                let reply = match msg {
                    Message::Text(text) => match decode_client_frame(&text) {
                        Ok(frame) => handle_client_frame(broker, &mut conn, frame).await,
                        Err((code, message)) => Some(code.to_frame(message)),
                    },
                    Message::Binary(_) => {
                        Some(BrokerError::BadRequest.to_frame("binary frames are not supported"))
                    }
                    Message::Close(_) => break,
                    // Pongs answer our heartbeat; the touch above is all they do.
                    Message::Ping(_) | Message::Pong(_) => None,
                };
                if let Some(reply) = reply {
                    send_direct(broker, session, &reply);
                }
            }
        }
    }

    conn.set_state(ConnectionState::Closed);
    broker.disconnect(session).await;
    let _ = writer.await;
    info!(session_id = %session, "ws disconnected");
}

/// Wait for the next heartbeat tick, or forever when pings are disabled.
async fn next_beat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Drain the session queue into the socket until cancelled.
///
/// Every `heartbeat` the client is pinged; its pong reaches the reader loop
/// and refreshes the session's liveness. A send that errors or exceeds
/// `send_timeout` kills the session.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<FrameText>,
    cancel: CancellationToken,
    send_timeout: Duration,
    heartbeat: Option<Duration>,
    session: SessionId,
) {
    let mut heartbeat = heartbeat.map(|period| {
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    });
    loop {
        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            text = rx.recv() => match text {
                Some(text) => Message::Text(text.to_string().into()),
                None => break,
            },
            _ = next_beat(&mut heartbeat) => Message::Ping(Default::default()),
        };
        match tokio::time::timeout(send_timeout, ws_tx.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(session_id = %session, err = %e, "ws send failed");
                cancel.cancel();
                break;
            }
            Err(_) => {
                warn!(session_id = %session, "ws send timed out, dropping session");
                cancel.cancel();
                break;
            }
        }
    }
    let _ = tokio::time::timeout(send_timeout, ws_tx.close()).await;
}

/// Queue a reply for this session only.
fn send_direct(broker: &Broker, session: SessionId, frame: &ServerFrame) {
    if let Ok(text) = frame.encode() {
        // A failed delivery cancels the session; the reader loop sees it.
        let _ = broker.registry().deliver(session, &text);
    }
}

/// Dispatch one inbound frame and return an optional direct reply.
///
/// Broadcast results (messages, presence updates) reach this session
/// through fan-out like every other member, so successful publishes and
/// joins return nothing.
pub async fn handle_client_frame(
    broker: &Broker,
    conn: &mut Connection,
    frame: ClientFrame,
) -> Option<ServerFrame> {
    let session = conn.session;
    match frame {
        ClientFrame::Ping {} => Some(ServerFrame::Pong {}),

        ClientFrame::Message { room_id, content } => {
            let Some(bound) = conn.state().room().map(str::to_owned) else {
                return Some(BrokerError::BadRequest.to_frame("join a room first"));
            };
            if room_id.as_deref().is_some_and(|r| r != bound) {
                return Some(BrokerError::BadRequest.to_frame("not joined to that room"));
            }
            match broker.publish(&bound, session, &content).await {
                Ok(_) => None,
                Err(BrokerError::InvalidMessage) => Some(BrokerError::InvalidMessage.to_frame(
                    "message content must be non-empty and within the length limit",
                )),
                Err(code) => Some(code.to_frame(code.message())),
            }
        }

        ClientFrame::Join { room_id } => match broker.join(&room_id, session).await {
            Ok(()) => {
                conn.set_state(ConnectionState::RoomBound(room_id));
                None
            }
            Err(code) => Some(code.to_frame(code.message())),
        },

        ClientFrame::Leave {} => {
            broker.leave(session).await;
            conn.set_state(ConnectionState::Authenticated);
            None
        }

        ClientFrame::History { since_id, limit } => {
            let Some(bound) = conn.state().room().map(str::to_owned) else {
                return Some(BrokerError::BadRequest.to_frame("join a room first"));
            };
            match broker.history(&bound, since_id, limit).await {
                Ok(messages) => Some(ServerFrame::History { room_id: bound, messages }),
                Err(code) => Some(code.to_frame(code.message())),
            }
        }
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
