// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket frame types for the room protocol.
//!
//! Frames use internally-tagged JSON enums (`{"type": "message", ...}`).
//! Outbound frames are encoded once and shared between every recipient's
//! send queue as [`FrameText`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BrokerError;
use crate::model::{Message, PresenceSnapshot, RoomId, UserSummary};

/// Pre-encoded outbound JSON text, cheap to clone across a fan-out.
pub type FrameText = Arc<str>;

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Message(Message),
    PresenceUpdate { room_id: RoomId, online: Vec<UserSummary> },
    History { room_id: RoomId, messages: Vec<Message> },
    Error { code: String, message: String },
    Pong {},
}

impl From<PresenceSnapshot> for ServerFrame {
    fn from(snap: PresenceSnapshot) -> Self {
        ServerFrame::PresenceUpdate { room_id: snap.room_id, online: snap.online }
    }
}

impl ServerFrame {
    pub fn encode(&self) -> Result<FrameText, BrokerError> {
        serde_json::to_string(self).map(Arc::from).map_err(|e| {
            tracing::error!(err = %e, "failed to encode server frame");
            BrokerError::Internal
        })
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Message {
        #[serde(default)]
        room_id: Option<RoomId>,
        content: String,
    },
    Join {
        room_id: RoomId,
    },
    Leave {},
    History {
        /// Absent means the most recent page.
        #[serde(default)]
        since_id: Option<u64>,
        #[serde(default)]
        limit: Option<usize>,
    },
    Ping {},
}

const CLIENT_KINDS: &[&str] = &["message", "join", "leave", "history", "ping"];

/// Decode an inbound text frame.
///
/// Unknown `type` values and malformed payloads are both `BadRequest`; the
/// returned message tells them apart for the client.
pub fn decode_client_frame(text: &str) -> Result<ClientFrame, (BrokerError, String)> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| (BrokerError::BadRequest, format!("invalid json: {e}")))?;

    let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or_default().to_owned();
    if !CLIENT_KINDS.contains(&kind.as_str()) {
        return Err((BrokerError::BadRequest, format!("unrecognized frame type: {kind:?}")));
    }

    serde_json::from_value(value)
        .map_err(|e| (BrokerError::BadRequest, format!("malformed {kind} frame: {e}")))
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
