// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model: rooms, messages, sessions, and presence.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Room identifier (UUID string).
pub type RoomId = String;

/// Identifier of one live connection. Allocated by the session registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Authenticated caller, as returned by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

/// Room metadata. Membership is runtime state held by the room directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: u64,
}

/// A published chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Per-room sequence number, starting at 1.
    pub id: u64,
    pub room_id: RoomId,
    pub author_user_id: String,
    pub username: String,
    pub content: String,
    /// Unix epoch milliseconds.
    pub created_at: u64,
}

/// One entry of a room's online list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "id")]
    pub user_id: String,
    pub username: String,
}

/// Derived view of who is connected to a room. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub room_id: RoomId,
    pub online: Vec<UserSummary>,
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
