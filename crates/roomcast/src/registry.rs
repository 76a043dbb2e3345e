// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry.
//!
//! Tracks every live connection: who it belongs to, which room it is bound
//! to, and the bounded queue feeding its socket writer. Delivery never
//! blocks: a full or closed queue marks the session dead (its cancel token
//! fires) and the caller moves on. Dead sessions are reaped by their
//! connection task or by the background reaper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::BrokerError;
use crate::frame::FrameText;
use crate::model::{Identity, RoomId, SessionId, UserSummary};

/// A registered connection.
pub struct SessionEntry {
    pub id: SessionId,
    pub identity: Identity,
    pub connected_at: Instant,
    /// Fires when the session is dead: channel gone, queue overflow, or
    /// deregistered. Pending frames are dropped with the receiver.
    pub cancel: CancellationToken,
    room: Mutex<Option<RoomId>>,
    last_seen: Mutex<Instant>,
    tx: mpsc::Sender<FrameText>,
}

impl SessionEntry {
    /// Room this session is currently bound to.
    pub fn room(&self) -> Option<RoomId> {
        self.room.lock().clone()
    }

    pub fn is_dead(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            user_id: self.identity.user_id.clone(),
            username: self.identity.username.clone(),
        }
    }
}

/// Outcome of delivering one frame to a list of sessions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub failed: Vec<SessionId>,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<SessionEntry>>>,
    next_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Register a connection whose socket writer drains `tx`.
    pub fn register(&self, identity: Identity, tx: mpsc::Sender<FrameText>) -> SessionId {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let now = Instant::now();
        let entry = Arc::new(SessionEntry {
            id,
            identity,
            connected_at: now,
            cancel: CancellationToken::new(),
            room: Mutex::new(None),
            last_seen: Mutex::new(now),
            tx,
        });
        debug!(session_id = %id, user_id = %entry.identity.user_id, "session registered");
        self.sessions.write().insert(id, entry);
        id
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<SessionEntry>> {
        self.sessions.read().get(&id).map(Arc::clone)
    }

    /// Bind the session to a room, returning the room it was bound to before.
    pub(crate) fn bind_room(
        &self,
        id: SessionId,
        room_id: &str,
    ) -> Result<Option<RoomId>, BrokerError> {
        let entry = self.get(id).ok_or(BrokerError::SessionNotFound)?;
        let prior = entry.room.lock().replace(room_id.to_owned());
        Ok(prior)
    }

    /// Clear the session's room binding, returning the room it was bound to.
    ///
    /// Room membership is untouched; `Broker::leave` does both.
    pub fn unbind(&self, id: SessionId) -> Option<RoomId> {
        self.get(id).and_then(|entry| entry.room.lock().take())
    }

    /// Clear the binding only if it still points at `room_id`.
    pub(crate) fn unbind_from(&self, id: SessionId, room_id: &str) -> bool {
        let Some(entry) = self.get(id) else {
            return false;
        };
        let mut room = entry.room.lock();
        if room.as_deref() == Some(room_id) {
            *room = None;
            true
        } else {
            false
        }
    }

    pub fn room_of(&self, id: SessionId) -> Option<RoomId> {
        self.get(id).and_then(|entry| entry.room())
    }

    /// Remove the session and cancel its pending deliveries.
    ///
    /// The caller is responsible for the room leave; the returned entry still
    /// carries the room binding it had. Outside the crate, `Broker::disconnect`
    /// is the only way in.
    pub(crate) fn deregister(&self, id: SessionId) -> Option<Arc<SessionEntry>> {
        let entry = self.sessions.write().remove(&id)?;
        entry.cancel.cancel();
        debug!(session_id = %id, "session deregistered");
        Some(entry)
    }

    /// Record inbound activity.
    pub fn touch(&self, id: SessionId) {
        if let Some(entry) = self.get(id) {
            *entry.last_seen.lock() = Instant::now();
        }
    }

    /// Queue a frame for the session without blocking.
    ///
    /// A full queue means the client is not keeping up; it is dropped like a
    /// disconnect rather than stalling the broker.
    pub fn deliver(&self, id: SessionId, frame: &FrameText) -> Result<(), BrokerError> {
        let entry = self.get(id).ok_or(BrokerError::ChannelClosed)?;
        if entry.is_dead() {
            return Err(BrokerError::ChannelClosed);
        }
        match entry.tx.try_send(Arc::clone(frame)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = %id, "send queue overflow, dropping session");
                entry.cancel.cancel();
                Err(BrokerError::ChannelClosed)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session_id = %id, "send queue closed, marking session dead");
                entry.cancel.cancel();
                Err(BrokerError::ChannelClosed)
            }
        }
    }

    /// Deliver one frame to each session in order. Failures are isolated.
    pub fn deliver_all<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a SessionId>,
        frame: &FrameText,
    ) -> FanOut {
        let mut out = FanOut::default();
        for &id in ids {
            match self.deliver(id, frame) {
                Ok(()) => out.delivered += 1,
                Err(_) => out.failed.push(id),
            }
        }
        out
    }

    /// Sessions that are dead, or idle longer than `idle_timeout`.
    pub fn stale(&self, idle_timeout: Option<Duration>) -> Vec<SessionId> {
        self.sessions
            .read()
            .values()
            .filter(|e| e.is_dead() || idle_timeout.is_some_and(|t| e.idle_for() > t))
            .map(|e| e.id)
            .collect()
    }

    /// Cancel every session (shutdown).
    pub fn cancel_all(&self) {
        for entry in self.sessions.read().values() {
            entry.cancel.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
