// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Room directory: room metadata plus the ordered member set of each room.
//!
//! Every room owns one async mutex over its [`RoomState`]. That lock is the
//! room's single ordering authority: membership changes, presence updates,
//! sequence assignment and fan-out for a room all happen while holding it.
//! Rooms never share a lock, and no code path holds two room locks at once.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::RoomNamePolicy;
use crate::error::BrokerError;
use crate::model::{epoch_ms, PresenceSnapshot, Room, RoomId, SessionId};
use crate::presence::PresenceTracker;
use crate::registry::SessionRegistry;
use crate::store::Store;

/// Longest accepted room name, in characters.
pub const MAX_ROOM_NAME_LEN: usize = 100;

/// Mutable per-room state guarded by the room lock.
#[derive(Debug, Default)]
pub struct RoomState {
    members: IndexSet<SessionId>,
    last_seq: u64,
}

impl RoomState {
    /// Members in join order.
    pub fn members(&self) -> &IndexSet<SessionId> {
        &self.members
    }

    /// Id the next published message will carry.
    pub fn next_seq(&self) -> u64 {
        self.last_seq + 1
    }

    /// Record that `seq` has been persisted.
    pub fn commit_seq(&mut self, seq: u64) {
        self.last_seq = seq;
    }
}

pub struct RoomSlot {
    pub room: Room,
    state: Mutex<RoomState>,
}

impl RoomSlot {
    fn new(room: Room, last_seq: u64) -> Self {
        Self { room, state: Mutex::new(RoomState { members: IndexSet::new(), last_seq }) }
    }

    /// Enter the room's ordering scope.
    pub async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }
}

pub struct RoomDirectory {
    rooms: RwLock<HashMap<RoomId, Arc<RoomSlot>>>,
    store: Arc<dyn Store>,
    registry: Arc<SessionRegistry>,
    presence: PresenceTracker,
    policy: RoomNamePolicy,
}

impl RoomDirectory {
    /// Build the directory from the rooms already in `store`.
    pub fn load(
        store: Arc<dyn Store>,
        registry: Arc<SessionRegistry>,
        presence: PresenceTracker,
        policy: RoomNamePolicy,
    ) -> Result<Self, BrokerError> {
        let mut rooms = HashMap::new();
        for room in store.list_rooms()? {
            let last_seq = store.last_id(&room.id)?;
            rooms.insert(room.id.clone(), Arc::new(RoomSlot::new(room, last_seq)));
        }
        debug!(rooms = rooms.len(), "room directory loaded");
        Ok(Self { rooms: RwLock::new(rooms), store, registry, presence, policy })
    }

    pub fn create_room(&self, name: &str, description: &str) -> Result<Room, BrokerError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_ROOM_NAME_LEN {
            return Err(BrokerError::BadRequest);
        }

        // Hold the write lock across the name check and insert.
        let mut rooms = self.rooms.write();
        if self.policy == RoomNamePolicy::Unique {
            let wanted = name.to_lowercase();
            if rooms.values().any(|slot| slot.room.name.trim().to_lowercase() == wanted) {
                return Err(BrokerError::DuplicateName);
            }
        }

        let room = Room {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_owned(),
            description: description.trim().to_owned(),
            created_at: epoch_ms(),
        };
        self.store.create_room(&room)?;
        rooms.insert(room.id.clone(), Arc::new(RoomSlot::new(room.clone(), 0)));
        info!(room_id = %room.id, name = %room.name, "room created");
        Ok(room)
    }

    /// Room metadata as stored. Unknown to the directory means not found.
    pub fn get_room(&self, room_id: &str) -> Result<Room, BrokerError> {
        if !self.contains(room_id) {
            return Err(BrokerError::RoomNotFound);
        }
        self.store.get_room(room_id)?.ok_or(BrokerError::RoomNotFound)
    }

    /// Room metadata in creation order.
    pub fn list_rooms(&self) -> Result<Vec<Room>, BrokerError> {
        self.store.list_rooms()
    }

    pub fn slot(&self, room_id: &str) -> Result<Arc<RoomSlot>, BrokerError> {
        self.rooms.read().get(room_id).map(Arc::clone).ok_or(BrokerError::RoomNotFound)
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.read().contains_key(room_id)
    }

    /// Add the session to the room, leaving whatever room it was in first.
    ///
    /// Joining the room the session is already in changes nothing and sends
    /// no presence update.
    pub async fn join(&self, room_id: &str, session: SessionId) -> Result<(), BrokerError> {
        let entry = self.registry.get(session).ok_or(BrokerError::SessionNotFound)?;
        let slot = self.slot(room_id)?;

        match entry.room() {
            Some(current) if current == room_id => return Ok(()),
            Some(prior) => {
                self.leave(&prior, session).await;
            }
            None => {}
        }

        let mut state = slot.lock().await;
        // Fails if the session was deregistered while we waited for the lock.
        self.registry.bind_room(session, room_id)?;
        if state.members.insert(session) {
            debug!(room_id, session_id = %session, members = state.members.len(), "joined room");
            self.presence.announce(room_id, state.members());
        }
        Ok(())
    }

    /// Remove the session from the room. Returns whether it was a member.
    ///
    /// Absent sessions and unknown rooms are a no-op.
    pub async fn leave(&self, room_id: &str, session: SessionId) -> bool {
        let Ok(slot) = self.slot(room_id) else {
            return false;
        };
        let mut state = slot.lock().await;
        if !state.members.shift_remove(&session) {
            return false;
        }
        self.registry.unbind_from(session, room_id);
        debug!(room_id, session_id = %session, members = state.members.len(), "left room");
        self.presence.announce(room_id, state.members());
        true
    }

    /// Member sessions in join order.
    pub async fn members(&self, room_id: &str) -> Result<Vec<SessionId>, BrokerError> {
        let slot = self.slot(room_id)?;
        let state = slot.lock().await;
        Ok(state.members.iter().copied().collect())
    }

    pub async fn online_users(&self, room_id: &str) -> Result<PresenceSnapshot, BrokerError> {
        let slot = self.slot(room_id)?;
        let state = slot.lock().await;
        Ok(self.presence.snapshot(room_id, state.members()))
    }

    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
