// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence collaborator: room metadata and append-only message logs.

use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::BrokerError;
use crate::model::{Message, Room, RoomId};

/// Storage interface consumed by the broker.
///
/// Calls are made while a room's ordering lock is held, so implementations
/// must not call back into the broker.
pub trait Store: Send + Sync {
    /// Append a message. Ids within a room must be strictly increasing.
    fn append(&self, message: &Message) -> Result<(), BrokerError>;

    /// Messages of `room_id` with `id > since_id`, ascending, at most `limit`.
    fn list(&self, room_id: &str, since_id: u64, limit: usize) -> Result<Vec<Message>, BrokerError>;

    /// Highest message id stored for the room, 0 when empty.
    fn last_id(&self, room_id: &str) -> Result<u64, BrokerError>;

    fn create_room(&self, room: &Room) -> Result<(), BrokerError>;

    fn get_room(&self, room_id: &str) -> Result<Option<Room>, BrokerError>;

    /// All rooms in creation order.
    fn list_rooms(&self) -> Result<Vec<Room>, BrokerError>;
}

/// In-process store. State is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    rooms: RwLock<IndexMap<RoomId, Room>>,
    messages: RwLock<HashMap<RoomId, Vec<Message>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn append(&self, message: &Message) -> Result<(), BrokerError> {
        if !self.rooms.read().contains_key(&message.room_id) {
            return Err(BrokerError::RoomNotFound);
        }
        let mut messages = self.messages.write();
        let log = messages.entry(message.room_id.clone()).or_default();
        if let Some(last) = log.last() {
            if message.id <= last.id {
                tracing::error!(
                    room_id = %message.room_id,
                    id = message.id,
                    last = last.id,
                    "rejecting out-of-order append"
                );
                return Err(BrokerError::Internal);
            }
        }
        log.push(message.clone());
        Ok(())
    }

    fn list(
        &self,
        room_id: &str,
        since_id: u64,
        limit: usize,
    ) -> Result<Vec<Message>, BrokerError> {
        let messages = self.messages.read();
        let Some(log) = messages.get(room_id) else {
            return Ok(vec![]);
        };
        // Ids are ascending, so binary search for the first id past `since_id`.
        let start = log.partition_point(|m| m.id <= since_id);
        Ok(log[start..].iter().take(limit).cloned().collect())
    }

    fn last_id(&self, room_id: &str) -> Result<u64, BrokerError> {
        Ok(self.messages.read().get(room_id).and_then(|log| log.last()).map_or(0, |m| m.id))
    }

    fn create_room(&self, room: &Room) -> Result<(), BrokerError> {
        let mut rooms = self.rooms.write();
        if rooms.contains_key(&room.id) {
            return Err(BrokerError::DuplicateName);
        }
        rooms.insert(room.id.clone(), room.clone());
        Ok(())
    }

    fn get_room(&self, room_id: &str) -> Result<Option<Room>, BrokerError> {
        Ok(self.rooms.read().get(room_id).cloned())
    }

    fn list_rooms(&self) -> Result<Vec<Room>, BrokerError> {
        Ok(self.rooms.read().values().cloned().collect())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
