// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message broker: the composition root over registry, directory and store.
//!
//! `publish` validates, assigns the room's next sequence id, persists, and
//! fans out to the room's members, all inside the room's ordering scope.
//! Every transport goes through this type; nothing else touches the
//! directory or registry directly for mutations.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::BrokerConfig;
use crate::directory::RoomDirectory;
use crate::error::BrokerError;
use crate::frame::{FrameText, ServerFrame};
use crate::model::{epoch_ms, Identity, Message, PresenceSnapshot, Room, RoomId, SessionId};
use crate::presence::PresenceTracker;
use crate::registry::SessionRegistry;
use crate::store::Store;

pub struct Broker {
    registry: Arc<SessionRegistry>,
    directory: RoomDirectory,
    store: Arc<dyn Store>,
    max_message_len: usize,
    history_limit: usize,
}

impl Broker {
    pub fn new(config: &BrokerConfig, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let presence = PresenceTracker::new(Arc::clone(&registry), config.presence_key()?);
        let directory = RoomDirectory::load(
            Arc::clone(&store),
            Arc::clone(&registry),
            presence,
            config.room_name_policy()?,
        )
        .map_err(|e| anyhow::anyhow!("failed to load rooms: {e}"))?;
        Ok(Self {
            registry,
            directory,
            store,
            max_message_len: config.max_message_len,
            history_limit: config.history_limit,
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    /// Register a new session whose writer drains `tx`.
    pub fn connect(&self, identity: Identity, tx: mpsc::Sender<FrameText>) -> SessionId {
        self.registry.register(identity, tx)
    }

    /// Tear a session down: deregister it, then leave its room.
    ///
    /// Safe to call more than once; later calls find nothing to do.
    pub async fn disconnect(&self, session: SessionId) {
        let Some(entry) = self.registry.deregister(session) else {
            return;
        };
        if let Some(room_id) = entry.room() {
            self.directory.leave(&room_id, session).await;
        }
        debug!(
            session_id = %session,
            user_id = %entry.identity.user_id,
            connected_ms = entry.connected_at.elapsed().as_millis() as u64,
            "session disconnected"
        );
    }

    pub async fn join(&self, room_id: &str, session: SessionId) -> Result<(), BrokerError> {
        self.directory.join(room_id, session).await
    }

    /// Leave whatever room the session is bound to. Returns the room left.
    pub async fn leave(&self, session: SessionId) -> Option<RoomId> {
        let room_id = self.registry.room_of(session)?;
        self.directory.leave(&room_id, session).await.then_some(room_id)
    }

    /// Publish `content` from `author` into `room_id`.
    ///
    /// The author does not need to be a member of the room. Members present
    /// when the room lock is taken receive the message in member order; a
    /// failed delivery only affects its own session.
    pub async fn publish(
        &self,
        room_id: &str,
        author: SessionId,
        content: &str,
    ) -> Result<Message, BrokerError> {
        self.validate_content(content)?;
        let entry = self.registry.get(author).ok_or(BrokerError::SessionNotFound)?;
        let slot = self.directory.slot(room_id)?;

        let mut state = slot.lock().await;
        let message = Message {
            id: state.next_seq(),
            room_id: room_id.to_owned(),
            author_user_id: entry.identity.user_id.clone(),
            username: entry.identity.username.clone(),
            content: content.to_owned(),
            created_at: epoch_ms(),
        };
        self.store.append(&message)?;
        state.commit_seq(message.id);

        let frame = ServerFrame::Message(message.clone()).encode()?;
        let out = self.registry.deliver_all(state.members(), &frame);
        drop(state);

        debug!(
            room_id,
            id = message.id,
            delivered = out.delivered,
            failed = out.failed.len(),
            "message published"
        );
        Ok(message)
    }

    fn validate_content(&self, content: &str) -> Result<(), BrokerError> {
        if content.trim().is_empty() || content.chars().count() > self.max_message_len {
            return Err(BrokerError::InvalidMessage);
        }
        Ok(())
    }

    /// Stored messages of a room, ascending.
    ///
    /// With `since_id` this returns messages after it; without, the most
    /// recent page. `limit` is capped at the configured history limit.
    pub async fn history(
        &self,
        room_id: &str,
        since_id: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, BrokerError> {
        let slot = self.directory.slot(room_id)?;
        let limit = limit.unwrap_or(self.history_limit).min(self.history_limit);
        let since_id = match since_id {
            Some(id) => id,
            None => {
                // Read the tail under the room lock so it matches what was broadcast.
                let last = slot.lock().await.next_seq() - 1;
                last.saturating_sub(limit as u64)
            }
        };
        self.store.list(room_id, since_id, limit)
    }

    pub fn create_room(&self, name: &str, description: &str) -> Result<Room, BrokerError> {
        self.directory.create_room(name, description)
    }

    pub fn get_room(&self, room_id: &str) -> Result<Room, BrokerError> {
        self.directory.get_room(room_id)
    }

    pub fn list_rooms(&self) -> Result<Vec<Room>, BrokerError> {
        self.directory.list_rooms()
    }

    pub async fn online_users(&self, room_id: &str) -> Result<PresenceSnapshot, BrokerError> {
        self.directory.online_users(room_id).await
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn room_count(&self) -> usize {
        self.directory.len()
    }

    /// Cancel every live session. Connection tasks observe the cancellation
    /// and run their own disconnect.
    pub fn shutdown(&self) {
        info!(sessions = self.registry.len(), "closing all sessions");
        self.registry.cancel_all();
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
