// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Presence tracker: derives a room's online list from its members.
//!
//! Snapshots are recomputed on every membership change while the room's
//! ordering lock is held, so presence updates and messages share a single
//! total order per room.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::config::PresenceKey;
use crate::frame::ServerFrame;
use crate::model::{PresenceSnapshot, SessionId, UserSummary};
use crate::registry::{FanOut, SessionRegistry};

pub struct PresenceTracker {
    registry: Arc<SessionRegistry>,
    key: PresenceKey,
}

impl PresenceTracker {
    pub fn new(registry: Arc<SessionRegistry>, key: PresenceKey) -> Self {
        Self { registry, key }
    }

    /// Resolve member sessions into the room's online list.
    ///
    /// Entries follow join order. Sessions that are dead or already
    /// deregistered are not online.
    pub fn snapshot<'a>(
        &self,
        room_id: &str,
        members: impl IntoIterator<Item = &'a SessionId>,
    ) -> PresenceSnapshot {
        let mut seen = HashSet::new();
        let mut online = Vec::new();
        for &id in members {
            let Some(entry) = self.registry.get(id) else {
                continue;
            };
            if entry.is_dead() {
                continue;
            }
            let summary: UserSummary = entry.summary();
            if self.key == PresenceKey::User && !seen.insert(summary.user_id.clone()) {
                continue;
            }
            online.push(summary);
        }
        PresenceSnapshot { room_id: room_id.to_owned(), online }
    }

    /// Recompute the snapshot and push a `presence_update` to every member.
    pub fn announce<'a, I>(&self, room_id: &str, members: I) -> FanOut
    where
        I: IntoIterator<Item = &'a SessionId> + Clone,
    {
        let snapshot = self.snapshot(room_id, members.clone());
        let online = snapshot.online.len();
        let Ok(frame) = ServerFrame::from(snapshot).encode() else {
            return FanOut { delivered: 0, failed: members.into_iter().copied().collect() };
        };
        let out = self.registry.deliver_all(members, &frame);
        debug!(room_id, online, delivered = out.delivered, "presence update");
        out
    }
}

#[cfg(test)]
#[path = "presence_tests.rs"]
mod tests;
