// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background sweep that disconnects dead and idle sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::Broker;

/// Disconnect every session that is dead or idle past `idle_timeout`.
///
/// Returns how many sessions were reaped.
pub async fn sweep(broker: &Broker, idle_timeout: Option<Duration>) -> usize {
    let stale = broker.registry().stale(idle_timeout);
    for &session in &stale {
        if let Some(entry) = broker.registry().get(session) {
            if !entry.is_dead() {
                let idle_ms = entry.idle_for().as_millis() as u64;
                tracing::info!(session_id = %session, idle_ms, "idle timeout");
            }
        }
        broker.disconnect(session).await;
    }
    stale.len()
}

/// Spawn the reaper loop. It exits when `shutdown` fires.
pub fn spawn_reaper(
    broker: Arc<Broker>,
    interval: Duration,
    idle_timeout: Option<Duration>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let reaped = sweep(&broker, idle_timeout).await;
            if reaped > 0 {
                tracing::debug!(reaped, sessions = broker.session_count(), "reaped sessions");
            }
        }
    })
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
