// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for unit and integration tests.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::{Authenticator, DevAuth};
use crate::broker::Broker;
use crate::config::BrokerConfig;
use crate::frame::FrameText;
use crate::model::{Identity, SessionId};
use crate::state::AppState;
use crate::store::MemoryStore;

/// Identity whose user id is derived from the name.
pub fn identity(name: &str) -> Identity {
    Identity { user_id: format!("u-{name}"), username: name.to_owned() }
}

/// Broker over a fresh in-memory store with [`BrokerConfig::test`].
pub fn test_broker() -> Arc<Broker> {
    test_broker_with(BrokerConfig::test())
}

pub fn test_broker_with(config: BrokerConfig) -> Arc<Broker> {
    match Broker::new(&config, Arc::new(MemoryStore::new())) {
        Ok(broker) => Arc::new(broker),
        Err(e) => unreachable!("test config rejected: {e}"),
    }
}

/// App state over `broker` with dev auth (any token is its own user).
pub fn test_state(broker: Arc<Broker>, config: BrokerConfig) -> Arc<AppState> {
    let auth: Arc<dyn Authenticator> = Arc::new(DevAuth);
    Arc::new(AppState::new(config, broker, auth, CancellationToken::new()))
}

/// Serve `state` on a random local port, reaper included.
///
/// Returns the bound address and a join handle for the server task. Cancel
/// `state.shutdown` to stop it.
pub async fn spawn_http_server(
    state: Arc<AppState>,
) -> anyhow::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = crate::serve(listener, state).await;
    });
    Ok((addr, handle))
}

/// A registered session without a socket; frames land in `rx`.
pub struct TestSession {
    pub id: SessionId,
    pub rx: mpsc::Receiver<FrameText>,
}

impl TestSession {
    pub fn connect(broker: &Broker, name: &str) -> Self {
        Self::connect_with_queue(broker, name, 64)
    }

    pub fn connect_with_queue(broker: &Broker, name: &str, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let id = broker.registry().register(identity(name), tx);
        Self { id, rx }
    }

    /// Drain every queued frame, parsed as JSON.
    pub fn drain(&mut self) -> anyhow::Result<Vec<serde_json::Value>> {
        let mut out = Vec::new();
        while let Ok(text) = self.rx.try_recv() {
            out.push(serde_json::from_str(&text)?);
        }
        Ok(out)
    }

    /// Drain and keep only frames of the given `type`.
    pub fn drain_kind(&mut self, kind: &str) -> anyhow::Result<Vec<serde_json::Value>> {
        Ok(self.drain()?.into_iter().filter(|f| f["type"] == kind).collect())
    }
}

pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}
