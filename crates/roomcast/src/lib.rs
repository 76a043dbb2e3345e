// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Roomcast: real-time room message broker.

pub mod auth;
pub mod broker;
pub mod config;
pub mod directory;
pub mod error;
pub mod frame;
pub mod model;
pub mod presence;
pub mod reaper;
pub mod registry;
pub mod state;
pub mod store;
pub mod transport;

#[doc(hidden)]
pub mod test_support;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::{Authenticator, DevAuth, StaticTokens};
use crate::broker::Broker;
use crate::config::BrokerConfig;
use crate::reaper::spawn_reaper;
use crate::state::AppState;
use crate::store::MemoryStore;
use crate::transport::build_router;

/// Pick the authentication collaborator the config asks for.
pub fn build_authenticator(config: &BrokerConfig) -> anyhow::Result<Arc<dyn Authenticator>> {
    if let Some(ref path) = config.tokens {
        let tokens = StaticTokens::load(path)?;
        info!(path = %path.display(), users = tokens.len(), "loaded bearer tokens");
        return Ok(Arc::new(tokens));
    }
    if config.dev_auth {
        warn!("dev auth enabled: any non-empty token is accepted");
        return Ok(Arc::new(DevAuth));
    }
    warn!("no --tokens file and no --dev-auth: every request will be refused");
    Ok(Arc::new(StaticTokens::new(vec![])))
}

/// Serve on an already-bound listener until `shutdown` fires.
///
/// On shutdown every live session is cancelled and the reaper stops.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let reaper = spawn_reaper(
        Arc::clone(&state.broker),
        state.config.reap_interval(),
        state.config.idle_timeout(),
        shutdown.clone(),
    );

    let broker = Arc::clone(&state.broker);
    let router = build_router(state);
    let closing = {
        let shutdown = shutdown.clone();
        async move {
            shutdown.cancelled().await;
            broker.shutdown();
        }
    };
    axum::serve(listener, router).with_graceful_shutdown(closing).await?;

    shutdown.cancel();
    let _ = reaper.await;
    Ok(())
}

/// Run the broker server until Ctrl-C.
pub async fn run(config: BrokerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let auth = build_authenticator(&config)?;
    let broker = Arc::new(Broker::new(&config, Arc::new(MemoryStore::new()))?);
    let state = Arc::new(AppState::new(config, broker, auth, shutdown.clone()));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received ctrl-c, shutting down");
            }
            shutdown.cancel();
        });
    }

    let listener = TcpListener::bind(&addr).await?;
    info!("roomcast listening on {}", listener.local_addr()?);
    serve(listener, state).await
}
