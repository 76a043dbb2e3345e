// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::Authenticator;
use crate::broker::Broker;
use crate::config::BrokerConfig;

/// Shared server state handed to every route.
pub struct AppState {
    pub broker: Arc<Broker>,
    pub auth: Arc<dyn Authenticator>,
    pub config: BrokerConfig,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: BrokerConfig,
        broker: Arc<Broker>,
        auth: Arc<dyn Authenticator>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { broker, auth, config, shutdown }
    }
}
