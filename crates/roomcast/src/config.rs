// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// What to do when a room is created with a name that already exists.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomNamePolicy {
    /// Names are unique, compared case-insensitively after trimming.
    #[default]
    Unique,
    Duplicates,
}

impl std::str::FromStr for RoomNamePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unique" => Ok(Self::Unique),
            "duplicates" => Ok(Self::Duplicates),
            other => anyhow::bail!("invalid room name policy: {other}"),
        }
    }
}

/// How the online list of a room is keyed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceKey {
    /// One entry per user, however many sessions they have open.
    #[default]
    User,
    /// One entry per session.
    Session,
}

impl std::str::FromStr for PresenceKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "session" => Ok(Self::Session),
            other => anyhow::bail!("invalid presence key: {other}"),
        }
    }
}

/// Real-time room message broker.
#[derive(Debug, Clone, Parser)]
#[command(name = "roomcast", version, about)]
pub struct BrokerConfig {
    /// Host address to bind to.
    #[arg(long, default_value = "127.0.0.1", env = "ROOMCAST_HOST")]
    pub host: String,

    /// HTTP port to listen on.
    #[arg(long, default_value_t = 8080, env = "ROOMCAST_PORT")]
    pub port: u16,

    /// Path to a JSON file of `[{token, user_id, username}]` bearer credentials.
    #[arg(long, env = "ROOMCAST_TOKENS")]
    pub tokens: Option<PathBuf>,

    /// Accept any non-empty bearer token as its own user (development only).
    #[arg(long, env = "ROOMCAST_DEV_AUTH")]
    pub dev_auth: bool,

    /// Longest accepted message in characters. A message of exactly this
    /// length is accepted.
    #[arg(long, default_value_t = 4000, env = "ROOMCAST_MAX_MESSAGE_LEN")]
    pub max_message_len: usize,

    /// Outbound frame queue capacity per session. Overflow drops the session.
    #[arg(long, default_value_t = 256, env = "ROOMCAST_SEND_QUEUE")]
    pub send_queue: usize,

    /// Socket send timeout per frame in milliseconds.
    #[arg(long, default_value_t = 5000, env = "ROOMCAST_SEND_TIMEOUT_MS")]
    pub send_timeout_ms: u64,

    /// Close connections with no inbound frame for this long (0 = never).
    #[arg(long, default_value_t = 120_000, env = "ROOMCAST_IDLE_TIMEOUT_MS")]
    pub idle_timeout_ms: u64,

    /// Interval between server pings on each connection (0 = never). Must be
    /// shorter than the idle timeout so a quiet client's pongs keep it alive.
    #[arg(long, default_value_t = 30_000, env = "ROOMCAST_HEARTBEAT_INTERVAL_MS")]
    pub heartbeat_interval_ms: u64,

    /// Dead/idle session sweep interval in milliseconds.
    #[arg(long, default_value_t = 15_000, env = "ROOMCAST_REAP_INTERVAL_MS")]
    pub reap_interval_ms: u64,

    /// Duplicate room name policy (unique, duplicates).
    #[arg(long, default_value = "unique", env = "ROOMCAST_ROOM_NAMES")]
    pub room_names: String,

    /// Presence dedupe key (user, session).
    #[arg(long, default_value = "user", env = "ROOMCAST_PRESENCE_BY")]
    pub presence_by: String,

    /// Default and maximum history page size.
    #[arg(long, default_value_t = 100, env = "ROOMCAST_HISTORY_LIMIT")]
    pub history_limit: usize,

    /// Log format (json or text).
    #[arg(long, default_value = "json", env = "ROOMCAST_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "ROOMCAST_LOG_LEVEL")]
    pub log_level: String,
}

impl BrokerConfig {
    /// Validate argument combinations that clap cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tokens.is_some() && self.dev_auth {
            anyhow::bail!("--tokens and --dev-auth are mutually exclusive");
        }
        if self.send_queue == 0 {
            anyhow::bail!("--send-queue must be at least 1");
        }
        if self.max_message_len == 0 {
            anyhow::bail!("--max-message-len must be at least 1");
        }
        if self.history_limit == 0 {
            anyhow::bail!("--history-limit must be at least 1");
        }
        if let (Some(beat), Some(idle)) = (self.heartbeat_interval(), self.idle_timeout()) {
            if beat >= idle {
                anyhow::bail!("--heartbeat-interval-ms must be shorter than --idle-timeout-ms");
            }
        }
        self.room_name_policy()?;
        self.presence_key()?;
        Ok(())
    }

    pub fn room_name_policy(&self) -> anyhow::Result<RoomNamePolicy> {
        self.room_names.parse()
    }

    pub fn presence_key(&self) -> anyhow::Result<PresenceKey> {
        self.presence_by.parse()
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// `None` when idle disconnects are disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }

    /// `None` when server pings are disabled.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms.max(1))
    }

    /// Baseline config for tests: dev auth, text logs, no listener.
    pub fn test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            tokens: None,
            dev_auth: true,
            max_message_len: 4000,
            send_queue: 64,
            send_timeout_ms: 1000,
            idle_timeout_ms: 0,
            heartbeat_interval_ms: 0,
            reap_interval_ms: 60_000,
            room_names: "unique".into(),
            presence_by: "user".into(),
            history_limit: 100,
            log_format: "text".into(),
            log_level: "debug".into(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
