// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

use super::{BrokerConfig, PresenceKey, RoomNamePolicy};

fn parse(args: &[&str]) -> BrokerConfig {
    BrokerConfig::parse_from(args)
}

#[test]
fn defaults_are_valid() -> anyhow::Result<()> {
    let config = parse(&["roomcast"]);
    config.validate()?;
    assert_eq!(config.port, 8080);
    assert_eq!(config.max_message_len, 4000);
    assert_eq!(config.room_name_policy()?, RoomNamePolicy::Unique);
    assert_eq!(config.presence_key()?, PresenceKey::User);
    assert_eq!(config.idle_timeout(), Some(Duration::from_secs(120)));
    assert_eq!(config.heartbeat_interval(), Some(Duration::from_secs(30)));
    Ok(())
}

#[test]
fn zero_idle_timeout_disables_it() -> anyhow::Result<()> {
    let config = parse(&["roomcast", "--idle-timeout-ms", "0"]);
    config.validate()?;
    assert_eq!(config.idle_timeout(), None);
    Ok(())
}

#[test]
fn policies_parse_case_insensitively() -> anyhow::Result<()> {
    let config = parse(&["roomcast", "--room-names", "Duplicates", "--presence-by", "SESSION"]);
    config.validate()?;
    assert_eq!(config.room_name_policy()?, RoomNamePolicy::Duplicates);
    assert_eq!(config.presence_key()?, PresenceKey::Session);
    Ok(())
}

#[yare::parameterized(
    tokens_and_dev   = { &["roomcast", "--tokens", "/tmp/t.json", "--dev-auth"], "mutually exclusive" },
    zero_queue       = { &["roomcast", "--send-queue", "0"], "--send-queue" },
    zero_message_len = { &["roomcast", "--max-message-len", "0"], "--max-message-len" },
    zero_history     = { &["roomcast", "--history-limit", "0"], "--history-limit" },
    bad_policy       = { &["roomcast", "--room-names", "sometimes"], "room name policy" },
    bad_presence     = { &["roomcast", "--presence-by", "device"], "presence key" },
    slow_heartbeat   = {
        &["roomcast", "--heartbeat-interval-ms", "5000", "--idle-timeout-ms", "5000"],
        "--heartbeat-interval-ms"
    },
)]
fn invalid_config(args: &[&str], expected_substr: &str) {
    match parse(args).validate() {
        Err(e) => assert!(e.to_string().contains(expected_substr), "error: {e}"),
        Ok(()) => unreachable!("expected validation error containing {expected_substr:?}"),
    }
}

#[test]
fn test_config_is_valid() -> anyhow::Result<()> {
    BrokerConfig::test().validate()
}

#[test]
fn heartbeat_without_idle_timeout_is_valid() -> anyhow::Result<()> {
    let config = parse(&["roomcast", "--idle-timeout-ms", "0", "--heartbeat-interval-ms", "500"]);
    config.validate()?;
    assert_eq!(config.heartbeat_interval(), Some(Duration::from_millis(500)));
    Ok(())
}
