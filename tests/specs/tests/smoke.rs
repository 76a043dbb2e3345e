// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `roomcast` binary and drive it
//! over HTTP and WebSocket.

use std::process::Command;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use roomcast_specs::{roomcast_binary, RoomcastProcess};

const TIMEOUT: Duration = Duration::from_secs(10);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn recv_kind(ws: &mut WsStream, kind: &str) -> anyhow::Result<serde_json::Value> {
    loop {
        let msg = tokio::time::timeout(TIMEOUT, ws.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => anyhow::bail!("expected text ws message, got: {other:?}"),
        };
        let parsed: serde_json::Value = serde_json::from_str(&text)?;
        if parsed["type"] == kind {
            return Ok(parsed);
        }
    }
}

async fn create_room(
    proc: &RoomcastProcess,
    token: &str,
    name: &str,
) -> anyhow::Result<serde_json::Value> {
    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat/rooms", proc.base_url()))
        .bearer_auth(token)
        .json(&serde_json::json!({ "name": name }))
        .send()
        .await?;
    anyhow::ensure!(resp.status().as_u16() == 201, "create room: {}", resp.status());
    Ok(resp.json().await?)
}

// -- HTTP ---------------------------------------------------------------------

#[tokio::test]
async fn http_health() -> anyhow::Result<()> {
    let proc = RoomcastProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/health", proc.base_url())).await?.json().await?;
    assert_eq!(resp["status"], "running");
    assert_eq!(resp["sessions"], 0);
    assert_eq!(resp["rooms"], 0);
    Ok(())
}

#[tokio::test]
async fn http_static_tokens() -> anyhow::Result<()> {
    let proc = RoomcastProcess::build().tokens(&[("secret-1", "u1", "alice")]).spawn()?;
    proc.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/api/profile", proc.base_url());

    let resp = client.get(&url).bearer_auth("wrong").send().await?;
    assert_eq!(resp.status().as_u16(), 401);

    let profile: serde_json::Value =
        client.get(&url).bearer_auth("secret-1").send().await?.json().await?;
    assert_eq!(profile["id"], "u1");
    assert_eq!(profile["username"], "alice");
    Ok(())
}

#[tokio::test]
async fn http_rooms_and_history() -> anyhow::Result<()> {
    let proc = RoomcastProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let room = create_room(&proc, "alice", "general").await?;
    let id = room["id"].as_str().unwrap_or_default();

    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat/rooms", proc.base_url()))
        .bearer_auth("bob")
        .json(&serde_json::json!({ "name": "GENERAL" }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 409);

    let messages: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/api/chat/rooms/{id}/messages", proc.base_url()))
        .bearer_auth("alice")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(messages, serde_json::json!([]));
    Ok(())
}

// -- WebSocket ----------------------------------------------------------------

#[tokio::test]
async fn ws_refuses_bad_credentials() -> anyhow::Result<()> {
    let proc = RoomcastProcess::build().tokens(&[("secret-1", "u1", "alice")]).spawn()?;
    proc.wait_healthy(TIMEOUT).await?;

    let result = tokio_tungstenite::connect_async(proc.ws_url("token=nope")).await;
    assert!(result.is_err(), "should reject connection with wrong token");
    Ok(())
}

#[tokio::test]
async fn ws_chat_roundtrip() -> anyhow::Result<()> {
    let proc = RoomcastProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;
    let room = create_room(&proc, "alice", "general").await?;
    let id = room["id"].as_str().unwrap_or_default();

    let (mut alice, _) =
        tokio_tungstenite::connect_async(proc.ws_url(&format!("token=alice&room={id}"))).await?;
    recv_kind(&mut alice, "presence_update").await?;
    let (mut bob, _) =
        tokio_tungstenite::connect_async(proc.ws_url(&format!("token=bob&room={id}"))).await?;
    let presence = recv_kind(&mut bob, "presence_update").await?;
    assert_eq!(presence["online"].as_array().map(Vec::len), Some(2));

    for content in ["hi", "there"] {
        let frame = serde_json::json!({ "type": "message", "room_id": id, "content": content });
        alice.send(Message::Text(frame.to_string().into())).await?;
    }

    for ws in [&mut alice, &mut bob] {
        let first = recv_kind(ws, "message").await?;
        let second = recv_kind(ws, "message").await?;
        assert_eq!(first["id"], 1);
        assert_eq!(first["content"], "hi");
        assert_eq!(second["id"], 2);
        assert_eq!(second["content"], "there");
    }

    bob.send(Message::Text(r#"{"type":"ping"}"#.into())).await?;
    recv_kind(&mut bob, "pong").await?;
    Ok(())
}

// -- Process ------------------------------------------------------------------

#[tokio::test]
async fn invalid_config_exits_2() -> anyhow::Result<()> {
    let binary = roomcast_binary();
    anyhow::ensure!(binary.exists(), "roomcast binary not found at {}", binary.display());

    let status = Command::new(&binary).args(["--dev-auth", "--tokens", "/nonexistent"]).status()?;
    assert_eq!(status.code(), Some(2));

    let status = Command::new(&binary).args(["--dev-auth", "--room-names", "sometimes"]).status()?;
    assert_eq!(status.code(), Some(2));
    Ok(())
}

#[tokio::test]
async fn interrupt_shuts_down_cleanly() -> anyhow::Result<()> {
    let mut proc = RoomcastProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(proc.ws_url("token=alice")).await?;
    ws.send(Message::Text(r#"{"type":"ping"}"#.into())).await?;
    recv_kind(&mut ws, "pong").await?;

    proc.interrupt()?;
    let status = proc.wait_exit(TIMEOUT).await?;
    assert!(status.success(), "exit status: {status}");
    Ok(())
}
