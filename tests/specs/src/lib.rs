// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `roomcast` binary as a subprocess and exercises it over
//! HTTP and WebSocket.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times, only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `roomcast` binary.
pub fn roomcast_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("roomcast")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `roomcast` process that is killed on drop.
pub struct RoomcastProcess {
    child: Child,
    port: u16,
    _tokens_file: Option<tempfile::NamedTempFile>,
}

/// Builder for the broker's command line.
///
/// By default the process runs with `--dev-auth`.
#[derive(Default)]
pub struct RoomcastBuilder {
    tokens: Option<serde_json::Value>,
    extra: Vec<String>,
}

impl RoomcastBuilder {
    /// Authenticate against a static token list instead of dev auth.
    ///
    /// Each entry is `(token, user_id, username)`.
    pub fn tokens(mut self, entries: &[(&str, &str, &str)]) -> Self {
        let list = entries
            .iter()
            .map(|(token, user_id, username)| {
                serde_json::json!({ "token": token, "user_id": user_id, "username": username })
            })
            .collect::<Vec<_>>();
        self.tokens = Some(serde_json::Value::Array(list));
        self
    }

    /// Append a raw argument.
    pub fn arg(mut self, arg: &str) -> Self {
        self.extra.push(arg.to_owned());
        self
    }

    pub fn spawn(self) -> anyhow::Result<RoomcastProcess> {
        ensure_crypto();
        let binary = roomcast_binary();
        anyhow::ensure!(binary.exists(), "roomcast binary not found at {}", binary.display());

        let port = free_port()?;
        let mut args: Vec<String> = vec![
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--log-format".into(),
            "text".into(),
            "--log-level".into(),
            "warn".into(),
        ];

        let tokens_file = match self.tokens {
            Some(list) => {
                let mut file = tempfile::NamedTempFile::new()?;
                file.write_all(serde_json::to_string(&list)?.as_bytes())?;
                args.extend(["--tokens".into(), file.path().to_string_lossy().into_owned()]);
                Some(file)
            }
            None => {
                args.push("--dev-auth".into());
                None
            }
        };
        args.extend(self.extra);

        let child = Command::new(&binary)
            .args(&args)
            .env_remove("ROOMCAST_TOKENS")
            .env_remove("ROOMCAST_DEV_AUTH")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(RoomcastProcess { child, port, _tokens_file: tokens_file })
    }
}

impl RoomcastProcess {
    pub fn build() -> RoomcastBuilder {
        RoomcastBuilder::default()
    }

    /// Spawn with dev auth.
    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for HTTP requests.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// WebSocket URL with the given query string.
    pub fn ws_url(&self, query: &str) -> String {
        format!("ws://127.0.0.1:{}/ws?{query}", self.port)
    }

    /// Poll health until responsive.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/api/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("roomcast did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Send SIGINT, as Ctrl-C would.
    pub fn interrupt(&self) -> anyhow::Result<()> {
        let pid = i32::try_from(self.child.id())?;
        kill(Pid::from_raw(pid), Signal::SIGINT)?;
        Ok(())
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(
        &mut self,
        timeout: Duration,
    ) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("roomcast did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for RoomcastProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
