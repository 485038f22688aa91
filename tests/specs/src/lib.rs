// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end daemon tests.
//!
//! Runs the daemon core in-process on a temporary socket and exercises it
//! with raw line clients and the polkit bridge channels.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;

use bb_auth::daemon::{self, DaemonOptions};
use bb_auth::polkit::{polkit_link, PolkitAgentHandle, PolkitCommand};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A daemon running in-process for one test.
pub struct TestDaemon {
    pub socket: PathBuf,
    pub polkit: PolkitAgentHandle,
    shutdown: CancellationToken,
    _dir: tempfile::TempDir,
}

impl TestDaemon {
    pub async fn start() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let socket = dir.path().join("bb-auth.sock");
        let options = DaemonOptions {
            socket_path: socket.clone(),
            system_provider_dir: dir.path().join("providers.d"),
            default_fallback: None,
        };
        let (link, glue) = polkit_link(64);
        let shutdown = CancellationToken::new();
        tokio::spawn(daemon::run(options, link, shutdown.clone()));

        for _ in 0..200 {
            if socket.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        anyhow::ensure!(socket.exists(), "daemon socket did not appear");

        Ok(Self { socket, polkit: glue, shutdown, _dir: dir })
    }

    pub async fn connect(&self) -> anyhow::Result<TestClient> {
        let stream = UnixStream::connect(&self.socket).await?;
        let (read, write) = stream.into_split();
        Ok(TestClient { reader: BufReader::new(read), writer: write })
    }

    /// Wait for the next polkit command from the daemon.
    pub async fn next_command(&mut self) -> anyhow::Result<PolkitCommand> {
        tokio::time::timeout(RECV_TIMEOUT, self.polkit.commands.recv())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for polkit command"))?
            .ok_or_else(|| anyhow::anyhow!("polkit command channel closed"))
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Raw newline-delimited JSON client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn send(&mut self, value: &serde_json::Value) -> anyhow::Result<()> {
        let mut line = value.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    pub async fn send_raw(&mut self, raw: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(raw).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Read the next non-empty line as JSON.
    pub async fn recv(&mut self) -> anyhow::Result<serde_json::Value> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = tokio::time::timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
                .await
                .map_err(|_| anyhow::anyhow!("timed out waiting for a reply line"))??;
            anyhow::ensure!(read > 0, "connection closed");
            if !line.trim().is_empty() {
                return Ok(serde_json::from_str(line.trim())?);
            }
        }
    }

    /// Read lines until one matches `predicate`, skipping others.
    pub async fn recv_until(
        &mut self,
        predicate: impl Fn(&serde_json::Value) -> bool,
    ) -> anyhow::Result<serde_json::Value> {
        for _ in 0..32 {
            let value = self.recv().await?;
            if predicate(&value) {
                return Ok(value);
            }
        }
        anyhow::bail!("no matching line within 32 messages")
    }

    pub async fn request(
        &mut self,
        value: &serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        self.send(value).await?;
        self.recv().await
    }

    /// True when the server closed the connection.
    pub async fn closed(&mut self) -> bool {
        let mut line = String::new();
        matches!(
            tokio::time::timeout(RECV_TIMEOUT, self.reader.read_line(&mut line)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }
}

/// Shorthand for the `type` field of a message.
pub fn msg_type(value: &serde_json::Value) -> &str {
    value.get("type").and_then(|t| t.as_str()).unwrap_or_default()
}
