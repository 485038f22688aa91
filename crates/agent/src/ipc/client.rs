// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blocking one-shot IPC client used by the CLI commands and the pinentry
//! adapter. One connection per request; the reply is the first non-empty
//! line.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::limits::{IPC_READ_TIMEOUT, IPC_WRITE_TIMEOUT};

pub struct IpcClient {
    path: PathBuf,
}

impl IpcClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Send one request and wait for its reply line with the default 1 s
    /// read timeout.
    pub fn request(&self, request: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
        self.request_with_timeout(request, IPC_READ_TIMEOUT)
    }

    /// Send one request and wait up to `read_timeout` for the reply line.
    /// Long timeouts are used for deferred replies (pinentry requests wait
    /// for the user).
    pub fn request_with_timeout(
        &self,
        request: &serde_json::Value,
        read_timeout: Duration,
    ) -> anyhow::Result<serde_json::Value> {
        let mut stream = UnixStream::connect(&self.path)
            .with_context(|| format!("connect to {}", self.path.display()))?;
        stream.set_write_timeout(Some(IPC_WRITE_TIMEOUT))?;
        stream.set_read_timeout(Some(read_timeout))?;

        let mut payload = serde_json::to_vec(request)?;
        payload.push(b'\n');
        stream.write_all(&payload)?;
        stream.flush()?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line).context("read reply")?;
            if read == 0 {
                anyhow::bail!("connection closed before reply");
            }
            if !line.trim().is_empty() {
                break;
            }
        }
        serde_json::from_str(line.trim()).context("parse reply")
    }
}
