// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pinentry protocol loop: accumulate SET* state, translate GETPIN and
//! CONFIRM into daemon sessions, and report terminal results.

use std::io::{BufRead, Write};
use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};
use zeroize::Zeroize;

use bb_auth::ipc::IpcClient;
use bb_auth::limits::{PINENTRY_REQUEST_TIMEOUT, PINENTRY_RESULT_TIMEOUT};

use crate::assuan::{assuan_decode, assuan_encode, split_command};

/// Assuan error for a cancelled operation (GPG_ERR_CANCELED with source).
const ERR_CANCELLED: u32 = 83886179;

/// Request path to the daemon, fakeable in tests.
pub trait DaemonTransport {
    fn request(
        &mut self,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> anyhow::Result<serde_json::Value>;
}

/// Production transport over the control socket.
pub struct SocketTransport {
    client: IpcClient,
}

impl SocketTransport {
    pub fn new(socket: impl Into<std::path::PathBuf>) -> Self {
        Self { client: IpcClient::new(socket.into()) }
    }
}

impl DaemonTransport for SocketTransport {
    fn request(
        &mut self,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> anyhow::Result<serde_json::Value> {
        self.client.request_with_timeout(&payload, timeout)
    }
}

#[derive(Debug, Default, Clone)]
struct PinState {
    description: String,
    prompt: String,
    title: String,
    error: String,
    // Button labels are accumulated but the daemon UI renders its own.
    #[allow(dead_code)]
    ok_text: String,
    #[allow(dead_code)]
    cancel_text: String,
    #[allow(dead_code)]
    not_ok_text: String,
    keyinfo: String,
    repeat: String,
}

/// One stdio pinentry session.
pub struct PinentrySession<R, W, T> {
    reader: R,
    writer: W,
    transport: T,
    state: PinState,
    flow_cookie: Option<String>,
    awaiting_terminal_result: bool,
}

impl<R: BufRead, W: Write, T: DaemonTransport> PinentrySession<R, W, T> {
    pub fn new(reader: R, writer: W, transport: T) -> Self {
        Self {
            reader,
            writer,
            transport,
            state: PinState::default(),
            flow_cookie: None,
            awaiting_terminal_result: false,
        }
    }

    /// Run until BYE or stdin EOF.
    pub fn run(&mut self) -> anyhow::Result<()> {
        self.send_ok(Some("BB Auth Pinentry"))?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = self.reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                continue;
            }
            if !self.handle_command(trimmed)? {
                return Ok(());
            }
        }

        self.finalize_on_stream_close();
        Ok(())
    }

    /// Consume the session and return its writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn ensure_flow_cookie(&mut self) -> String {
        self.flow_cookie
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone()
    }

    fn reset_flow(&mut self) {
        self.awaiting_terminal_result = false;
        self.flow_cookie = None;
    }

    /// Final report when GnuPG walks away: a pending submit becomes success
    /// or error, an unresolved flow becomes cancelled.
    fn finalize_on_stream_close(&mut self) {
        if self.awaiting_terminal_result {
            if self.state.error.is_empty() {
                self.report_terminal_result("success", None);
            } else {
                let error = self.state.error.clone();
                self.report_terminal_result("error", Some(&error));
            }
            return;
        }
        if self.flow_cookie.is_some() {
            if self.state.error.is_empty() {
                self.report_terminal_result("cancelled", None);
            } else {
                let error = self.state.error.clone();
                self.report_terminal_result("error", Some(&error));
            }
        }
    }

    fn report_terminal_result(&mut self, result: &str, error: Option<&str>) {
        let Some(cookie) = self.flow_cookie.clone() else {
            return;
        };
        let mut request = json!({
            "type": "pinentry_result",
            "cookie": cookie,
            "result": result,
        });
        if let Some(error) = error.filter(|e| !e.is_empty()) {
            request["error"] = json!(error);
        }

        match self.transport.request(request, PINENTRY_RESULT_TIMEOUT) {
            Ok(reply) if reply.get("type").and_then(|t| t.as_str()) == Some("error") => {
                debug!(cookie = %cookie, "daemon rejected terminal result report");
            }
            Ok(_) => {}
            Err(error) => {
                warn!(cookie = %cookie, %error, "failed to report terminal result");
            }
        }

        if result == "retry" {
            self.awaiting_terminal_result = false;
        } else {
            self.reset_flow();
        }
    }

    // -- Output ----------------------------------------------------------------

    fn send_ok(&mut self, comment: Option<&str>) -> anyhow::Result<()> {
        match comment {
            Some(comment) => writeln!(self.writer, "OK {comment}")?,
            None => writeln!(self.writer, "OK")?,
        }
        self.writer.flush()?;
        Ok(())
    }

    fn send_error(&mut self, code: u32, message: &str) -> anyhow::Result<()> {
        writeln!(self.writer, "ERR {code} {message}")?;
        self.writer.flush()?;
        Ok(())
    }

    fn send_data(&mut self, data: &str) -> anyhow::Result<()> {
        writeln!(self.writer, "D {}", assuan_encode(data))?;
        self.writer.flush()?;
        Ok(())
    }

    // -- Command dispatch --------------------------------------------------------

    /// Handle one protocol line; `false` ends the loop (BYE).
    fn handle_command(&mut self, line: &str) -> anyhow::Result<bool> {
        let (command, raw_arg) = split_command(line);
        let arg = raw_arg.map(assuan_decode).unwrap_or_default();

        if command.eq_ignore_ascii_case("BYE") {
            self.finalize_on_stream_close();
            self.send_ok(Some("closing connection"))?;
            return Ok(false);
        }

        if command.eq_ignore_ascii_case("SETDESC") {
            self.state.description = arg;
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("SETPROMPT") {
            self.state.prompt = arg;
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("SETTITLE") {
            self.state.title = arg;
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("SETERROR") {
            self.state.error = arg;
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("SETOK") {
            self.state.ok_text = arg;
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("SETCANCEL") {
            self.state.cancel_text = arg;
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("SETNOTOK") {
            self.state.not_ok_text = arg;
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("SETKEYINFO") {
            self.state.keyinfo = arg;
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("SETREPEAT") {
            self.state.repeat = arg;
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("OPTION") {
            // ttyname, lc-ctype and friends are acknowledged, not used.
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("GETINFO") {
            match arg.as_str() {
                "pid" => {
                    let pid = std::process::id().to_string();
                    self.send_data(&pid)?;
                    self.send_ok(None)?;
                }
                "version" => {
                    self.send_data("1.0.0")?;
                    self.send_ok(None)?;
                }
                "flavor" => {
                    self.send_data("bb")?;
                    self.send_ok(None)?;
                }
                "ttyinfo" => {
                    self.send_data("")?;
                    self.send_ok(None)?;
                }
                _ => self.send_ok(None)?,
            }
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("GETPIN") {
            self.handle_getpin()?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("CONFIRM") {
            self.handle_confirm()?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("MESSAGE") {
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("RESET") {
            self.state = PinState::default();
            self.send_ok(None)?;
            return Ok(true);
        }
        if command.eq_ignore_ascii_case("NOP") {
            self.send_ok(None)?;
            return Ok(true);
        }

        // Unknown commands are still OK per Assuan convention.
        self.send_ok(None)?;
        Ok(true)
    }

    fn handle_getpin(&mut self) -> anyhow::Result<()> {
        // A GETPIN while a submit is pending is GnuPG retrying: the prior
        // flow terminates as a retry carrying the current SETERROR text.
        if self.awaiting_terminal_result {
            let retry_error = if self.state.error.is_empty() {
                "Authentication failed".to_owned()
            } else {
                self.state.error.clone()
            };
            self.report_terminal_result("retry", Some(&retry_error));
        }

        match self.request_password_from_daemon() {
            Some(mut password) if !password.is_empty() => {
                self.send_data(&password)?;
                password.zeroize();
                self.send_ok(None)?;
            }
            _ => {
                self.send_error(ERR_CANCELLED, "Operation cancelled")?;
            }
        }

        self.state.error.clear();
        Ok(())
    }

    fn handle_confirm(&mut self) -> anyhow::Result<()> {
        if self.request_confirm_from_daemon() {
            self.send_ok(None)?;
        } else {
            self.send_error(ERR_CANCELLED, "Operation cancelled")?;
        }
        self.state.error.clear();
        Ok(())
    }

    fn request_password_from_daemon(&mut self) -> Option<String> {
        let cookie = self.ensure_flow_cookie();

        let title =
            if self.state.title.is_empty() { "GPG Key" } else { self.state.title.as_str() };
        let prompt = if self.state.prompt.is_empty() {
            "Enter passphrase:"
        } else {
            self.state.prompt.as_str()
        };
        let mut request = json!({
            "type": "pinentry_request",
            "cookie": cookie,
            "title": title,
            "prompt": prompt,
            "description": self.state.description,
            "repeat": !self.state.repeat.is_empty(),
        });
        if !self.state.error.is_empty() {
            request["error"] = json!(self.state.error);
        }
        if !self.state.keyinfo.is_empty() {
            request["keyinfo"] = json!(self.state.keyinfo);
        }

        let response = match self.transport.request(request, PINENTRY_REQUEST_TIMEOUT) {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "failed to communicate with daemon");
                self.reset_flow();
                return None;
            }
        };

        match response.get("type").and_then(|t| t.as_str()) {
            Some("pinentry_response") => {
                if response.get("result").and_then(|r| r.as_str()) == Some("ok") {
                    let password = response
                        .get("password")
                        .and_then(|p| p.as_str())
                        .filter(|p| !p.is_empty())
                        .map(str::to_owned);
                    self.awaiting_terminal_result = password.is_some();
                    return password;
                }
                // Cancelled by the user; the flow cookie survives so BYE/EOF
                // still reports the cancellation.
                self.awaiting_terminal_result = false;
                None
            }
            Some("error") => {
                warn!(reply = %response, "daemon rejected pinentry request");
                self.reset_flow();
                None
            }
            _ => {
                self.reset_flow();
                None
            }
        }
    }

    fn request_confirm_from_daemon(&mut self) -> bool {
        let cookie = self.ensure_flow_cookie();

        let title =
            if self.state.title.is_empty() { "Confirm" } else { self.state.title.as_str() };
        let prompt = if self.state.description.is_empty() {
            "Please confirm"
        } else {
            self.state.description.as_str()
        };
        let request = json!({
            "type": "pinentry_request",
            "cookie": cookie,
            "title": title,
            "prompt": prompt,
            "confirm_only": true,
        });

        let response = match self.transport.request(request, PINENTRY_REQUEST_TIMEOUT) {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "failed to communicate with daemon");
                self.reset_flow();
                return false;
            }
        };

        let confirmed = response.get("type").and_then(|t| t.as_str())
            == Some("pinentry_response")
            && response.get("result").and_then(|r| r.as_str()) == Some("confirmed");
        self.awaiting_terminal_result = confirmed;
        confirmed
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
