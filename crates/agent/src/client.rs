// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot CLI commands that wrap single IPC calls. Each returns the
//! process exit code.

use std::io::BufRead;
use std::path::Path;

use serde_json::json;

use crate::ipc::IpcClient;

fn reply_type(reply: &serde_json::Value) -> &str {
    reply.get("type").and_then(|t| t.as_str()).unwrap_or_default()
}

/// `--ping`: exit 0 iff the daemon answers `pong`.
pub fn ping(socket: &Path) -> i32 {
    let client = IpcClient::new(socket);
    match client.request(&json!({"type": "ping"})) {
        Ok(reply) if reply_type(&reply) == "pong" => 0,
        _ => 1,
    }
}

/// `--next`: dequeue one pending event and print it as JSON.
pub fn next(socket: &Path) -> i32 {
    let client = IpcClient::new(socket);
    match client.request(&json!({"type": "next"})) {
        Ok(reply) => {
            if reply_type(&reply) != "empty" {
                println!("{reply}");
            }
            0
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    }
}

/// `--respond <cookie>`: read one line from stdin as the password and
/// deliver it to the session.
pub fn respond(socket: &Path, cookie: &str) -> i32 {
    let mut password = String::new();
    if std::io::stdin().lock().read_line(&mut password).is_err() {
        eprintln!("error: failed to read password from stdin");
        return 1;
    }
    let password = password.trim_end_matches(['\r', '\n']);

    let client = IpcClient::new(socket);
    let request = json!({"type": "session.respond", "id": cookie, "response": password});
    match client.request(&request) {
        Ok(reply) if reply_type(&reply) == "ok" => 0,
        Ok(reply) => {
            eprintln!("error: {reply}");
            1
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    }
}

/// `--cancel <cookie>`: cancel the session.
pub fn cancel(socket: &Path, cookie: &str) -> i32 {
    let client = IpcClient::new(socket);
    match client.request(&json!({"type": "session.cancel", "id": cookie})) {
        Ok(reply) if reply_type(&reply) == "ok" => 0,
        Ok(reply) => {
            eprintln!("error: {reply}");
            1
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    }
}
