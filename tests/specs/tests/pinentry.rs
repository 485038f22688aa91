// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pinentry session flow over the control socket, including retry cycles
//! and the real Assuan front-end driven end to end.

use std::io::Cursor;

use bb_auth_pinentry::session::{PinentrySession, SocketTransport};
use bb_auth_specs::{msg_type, TestDaemon};
use serde_json::json;

#[tokio::test]
async fn getpin_flow_with_deferred_response() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    let mut adapter = daemon.connect().await?;
    adapter
        .send(&json!({
            "type": "pinentry_request",
            "cookie": "p-1",
            "title": "GPG Key",
            "prompt": "Enter passphrase:",
            "description": "Unlock OpenPGP secret key",
        }))
        .await?;

    let created = sub.recv_until(|v| msg_type(v) == "session.created").await?;
    assert_eq!(created["source"], "pinentry");
    assert_eq!(created["context"]["message"], "GPG Key");

    let updated = sub.recv_until(|v| msg_type(v) == "session.updated").await?;
    assert_eq!(updated["prompt"], "Enter passphrase:");

    let mut responder = daemon.connect().await?;
    let reply = responder
        .request(&json!({"type": "session.respond", "id": "p-1", "response": "correct horse"}))
        .await?;
    assert_eq!(msg_type(&reply), "ok");

    // The adapter socket receives the deferred pinentry_response.
    let response = adapter.recv().await?;
    assert_eq!(msg_type(&response), "pinentry_response");
    assert_eq!(response["result"], "ok");
    assert_eq!(response["password"], "correct horse");

    // A second respond hits the one-response-per-cycle rule.
    let reply = responder
        .request(&json!({"type": "session.respond", "id": "p-1", "response": "again"}))
        .await?;
    assert_eq!(reply["error"], "invalid_cookie");

    // Terminal result arrives on a fresh connection.
    let mut reporter = daemon.connect().await?;
    let reply = reporter
        .request(&json!({"type": "pinentry_result", "cookie": "p-1", "result": "success"}))
        .await?;
    assert_eq!(msg_type(&reply), "ok");

    let closed = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    assert_eq!(closed["result"], "success");
    Ok(())
}

#[tokio::test]
async fn cancel_answers_the_waiting_adapter() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    let mut adapter = daemon.connect().await?;
    adapter
        .send(&json!({
            "type": "pinentry_request",
            "cookie": "p-2",
            "title": "GPG Key",
            "prompt": "Enter passphrase:",
        }))
        .await?;
    sub.recv_until(|v| msg_type(v) == "session.created").await?;

    let mut responder = daemon.connect().await?;
    let reply = responder.request(&json!({"type": "session.cancel", "id": "p-2"})).await?;
    assert_eq!(msg_type(&reply), "ok");

    let response = adapter.recv().await?;
    assert_eq!(msg_type(&response), "pinentry_response");
    assert_eq!(response["result"], "cancelled");

    let closed = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    assert_eq!(closed["result"], "cancelled");

    // The adapter still reports its terminal result on BYE; by then the
    // session is gone and the report is rejected without side effects.
    let mut reporter = daemon.connect().await?;
    let reply = reporter
        .request(&json!({"type": "pinentry_result", "cookie": "p-2", "result": "cancelled"}))
        .await?;
    assert_eq!(reply["error"], "invalid_cookie");
    Ok(())
}

#[tokio::test]
async fn retry_cycle_reuses_the_cookie() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    let mut adapter = daemon.connect().await?;
    adapter
        .send(&json!({
            "type": "pinentry_request",
            "cookie": "p-3",
            "title": "GPG Key",
            "prompt": "Enter passphrase:",
        }))
        .await?;
    sub.recv_until(|v| msg_type(v) == "session.updated").await?;

    let mut responder = daemon.connect().await?;
    responder
        .request(&json!({"type": "session.respond", "id": "p-3", "response": "wrong"}))
        .await?;
    let response = adapter.recv().await?;
    assert_eq!(response["result"], "ok");

    // GnuPG rejects the passphrase; the adapter reports a retry.
    let mut reporter = daemon.connect().await?;
    let reply = reporter
        .request(&json!({
            "type": "pinentry_result",
            "cookie": "p-3",
            "result": "retry",
            "error": "Bad passphrase",
        }))
        .await?;
    assert_eq!(msg_type(&reply), "ok");

    let updated = sub
        .recv_until(|v| msg_type(v) == "session.updated" && v.get("curRetry").is_some())
        .await?;
    assert_eq!(updated["error"], "Bad passphrase");
    assert_eq!(updated["curRetry"], 1);
    assert_eq!(updated["maxRetries"], 3);

    // The next GETPIN resumes the same cookie with a fresh prompt.
    let mut adapter2 = daemon.connect().await?;
    adapter2
        .send(&json!({
            "type": "pinentry_request",
            "cookie": "p-3",
            "title": "GPG Key",
            "prompt": "Enter passphrase:",
            "error": "Bad passphrase",
        }))
        .await?;

    let updated = sub
        .recv_until(|v| msg_type(v) == "session.updated" && v.get("prompt").is_some())
        .await?;
    assert_eq!(updated["prompt"], "Enter passphrase:");
    assert_eq!(updated["error"], "Bad passphrase");

    responder
        .request(&json!({"type": "session.respond", "id": "p-3", "response": "right"}))
        .await?;
    let response = adapter2.recv().await?;
    assert_eq!(response["result"], "ok");
    assert_eq!(response["password"], "right");

    let mut reporter = daemon.connect().await?;
    reporter
        .request(&json!({"type": "pinentry_result", "cookie": "p-3", "result": "success"}))
        .await?;

    let closed = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    assert_eq!(closed["result"], "success");
    Ok(())
}

#[tokio::test]
async fn confirm_only_session_confirms() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;

    let mut adapter = daemon.connect().await?;
    adapter
        .send(&json!({
            "type": "pinentry_request",
            "cookie": "p-4",
            "title": "Confirm",
            "prompt": "Really delete this key?",
            "confirm_only": true,
        }))
        .await?;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut responder = daemon.connect().await?;
    let reply = responder
        .request(&json!({"type": "session.respond", "id": "p-4", "response": ""}))
        .await?;
    assert_eq!(msg_type(&reply), "ok");

    let response = adapter.recv().await?;
    assert_eq!(response["result"], "confirmed");
    assert!(response.get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn assuan_front_end_round_trip() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    let socket = daemon.socket.clone();
    let front_end = tokio::task::spawn_blocking(move || {
        let input = "SETDESC Unlock OpenPGP secret key\nGETPIN\nBYE\n";
        let mut session = PinentrySession::new(
            Cursor::new(input.to_owned()),
            Vec::new(),
            SocketTransport::new(socket),
        );
        session.run()?;
        Ok::<String, anyhow::Error>(String::from_utf8(session.into_writer())?)
    });

    // Answer the session the way an active provider would.
    let created = sub.recv_until(|v| msg_type(v) == "session.created").await?;
    let cookie = created["id"].as_str().unwrap_or_default().to_owned();
    assert_eq!(created["source"], "pinentry");

    let mut responder = daemon.connect().await?;
    let reply = responder
        .request(&json!({"type": "session.respond", "id": cookie, "response": "tr0ub4dor"}))
        .await?;
    assert_eq!(msg_type(&reply), "ok");

    let output = front_end.await??;
    assert!(output.starts_with("OK BB Auth Pinentry\n"), "output: {output}");
    assert!(output.contains("D tr0ub4dor\n"), "output: {output}");

    // BYE reported the pending submit as success, closing the session.
    let closed = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    assert_eq!(closed["result"], "success");
    Ok(())
}
