// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider registration, election, heartbeats, and the authorisation
//! boundary.

use bb_auth_specs::{msg_type, TestDaemon};
use serde_json::json;

#[tokio::test]
async fn register_assigns_defaults() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;
    let mut client = daemon.connect().await?;

    client.send(&json!({"type": "ui.register", "kind": "quickshell"})).await?;
    let registered = client.recv_until(|v| msg_type(v) == "ui.registered").await?;
    assert!(registered["active"].as_bool().unwrap_or(false));
    assert!(registered["id"].as_str().unwrap_or_default().starts_with("provider-"));
    Ok(())
}

#[tokio::test]
async fn election_walks_down_as_providers_disconnect() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;

    let mut low = daemon.connect().await?;
    low.send(&json!({"type": "ui.register", "name": "Low", "priority": 10})).await?;
    let reg = low.recv_until(|v| msg_type(v) == "ui.registered").await?;
    assert_eq!(reg["active"], true);

    let mut mid = daemon.connect().await?;
    mid.send(&json!({"type": "ui.register", "name": "Mid", "priority": 50})).await?;
    let reg = mid.recv_until(|v| msg_type(v) == "ui.registered").await?;
    assert_eq!(reg["active"], true);

    // The dethroned provider hears about it.
    let demoted = low.recv_until(|v| msg_type(v) == "ui.active").await?;
    assert_eq!(demoted["active"], false);

    let mut high = daemon.connect().await?;
    high.send(&json!({"type": "ui.register", "name": "High", "priority": 90})).await?;
    let reg = high.recv_until(|v| msg_type(v) == "ui.registered").await?;
    assert_eq!(reg["active"], true);

    let demoted = mid.recv_until(|v| msg_type(v) == "ui.active").await?;
    assert_eq!(demoted["active"], false);

    // 90 disconnects → 50 takes over.
    drop(high);
    let promoted = mid.recv_until(|v| msg_type(v) == "ui.active").await?;
    assert_eq!(promoted["active"], true);

    // 50 disconnects → 10 takes over.
    drop(mid);
    let promoted = low.recv_until(|v| msg_type(v) == "ui.active").await?;
    assert_eq!(promoted["active"], true);

    // 10 disconnects → nobody is active.
    drop(low);
    let mut observer = daemon.connect().await?;
    let subscribed = observer.request(&json!({"type": "subscribe"})).await?;
    assert_eq!(subscribed["active"], false);
    Ok(())
}

#[tokio::test]
async fn non_active_provider_cannot_act_on_sessions() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;

    let mut active = daemon.connect().await?;
    active.send(&json!({"type": "ui.register", "name": "High", "priority": 90})).await?;
    active.recv_until(|v| msg_type(v) == "ui.registered").await?;

    let mut low = daemon.connect().await?;
    low.send(&json!({"type": "ui.register", "name": "Low", "priority": 10})).await?;
    low.recv_until(|v| msg_type(v) == "ui.registered").await?;

    let reply = low
        .request(&json!({"type": "session.respond", "id": "x", "response": "pw"}))
        .await?;
    assert_eq!(msg_type(&reply), "error");
    assert_eq!(reply["message"], "Not active UI provider");

    // Unregistered sockets are rejected too while providers exist.
    let mut stranger = daemon.connect().await?;
    let reply = stranger.request(&json!({"type": "session.cancel", "id": "x"})).await?;
    assert_eq!(reply["message"], "Not active UI provider");

    // The active provider passes authorisation and hits the cookie check.
    let reply = active
        .request(&json!({"type": "session.respond", "id": "x", "response": "pw"}))
        .await?;
    assert_eq!(reply["error"], "invalid_cookie");
    Ok(())
}

#[tokio::test]
async fn bootstrap_mode_authorises_unregistered_sockets() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;
    let mut client = daemon.connect().await?;

    // No providers at all: the socket is authorised, the cookie is not.
    let reply = client.request(&json!({"type": "session.cancel", "id": "nope"})).await?;
    assert_eq!(reply["error"], "invalid_cookie");
    Ok(())
}

#[tokio::test]
async fn heartbeat_contract() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;
    let mut client = daemon.connect().await?;

    client.send(&json!({"type": "ui.register", "kind": "fallback"})).await?;
    let registered = client.recv_until(|v| msg_type(v) == "ui.registered").await?;
    let id = registered["id"].as_str().unwrap_or_default().to_owned();

    let reply = client.request(&json!({"type": "ui.heartbeat", "id": id})).await?;
    assert_eq!(msg_type(&reply), "ok");

    let reply = client.request(&json!({"type": "ui.heartbeat", "id": "provider-999"})).await?;
    assert_eq!(reply["error"], "unknown_provider");

    let reply = client.request(&json!({"type": "ui.heartbeat"})).await?;
    assert_eq!(reply["error"], "missing_id");
    Ok(())
}

#[tokio::test]
async fn subscribe_backfills_pending_sessions() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;

    let mut keyring = daemon.connect().await?;
    keyring
        .send(&json!({
            "type": "keyring_request",
            "cookie": "backfill-1",
            "title": "Unlock Login keyring",
            "message": "Enter the password",
        }))
        .await?;

    // Give the daemon a beat to create the session.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut subscriber = daemon.connect().await?;
    subscriber.send(&json!({"type": "subscribe"})).await?;

    let subscribed = subscriber.recv().await?;
    assert_eq!(msg_type(&subscribed), "subscribed");

    let created = subscriber.recv().await?;
    assert_eq!(msg_type(&created), "session.created");
    assert_eq!(created["id"], "backfill-1");
    assert_eq!(created["source"], "keyring");
    assert_eq!(created["context"]["message"], "Unlock Login keyring");

    let updated = subscriber.recv().await?;
    assert_eq!(msg_type(&updated), "session.updated");
    assert_eq!(updated["prompt"], "Enter the password");
    assert_eq!(updated["echo"], false);
    Ok(())
}
