// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyring prompter flow: deferred replies on the requesting socket.

use bb_auth_specs::{msg_type, TestDaemon};
use serde_json::json;

#[tokio::test]
async fn unlock_round_trip_delivers_password() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    let mut keyring = daemon.connect().await?;
    keyring
        .send(&json!({
            "type": "keyring_request",
            "cookie": "k-1",
            "title": "Unlock Login keyring",
            "message": "Enter the password to unlock Login keyring",
            "description": "An application wants access to the keyring",
        }))
        .await?;

    let created = sub.recv_until(|v| msg_type(v) == "session.created").await?;
    assert_eq!(created["source"], "keyring");
    assert_eq!(created["context"]["message"], "Unlock Login keyring");
    assert_eq!(
        created["context"]["description"],
        "An application wants access to the keyring"
    );

    let updated = sub.recv_until(|v| msg_type(v) == "session.updated").await?;
    assert_eq!(updated["prompt"], "Enter the password to unlock Login keyring");

    let mut responder = daemon.connect().await?;
    let reply = responder
        .request(&json!({"type": "session.respond", "id": "k-1", "response": "s3cret"}))
        .await?;
    assert_eq!(msg_type(&reply), "ok");

    // The requesting socket receives the deferred reply.
    let response = keyring.recv().await?;
    assert_eq!(msg_type(&response), "keyring_response");
    assert_eq!(response["id"], "k-1");
    assert_eq!(response["result"], "ok");
    assert_eq!(response["password"], "s3cret");

    let closed = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    assert_eq!(closed["result"], "success");
    Ok(())
}

#[tokio::test]
async fn confirm_only_requests_get_no_password() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;

    let mut keyring = daemon.connect().await?;
    keyring
        .send(&json!({
            "type": "keyring_request",
            "cookie": "k-2",
            "title": "Confirm access",
            "message": "Allow access to the stored secret?",
            "confirm_only": true,
        }))
        .await?;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut responder = daemon.connect().await?;
    let reply = responder
        .request(&json!({"type": "session.respond", "id": "k-2", "response": ""}))
        .await?;
    assert_eq!(msg_type(&reply), "ok");

    let response = keyring.recv().await?;
    assert_eq!(response["result"], "confirmed");
    assert!(response.get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn cancel_reports_back_to_the_requester() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    let mut keyring = daemon.connect().await?;
    keyring
        .send(&json!({
            "type": "keyring_request",
            "cookie": "k-3",
            "title": "Unlock",
            "message": "Password:",
        }))
        .await?;
    sub.recv_until(|v| msg_type(v) == "session.created").await?;

    let mut responder = daemon.connect().await?;
    let reply = responder.request(&json!({"type": "session.cancel", "id": "k-3"})).await?;
    assert_eq!(msg_type(&reply), "ok");

    let response = keyring.recv().await?;
    assert_eq!(response["result"], "cancelled");
    assert!(response.get("password").is_none());

    let closed = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    assert_eq!(closed["result"], "cancelled");
    Ok(())
}

#[tokio::test]
async fn requester_disconnect_cancels_its_sessions() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    let mut keyring = daemon.connect().await?;
    keyring
        .send(&json!({
            "type": "keyring_request",
            "cookie": "k-4",
            "title": "Unlock",
            "message": "Password:",
        }))
        .await?;
    sub.recv_until(|v| msg_type(v) == "session.created").await?;

    drop(keyring);

    let closed = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    assert_eq!(closed["id"], "k-4");
    assert_eq!(closed["result"], "cancelled");
    Ok(())
}

#[tokio::test]
async fn missing_and_duplicate_cookies_are_rejected() -> anyhow::Result<()> {
    let daemon = TestDaemon::start().await?;

    let mut keyring = daemon.connect().await?;
    let reply =
        keyring.request(&json!({"type": "keyring_request", "title": "No cookie"})).await?;
    assert_eq!(reply["error"], "missing_cookie");

    keyring
        .send(&json!({
            "type": "keyring_request",
            "cookie": "k-5",
            "title": "Unlock",
            "message": "Password:",
        }))
        .await?;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut second = daemon.connect().await?;
    let reply = second
        .request(&json!({
            "type": "keyring_request",
            "cookie": "k-5",
            "title": "Unlock again",
            "message": "Password:",
        }))
        .await?;
    assert_eq!(reply["error"], "duplicate_id");
    Ok(())
}
