// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PolicyKit session lifecycle: prompts, retries, cancellation, and the
//! display model for touch-style prompts.

use std::collections::HashMap;

use bb_auth::polkit::{PolkitCommand, PolkitEvent};
use bb_auth::prompt::{build_display_model, PromptIntent};
use bb_auth::protocol::{SessionContext, SessionSource};
use bb_auth_specs::{msg_type, TestDaemon};
use serde_json::json;

fn initiate(cookie: &str, action_id: &str, message: &str) -> PolkitEvent {
    PolkitEvent::Initiate {
        cookie: cookie.to_owned(),
        action_id: action_id.to_owned(),
        message: message.to_owned(),
        icon: None,
        details: HashMap::new(),
        user: Some("root".to_owned()),
    }
}

#[tokio::test]
async fn full_successful_authentication() -> anyhow::Result<()> {
    let mut daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    daemon
        .polkit
        .events
        .send(initiate("abc", "org.example.reboot", "Authentication is required"))
        .await?;

    let created = sub.recv_until(|v| msg_type(v) == "session.created").await?;
    assert_eq!(created["id"], "abc");
    assert_eq!(created["source"], "polkit");
    assert_eq!(created["context"]["actionId"], "org.example.reboot");
    assert_eq!(created["context"]["user"], "root");

    daemon
        .polkit
        .events
        .send(PolkitEvent::Prompt {
            cookie: "abc".to_owned(),
            prompt: "Password:".to_owned(),
            echo: false,
        })
        .await?;

    let updated = sub.recv_until(|v| msg_type(v) == "session.updated").await?;
    assert_eq!(updated["prompt"], "Password:");
    assert_eq!(updated["echo"], false);

    // No providers are connected, so a plain socket may respond.
    let mut responder = daemon.connect().await?;
    let reply = responder
        .request(&json!({"type": "session.respond", "id": "abc", "response": "hunter2"}))
        .await?;
    assert_eq!(msg_type(&reply), "ok");

    assert_eq!(
        daemon.next_command().await?,
        PolkitCommand::SubmitResponse { cookie: "abc".to_owned(), response: "hunter2".to_owned() }
    );

    daemon
        .polkit
        .events
        .send(PolkitEvent::Completed { cookie: "abc".to_owned(), gained_authorization: true })
        .await?;

    let closed = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    assert_eq!(closed["result"], "success");
    assert!(closed.get("error").is_none());

    assert_eq!(daemon.next_command().await?, PolkitCommand::Complete { cookie: "abc".to_owned() });
    Ok(())
}

#[tokio::test]
async fn duplicate_cookie_is_rejected() -> anyhow::Result<()> {
    let mut daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    daemon.polkit.events.send(initiate("abc", "org.example.a", "First")).await?;
    sub.recv_until(|v| msg_type(v) == "session.created").await?;

    daemon.polkit.events.send(initiate("abc", "org.example.b", "Second")).await?;
    assert_eq!(
        daemon.next_command().await?,
        PolkitCommand::InitiateError {
            cookie: "abc".to_owned(),
            error: "Duplicate session".to_owned()
        }
    );

    // The store still holds exactly one session for that cookie.
    let mut observer = daemon.connect().await?;
    observer.send(&json!({"type": "subscribe"})).await?;
    observer.recv().await?; // subscribed
    let backfill = observer.recv().await?;
    assert_eq!(msg_type(&backfill), "session.created");
    assert_eq!(backfill["context"]["message"], "First");
    Ok(())
}

#[tokio::test]
async fn failures_retry_until_the_bound_then_fail_terminally() -> anyhow::Result<()> {
    let mut daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    daemon.polkit.events.send(initiate("abc", "org.example.a", "Authenticate")).await?;
    sub.recv_until(|v| msg_type(v) == "session.created").await?;

    let mut responder = daemon.connect().await?;

    for attempt in 1..=3u32 {
        daemon
            .polkit
            .events
            .send(PolkitEvent::Prompt {
                cookie: "abc".to_owned(),
                prompt: "Password:".to_owned(),
                echo: false,
            })
            .await?;
        sub.recv_until(|v| msg_type(v) == "session.updated" && v.get("prompt").is_some())
            .await?;

        let reply = responder
            .request(&json!({"type": "session.respond", "id": "abc", "response": "wrong"}))
            .await?;
        assert_eq!(msg_type(&reply), "ok");
        assert!(matches!(daemon.next_command().await?, PolkitCommand::SubmitResponse { .. }));

        daemon
            .polkit
            .events
            .send(PolkitEvent::Completed { cookie: "abc".to_owned(), gained_authorization: false })
            .await?;

        let updated = sub
            .recv_until(|v| msg_type(v) == "session.updated" && v.get("curRetry").is_some())
            .await?;
        assert_eq!(updated["error"], "Authentication failed");
        assert_eq!(updated["curRetry"], attempt);
        assert_eq!(updated["maxRetries"], 3);

        if attempt < 3 {
            assert_eq!(
                daemon.next_command().await?,
                PolkitCommand::Reattempt { cookie: "abc".to_owned() }
            );
        }
    }

    // Reaching the bound fails the current attempt immediately.
    let closed = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    assert_eq!(closed["result"], "error");
    assert_eq!(closed["error"], "Too many failed attempts");
    assert_eq!(daemon.next_command().await?, PolkitCommand::Complete { cookie: "abc".to_owned() });
    Ok(())
}

#[tokio::test]
async fn provider_cancel_aborts_the_backend() -> anyhow::Result<()> {
    let mut daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    daemon.polkit.events.send(initiate("abc", "org.example.a", "Authenticate")).await?;
    sub.recv_until(|v| msg_type(v) == "session.created").await?;

    let mut responder = daemon.connect().await?;
    let reply = responder.request(&json!({"type": "session.cancel", "id": "abc"})).await?;
    assert_eq!(msg_type(&reply), "ok");

    assert_eq!(daemon.next_command().await?, PolkitCommand::Cancel { cookie: "abc".to_owned() });
    assert_eq!(daemon.next_command().await?, PolkitCommand::Complete { cookie: "abc".to_owned() });

    let closed = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    assert_eq!(closed["result"], "cancelled");
    Ok(())
}

#[tokio::test]
async fn cancel_all_closes_every_polkit_session() -> anyhow::Result<()> {
    let mut daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    daemon.polkit.events.send(initiate("s1", "org.example.a", "One")).await?;
    daemon.polkit.events.send(initiate("s2", "org.example.b", "Two")).await?;
    sub.recv_until(|v| msg_type(v) == "session.created").await?;
    sub.recv_until(|v| msg_type(v) == "session.created").await?;

    daemon.polkit.events.send(PolkitEvent::CancelAll).await?;

    let first = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    let second = sub.recv_until(|v| msg_type(v) == "session.closed").await?;
    assert_eq!(first["result"], "cancelled");
    assert_eq!(second["result"], "cancelled");

    assert!(matches!(daemon.next_command().await?, PolkitCommand::Complete { .. }));
    assert!(matches!(daemon.next_command().await?, PolkitCommand::Complete { .. }));
    Ok(())
}

#[tokio::test]
async fn fingerprint_cue_produces_touch_display_model() -> anyhow::Result<()> {
    let mut daemon = TestDaemon::start().await?;
    let mut sub = daemon.connect().await?;
    sub.request(&json!({"type": "subscribe"})).await?;

    daemon
        .polkit
        .events
        .send(initiate(
            "fp",
            "org.freedesktop.packagekit.system-update",
            "Authentication is required",
        ))
        .await?;
    let created = sub.recv_until(|v| msg_type(v) == "session.created").await?;

    daemon
        .polkit
        .events
        .send(PolkitEvent::ShowInfo {
            cookie: "fp".to_owned(),
            text: "Swipe your fingerprint sensor".to_owned(),
        })
        .await?;
    let updated = sub.recv_until(|v| msg_type(v) == "session.updated").await?;
    let info = updated["info"].as_str().unwrap_or_default().to_owned();
    assert_eq!(info, "Swipe your fingerprint sensor");

    // Render exactly as a provider would.
    let context: SessionContext = serde_json::from_value(created["context"].clone())?;
    let model = build_display_model(SessionSource::Polkit, &context, Some(&info), None);

    assert_eq!(model.intent, PromptIntent::Fingerprint);
    assert_eq!(model.prompt, "Press Enter to continue (or wait)");
    assert!(model.allow_empty_response);
    assert_eq!(model.summary, "System Update");
    Ok(())
}
