// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel bridge to the PolicyKit agent glue.
//!
//! The DBus registration lives outside the daemon core; it feeds
//! [`PolkitEvent`]s in and consumes [`PolkitCommand`]s. Integration tests
//! drive the same channels directly.

use std::collections::HashMap;

use tokio::sync::mpsc;

/// Events produced by the PolicyKit authority for the daemon core.
#[derive(Debug, Clone)]
pub enum PolkitEvent {
    /// A new authentication session was initiated.
    Initiate {
        cookie: String,
        action_id: String,
        message: String,
        icon: Option<String>,
        details: HashMap<String, String>,
        user: Option<String>,
    },
    /// The backend asked for a credential with this prompt.
    Prompt { cookie: String, prompt: String, echo: bool },
    ShowError { cookie: String, text: String },
    ShowInfo { cookie: String, text: String },
    /// The attempt finished; `gained_authorization` is the verdict.
    Completed { cookie: String, gained_authorization: bool },
    /// The authority cancelled every outstanding session.
    CancelAll,
}

/// Commands the daemon core sends back to the agent glue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolkitCommand {
    /// Reject an `initiate` (duplicate cookie, bad identities).
    InitiateError { cookie: String, error: String },
    /// Forward the user's response to the backend session.
    SubmitResponse { cookie: String, response: String },
    /// Abort the backend session.
    Cancel { cookie: String },
    /// Start a fresh attempt for the same cookie after a failure.
    Reattempt { cookie: String },
    /// Mark the async result completed. Sent exactly once per session.
    Complete { cookie: String },
}

/// Daemon-core side of the bridge.
pub struct PolkitLink {
    pub events: mpsc::Receiver<PolkitEvent>,
    pub commands: mpsc::Sender<PolkitCommand>,
}

/// Glue side of the bridge.
pub struct PolkitAgentHandle {
    pub events: mpsc::Sender<PolkitEvent>,
    pub commands: mpsc::Receiver<PolkitCommand>,
}

/// Create a connected bridge pair.
pub fn polkit_link(capacity: usize) -> (PolkitLink, PolkitAgentHandle) {
    let (event_tx, event_rx) = mpsc::channel(capacity);
    let (command_tx, command_rx) = mpsc::channel(capacity);
    (
        PolkitLink { events: event_rx, commands: command_tx },
        PolkitAgentHandle { events: event_tx, commands: command_rx },
    )
}
