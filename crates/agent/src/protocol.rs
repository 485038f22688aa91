// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the control socket.
//!
//! One JSON object per line, tagged by `type`. Inbound lines are parsed in
//! two steps so the transport errors (`Invalid JSON`, `Missing type field`,
//! `Unknown type`) stay distinguishable from field-level mismatches.

use serde::{Deserialize, Serialize};

/// Identifier for a connected IPC socket, assigned at accept time.
pub type ConnId = u64;

fn is_false(value: &bool) -> bool {
    !*value
}

// -- Session vocabulary --------------------------------------------------------

/// Which subsystem originated a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    Polkit,
    Keyring,
    Pinentry,
}

impl SessionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Polkit => "polkit",
            Self::Keyring => "keyring",
            Self::Pinentry => "pinentry",
        }
    }
}

/// Terminal outcome carried by `session.closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionResult {
    Success,
    Cancelled,
    Error,
}

/// Result carried by `keyring_response` / `pinentry_response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyResult {
    Ok,
    Confirmed,
    Cancelled,
}

/// Terminal result reported by the pinentry adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinTerminal {
    Success,
    Error,
    Retry,
    Cancelled,
}

// -- Requestor / context -------------------------------------------------------

/// Trust-attributed identity of the process behind a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requestor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmdline: Option<String>,
    #[serde(rename = "desktopId", default, skip_serializing_if = "Option::is_none")]
    pub desktop_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(rename = "fallbackLetter", default, skip_serializing_if = "String::is_empty")]
    pub fallback_letter: String,
    #[serde(rename = "fallbackKey", default, skip_serializing_if = "String::is_empty")]
    pub fallback_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub confidence: String,
}

/// Immutable context captured when a session is created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub requestor: Requestor,
    #[serde(rename = "actionId", default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(rename = "keyringName", default, skip_serializing_if = "Option::is_none")]
    pub keyring_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyinfo: Option<String>,
    #[serde(rename = "confirmOnly", default, skip_serializing_if = "is_false")]
    pub confirm_only: bool,
    #[serde(rename = "passwordNew", default, skip_serializing_if = "is_false")]
    pub password_new: bool,
}

// -- Client → daemon -----------------------------------------------------------

/// Messages accepted from any connected socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Ping,
    Next,
    Subscribe,
    #[serde(rename = "ui.register")]
    UiRegister {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        kind: Option<String>,
        #[serde(default)]
        priority: Option<i32>,
    },
    #[serde(rename = "ui.heartbeat")]
    UiHeartbeat {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "session.respond")]
    SessionRespond {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        response: Option<String>,
    },
    #[serde(rename = "session.cancel")]
    SessionCancel {
        #[serde(default)]
        id: Option<String>,
    },
    KeyringRequest {
        #[serde(default)]
        cookie: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        password_new: bool,
        #[serde(default)]
        confirm_only: bool,
    },
    PinentryRequest {
        #[serde(default)]
        cookie: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        prompt: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        repeat: bool,
        #[serde(default)]
        keyinfo: Option<String>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        confirm_only: bool,
    },
    PinentryResult {
        #[serde(default)]
        cookie: Option<String>,
        result: PinTerminal,
        #[serde(default)]
        error: Option<String>,
    },
}

const KNOWN_TYPES: &[&str] = &[
    "ping",
    "next",
    "subscribe",
    "ui.register",
    "ui.heartbeat",
    "session.respond",
    "session.cancel",
    "keyring_request",
    "pinentry_request",
    "pinentry_result",
];

/// How an inbound line failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    InvalidJson,
    MissingType,
    UnknownType,
}

impl LineError {
    /// The exact reply text for this transport error.
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidJson => "Invalid JSON",
            Self::MissingType => "Missing type field",
            Self::UnknownType => "Unknown type",
        }
    }
}

/// Parse one inbound line into a [`ClientRequest`].
pub fn parse_client_line(line: &str) -> Result<ClientRequest, LineError> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|_| LineError::InvalidJson)?;
    let obj = value.as_object().ok_or(LineError::InvalidJson)?;
    let ty = obj
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(LineError::MissingType)?;
    if !KNOWN_TYPES.contains(&ty) {
        return Err(LineError::UnknownType);
    }
    serde_json::from_value(value).map_err(|_| LineError::InvalidJson)
}

// -- Daemon → client -----------------------------------------------------------

/// Messages emitted by the daemon, as replies or fan-out events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonEvent {
    Pong,
    Ok,
    Empty,
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Subscribed {
        active: bool,
    },
    #[serde(rename = "ui.registered")]
    UiRegistered {
        id: String,
        active: bool,
    },
    #[serde(rename = "ui.active")]
    UiActive {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        active: bool,
    },
    #[serde(rename = "session.created")]
    SessionCreated {
        id: String,
        source: SessionSource,
        context: SessionContext,
    },
    #[serde(rename = "session.updated")]
    SessionUpdated {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        echo: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<String>,
        #[serde(rename = "curRetry", default, skip_serializing_if = "Option::is_none")]
        cur_retry: Option<u32>,
        #[serde(rename = "maxRetries", default, skip_serializing_if = "Option::is_none")]
        max_retries: Option<u32>,
    },
    #[serde(rename = "session.closed")]
    SessionClosed {
        id: String,
        result: SessionResult,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    KeyringResponse {
        id: String,
        result: ReplyResult,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    PinentryResponse {
        id: String,
        result: ReplyResult,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
}

impl DaemonEvent {
    /// Transport or routing error carried as human-readable text.
    pub fn error_message(message: impl Into<String>) -> Self {
        Self::Error { message: Some(message.into()), error: None }
    }

    /// Routing error carried as a machine-readable code.
    pub fn error_code(code: RequestError) -> Self {
        Self::Error { message: None, error: Some(code.as_str().to_owned()) }
    }

    /// Serialize to a single wire line (without the trailing newline).
    pub fn to_line(&self) -> String {
        // Serialization of these enums cannot fail; fall back to a bare
        // error object to keep the one-reply-per-request contract.
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","message":"Internal error"}"#.to_owned())
    }
}

/// Machine-readable routing error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    InvalidCookie,
    MissingId,
    MissingCookie,
    DuplicateId,
    UnknownProvider,
}

impl RequestError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCookie => "invalid_cookie",
            Self::MissingId => "missing_id",
            Self::MissingCookie => "missing_cookie",
            Self::DuplicateId => "duplicate_id",
            Self::UnknownProvider => "unknown_provider",
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
