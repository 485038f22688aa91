// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session records and the store that owns every in-flight prompt.
//!
//! Sessions are value records mutated only by the daemon core; subsystem
//! callbacks are reached through a [`SubsystemHandle`] re-resolved at
//! delivery time, never through a back-pointer.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use crate::limits::MAX_AUTH_RETRIES;
use crate::protocol::{ConnId, DaemonEvent, SessionContext, SessionResult, SessionSource};

/// Where the final result of a session must be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsystemHandle {
    /// Completion flows back through the polkit command channel.
    Polkit,
    /// The keyring shim socket held open for `keyring_response`.
    Keyring { conn: ConnId },
    /// The pinentry adapter socket awaiting `pinentry_response`, if any.
    Pinentry { conn: Option<ConnId> },
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Created,
    Prompting,
    Awaiting,
    Terminal(SessionResult),
}

/// One in-flight prompt.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub source: SessionSource,
    pub context: SessionContext,
    pub phase: SessionPhase,
    pub prompt: Option<String>,
    pub echo: bool,
    pub info: Option<String>,
    pub error: Option<String>,
    pub retries: u32,
    pub created_at: Instant,
    pub handle: SubsystemHandle,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        source: SessionSource,
        context: SessionContext,
        handle: SubsystemHandle,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            context,
            phase: SessionPhase::Created,
            prompt: None,
            echo: false,
            info: None,
            error: None,
            retries: 0,
            created_at: Instant::now(),
            handle,
        }
    }

    /// Set a new prompt and enter `Prompting`. Stale info is dropped so a
    /// provider never renders instructions from the previous cycle.
    pub fn set_prompt(&mut self, prompt: impl Into<String>, echo: bool) {
        self.prompt = Some(prompt.into());
        self.echo = echo;
        self.info = None;
        self.phase = SessionPhase::Prompting;
    }

    pub fn set_info(&mut self, info: impl Into<String>) {
        self.info = Some(info.into());
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, SessionPhase::Terminal(_))
    }

    /// Bump the retry counter. Returns `false` once the bound is reached,
    /// at which point the caller must fail the session immediately.
    pub fn bump_retry(&mut self) -> bool {
        self.retries += 1;
        self.retries < MAX_AUTH_RETRIES
    }

    pub fn to_created_event(&self) -> DaemonEvent {
        DaemonEvent::SessionCreated {
            id: self.id.clone(),
            source: self.source,
            context: self.context.clone(),
        }
    }

    /// Snapshot the mutable prompt state as a `session.updated` event.
    pub fn to_updated_event(&self) -> DaemonEvent {
        let (cur_retry, max_retries) = if self.retries > 0 {
            (Some(self.retries), Some(MAX_AUTH_RETRIES))
        } else {
            (None, None)
        };
        DaemonEvent::SessionUpdated {
            id: self.id.clone(),
            prompt: self.prompt.clone(),
            echo: self.prompt.as_ref().map(|_| self.echo),
            error: self.error.clone(),
            info: self.info.clone(),
            cur_retry,
            max_retries,
        }
    }

    pub fn to_closed_event(&self, result: SessionResult, error: Option<String>) -> DaemonEvent {
        DaemonEvent::SessionClosed { id: self.id.clone(), result, error }
    }
}

/// A session id collided with a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateId(pub String);

impl fmt::Display for DuplicateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate session id: {}", self.0)
    }
}

impl std::error::Error for DuplicateId {}

/// Canonical owner of all in-flight sessions.
#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new session. Ids are unique across all sources.
    pub fn create(
        &mut self,
        id: impl Into<String>,
        source: SessionSource,
        context: SessionContext,
        handle: SubsystemHandle,
    ) -> Result<&mut Session, DuplicateId> {
        let id = id.into();
        if self.sessions.contains_key(&id) {
            return Err(DuplicateId(id));
        }
        let session = Session::new(id.clone(), source, context, handle);
        Ok(self.sessions.entry(id).or_insert(session))
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Atomic mutation of a single session; no-op when the id is unknown.
    pub fn update(&mut self, id: &str, mutate: impl FnOnce(&mut Session)) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                mutate(session);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Whether any session is still waiting for a user decision.
    pub fn has_pending(&self) -> bool {
        self.sessions.values().any(|s| !s.is_terminal())
    }

    /// Ids of sessions whose subsystem socket matches `conn`.
    pub fn ids_for_conn(&self, conn: ConnId) -> Vec<String> {
        self.sessions
            .values()
            .filter(|s| match s.handle {
                SubsystemHandle::Keyring { conn: c } => c == conn,
                SubsystemHandle::Pinentry { conn: Some(c) } => c == conn,
                _ => false,
            })
            .map(|s| s.id.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
