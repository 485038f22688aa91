// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of connected UI providers and active-provider arbitration.

use indexmap::IndexMap;

use crate::limits::epoch_ms;
use crate::protocol::ConnId;

/// A connected UI provider.
#[derive(Debug, Clone)]
pub struct Provider {
    pub id: String,
    pub conn: ConnId,
    pub name: String,
    pub kind: String,
    pub priority: i32,
    /// Registration order, used to break priority ties.
    pub seq: u64,
    pub last_heartbeat_ms: u64,
}

/// Outcome of an active-provider election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveChange {
    pub previous: Option<ConnId>,
    pub current: Option<ConnId>,
}

impl ActiveChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

fn default_priority(kind: &str) -> i32 {
    match kind {
        "quickshell" => 100,
        "custom" => 50,
        "fallback" => 10,
        _ => 50,
    }
}

type NowFn = Box<dyn Fn() -> u64 + Send>;

/// Tracks connected providers; at most one is active at a time.
pub struct ProviderRegistry {
    providers: IndexMap<ConnId, Provider>,
    active: Option<ConnId>,
    next_seq: u64,
    now_fn: NowFn,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::with_clock(Box::new(epoch_ms))
    }

    /// Injectable clock for heartbeat tests.
    pub fn with_clock(now_fn: NowFn) -> Self {
        Self { providers: IndexMap::new(), active: None, next_seq: 0, now_fn }
    }

    /// Register the socket as a provider, applying kind-based defaults.
    /// Re-registering an existing socket replaces its record but keeps the
    /// original registration order.
    pub fn register(
        &mut self,
        conn: ConnId,
        name: Option<String>,
        kind: Option<String>,
        priority: Option<i32>,
    ) -> Provider {
        let now = (self.now_fn)();
        let kind = kind.unwrap_or_else(|| "unknown".to_owned());
        let seq = match self.providers.get(&conn) {
            Some(existing) => existing.seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        let provider = Provider {
            id: format!("provider-{seq}"),
            conn,
            name: name.unwrap_or_else(|| "unknown".to_owned()),
            priority: priority.unwrap_or_else(|| default_priority(&kind)),
            kind,
            seq,
            last_heartbeat_ms: now,
        };
        self.providers.insert(conn, provider.clone());
        provider
    }

    pub fn unregister_conn(&mut self, conn: ConnId) -> Option<Provider> {
        self.providers.shift_remove(&conn)
    }

    pub fn get(&self, conn: ConnId) -> Option<&Provider> {
        self.providers.get(&conn)
    }

    pub fn find_by_id(&self, provider_id: &str) -> Option<&Provider> {
        self.providers.values().find(|p| p.id == provider_id)
    }

    /// Refresh liveness for the provider with the given id.
    pub fn heartbeat(&mut self, provider_id: &str) -> bool {
        let now = (self.now_fn)();
        match self.providers.values_mut().find(|p| p.id == provider_id) {
            Some(provider) => {
                provider.last_heartbeat_ms = now;
                true
            }
            None => false,
        }
    }

    /// Remove providers whose last heartbeat is older than `timeout_ms`.
    pub fn evict_stale(&mut self, timeout_ms: u64) -> Vec<Provider> {
        let now = (self.now_fn)();
        let stale: Vec<ConnId> = self
            .providers
            .values()
            .filter(|p| now.saturating_sub(p.last_heartbeat_ms) > timeout_ms)
            .map(|p| p.conn)
            .collect();
        stale.iter().filter_map(|conn| self.providers.shift_remove(conn)).collect()
    }

    /// Re-run the election: highest priority wins, ties go to the earliest
    /// registration. Returns the transition so the caller can notify both
    /// sides.
    pub fn recompute_active(&mut self) -> ActiveChange {
        let previous = self.active;
        let current = self
            .providers
            .values()
            .max_by(|a, b| a.priority.cmp(&b.priority).then(b.seq.cmp(&a.seq)))
            .map(|p| p.conn);
        self.active = current;
        ActiveChange { previous, current }
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_conn(&self) -> Option<ConnId> {
        self.active
    }

    pub fn active_provider(&self) -> Option<&Provider> {
        self.active.and_then(|conn| self.providers.get(&conn))
    }

    /// Whether the socket may act on sessions. An unregistered socket is
    /// authorised only while no provider is connected (bootstrap mode for
    /// keyring and pinentry clients).
    pub fn is_authorized(&self, conn: ConnId) -> bool {
        if self.providers.is_empty() {
            return true;
        }
        self.active == Some(conn)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
