// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol limits and timing constants shared across the workspace.

use std::time::Duration;

/// Hard cap for a single buffered-but-unterminated IPC frame.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

pub const IPC_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);
pub const IPC_READ_TIMEOUT: Duration = Duration::from_millis(1000);
pub const IPC_WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// End-to-end wait for a `pinentry_response` after posting a request.
pub const PINENTRY_REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Wait for the terminal result report after a submit.
pub const PINENTRY_RESULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failed authentication attempts allowed before a session is failed.
pub const MAX_AUTH_RETRIES: u32 = 3;

/// Expected provider heartbeat cadence; the sweep timer runs at this rate.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// A provider silent for this long is evicted from the registry.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(15);

/// Current epoch millis, used for heartbeat and launch back-off bookkeeping.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
