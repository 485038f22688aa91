// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime paths: control socket and instance lock.

use std::path::{Path, PathBuf};

/// Default control socket path: `$XDG_RUNTIME_DIR/bb-auth.sock`.
///
/// Falls back to `/tmp/bb-auth-<uid>.sock` when no runtime directory is
/// available (e.g. under a bare login shell).
pub fn default_socket_path() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR").filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir).join("bb-auth.sock"),
        None => {
            let uid = nix::unistd::Uid::current();
            PathBuf::from(format!("/tmp/bb-auth-{uid}.sock"))
        }
    }
}

/// Lock file guarding against a second daemon instance on the same socket.
pub fn lock_path(socket: &Path) -> PathBuf {
    let mut os = socket.as_os_str().to_owned();
    os.push(".lock");
    PathBuf::from(os)
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
