// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process information, read from `/proc` behind a fakeable seam.

use std::path::PathBuf;

/// Snapshot of one process as the resolver sees it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcInfo {
    pub pid: i32,
    pub ppid: i32,
    /// Real uid of the process owner.
    pub uid: u32,
    pub euid: u32,
    /// Kernel process name (`status` Name field), not trusted for identity.
    pub name: String,
    /// Resolved `exe` symlink; `None` when unreadable (setuid targets).
    pub exe: Option<PathBuf>,
    pub cmdline: String,
}

/// Source of process snapshots. Production reads procfs; tests fake it.
pub trait ProcSource {
    fn read(&self, pid: i32) -> Option<ProcInfo>;
}

/// Reads live process state via the `procfs` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcfsSource;

impl ProcSource for ProcfsSource {
    fn read(&self, pid: i32) -> Option<ProcInfo> {
        let process = procfs::process::Process::new(pid).ok()?;
        let status = process.status().ok()?;
        let cmdline = process.cmdline().ok().map(|args| args.join(" ")).unwrap_or_default();
        Some(ProcInfo {
            pid,
            ppid: status.ppid,
            uid: status.ruid,
            euid: status.euid,
            name: status.name,
            exe: process.exe().ok(),
            cmdline,
        })
    }
}
