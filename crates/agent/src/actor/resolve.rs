// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ancestry walk from a subject pid to the responsible application.

use std::collections::HashMap;
use std::path::Path;

use super::desktop::{DesktopEntry, DesktopIndex};
use super::proc::{ProcInfo, ProcSource};
use crate::protocol::Requestor;

/// Ancestry hops examined before giving up.
const MAX_ANCESTRY_HOPS: usize = 16;

/// Programs allowed to span a uid boundary during the walk.
const BRIDGE_NAMES: &[&str] = &["pkexec", "sudo", "doas"];

/// Directories a genuine setuid launcher binary lives in. A binary named
/// `pkexec` anywhere else does not qualify.
const BRIDGE_DIRS: &[&str] =
    &["/usr/bin", "/usr/sbin", "/usr/local/bin", "/bin", "/sbin", "/run/wrappers/bin"];

/// How strongly the resolved identity is attested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Desktop,
    ExeOnly,
    Unknown,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::ExeOnly => "exe-only",
            Self::Unknown => "unknown",
        }
    }
}

/// Trust-attributed identity of the process behind a request.
#[derive(Debug, Clone)]
pub struct ActorInfo {
    pub proc: ProcInfo,
    pub desktop: Option<DesktopEntry>,
    pub display_name: String,
    pub fallback_letter: String,
    pub fallback_key: String,
    pub confidence: Confidence,
}

impl ActorInfo {
    /// Wire shape used in session contexts.
    pub fn to_requestor(&self) -> Requestor {
        Requestor {
            name: self.display_name.clone(),
            pid: (self.proc.pid > 0).then_some(self.proc.pid),
            uid: (self.proc.pid > 0).then_some(self.proc.uid),
            exe: self.proc.exe.as_ref().map(|p| p.to_string_lossy().into_owned()),
            cmdline: (!self.proc.cmdline.is_empty()).then(|| self.proc.cmdline.clone()),
            desktop_id: self.desktop.as_ref().map(|d| d.desktop_id.clone()),
            icon: self.desktop.as_ref().and_then(|d| d.icon.clone()),
            fallback_letter: self.fallback_letter.clone(),
            fallback_key: self.fallback_key.clone(),
            confidence: self.confidence.as_str().to_owned(),
        }
    }

    /// Placeholder actor for requests with no resolvable subject process.
    pub fn unknown() -> Self {
        Self {
            proc: ProcInfo::default(),
            desktop: None,
            display_name: "Unknown".to_owned(),
            fallback_letter: "U".to_owned(),
            fallback_key: "unknown".to_owned(),
            confidence: Confidence::Unknown,
        }
    }
}

/// Pull the subject pid out of the polkit details map.
pub fn extract_subject_pid(details: &HashMap<String, String>) -> Option<i32> {
    let raw = details
        .get("polkit.subject-pid")
        .filter(|v| !v.is_empty())
        .or_else(|| details.get("polkit.caller-pid"))?;
    raw.trim().parse::<i32>().ok().filter(|pid| *pid > 0)
}

/// Whether the process is a genuine uid-crossing bridge.
///
/// A readable exe must resolve to a known launcher in a system binary
/// directory. An unreadable exe qualifies only for a root-euid process whose
/// kernel name matches a launcher; a process that merely claims a launcher
/// name has neither hallmark and is not a bridge.
fn is_bridge(info: &ProcInfo) -> bool {
    match &info.exe {
        Some(exe) => {
            let base = exe.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if !BRIDGE_NAMES.contains(&base) {
                return false;
            }
            exe.parent()
                .is_some_and(|dir| BRIDGE_DIRS.iter().any(|d| Path::new(d) == dir))
        }
        None => info.euid == 0 && BRIDGE_NAMES.contains(&info.name.as_str()),
    }
}

/// Walk the ancestry of `subject` and return the best attribution.
///
/// The walk halts at a uid boundary unless the boundary process is a proven
/// bridge, stops at init or a ppid self-loop, and ends early on a desktop
/// entry match. When the subject itself is a bridge, the first non-bridge
/// ancestor becomes the actor even without a desktop match.
pub fn resolve_requestor(
    subject: &ProcInfo,
    daemon_uid: u32,
    procs: &dyn ProcSource,
    desktop: &DesktopIndex,
) -> ActorInfo {
    let mut best = subject.clone();
    let mut matched: Option<DesktopEntry> = None;

    let mut current_pid = subject.pid;
    for _ in 0..MAX_ANCESTRY_HOPS {
        let Some(info) = procs.read(current_pid) else {
            break;
        };

        if info.uid != daemon_uid && !is_bridge(&info) {
            break;
        }

        let exe_base = info
            .exe
            .as_deref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if let Some(entry) = desktop.find_for_exe(exe_base) {
            matched = Some(entry.clone());
            best = info;
            break;
        }

        if is_bridge(&best) && !is_bridge(&info) {
            best = info.clone();
        }

        if info.ppid <= 1 || info.ppid == info.pid {
            break;
        }
        current_pid = info.ppid;
    }

    let confidence = if matched.is_some() {
        Confidence::Desktop
    } else if best.exe.is_some() {
        Confidence::ExeOnly
    } else {
        Confidence::Unknown
    };

    let display_name = match (&matched, &best.exe) {
        (Some(entry), _) => entry.name.clone(),
        (None, Some(exe)) => exe
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .unwrap_or_else(|| "Unknown".to_owned()),
        (None, None) => "Unknown".to_owned(),
    };

    let fallback_letter = display_name
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_default();
    let fallback_key = match &matched {
        Some(entry) => entry.desktop_id.clone(),
        None => display_name.to_lowercase(),
    };

    ActorInfo {
        proc: best,
        desktop: matched,
        display_name,
        fallback_letter,
        fallback_key,
        confidence,
    }
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
