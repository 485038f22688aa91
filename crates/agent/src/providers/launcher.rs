// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Candidate selection and detached spawning of UI providers, with
//! per-manifest exponential back-off.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use rand::Rng;
use tracing::warn;

use super::manifest::ProviderManifest;
use crate::limits::epoch_ms;

const BASE_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 5000;
const JITTER_MAX_MS: u64 = 120;

const LEGACY_ENV_ID: &str = "__legacy_env__";
const LEGACY_DEFAULT_ID: &str = "__legacy_default__";

/// Fully-resolved command for one launch attempt. `env` is an overlay on the
/// daemon's own environment.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// What a `try_launch` call did and why.
#[derive(Debug, Clone, Default)]
pub struct LaunchOutcome {
    pub attempted: bool,
    pub launched: bool,
    pub provider_id: Option<String>,
    pub executable: Option<PathBuf>,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct RetryState {
    failures: u32,
    next_eligible_ms: u64,
}

struct Candidate {
    id: String,
    display_name: String,
    command: LaunchCommand,
}

type NowFn = Box<dyn Fn() -> u64 + Send>;
type SpawnFn = Box<dyn FnMut(&LaunchCommand) -> bool + Send>;

/// Picks a provider candidate and spawns it detached, throttling repeated
/// failures per manifest id.
pub struct ProviderLauncher {
    retry_by_provider: std::collections::HashMap<String, RetryState>,
    now_fn: NowFn,
    spawn_fn: SpawnFn,
}

impl Default for ProviderLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderLauncher {
    pub fn new() -> Self {
        Self::with_hooks(Box::new(epoch_ms), Box::new(spawn_detached))
    }

    /// Injectable clock and spawner for tests.
    pub fn with_hooks(now_fn: NowFn, spawn_fn: SpawnFn) -> Self {
        Self { retry_by_provider: std::collections::HashMap::new(), now_fn, spawn_fn }
    }

    /// Attempt to launch a UI provider. Call whenever sessions are pending
    /// and no provider is active; the launcher re-checks both conditions so
    /// callers can invoke it unconditionally after state changes.
    #[allow(clippy::too_many_arguments)]
    pub fn try_launch(
        &mut self,
        manifests: &[ProviderManifest],
        socket_path: &Path,
        reason: &str,
        has_active_provider: bool,
        has_pending_sessions: bool,
        legacy_env_path: Option<&Path>,
        default_fallback_path: Option<&Path>,
    ) -> LaunchOutcome {
        let mut outcome = LaunchOutcome::default();

        if has_active_provider || !has_pending_sessions {
            outcome.detail = "skip: no launch required".to_owned();
            return outcome;
        }

        let candidate = match select_candidate(
            manifests,
            legacy_env_path,
            default_fallback_path,
            socket_path,
        ) {
            Ok(candidate) => candidate,
            Err(detail) => {
                outcome.detail = detail;
                return outcome;
            }
        };

        let now_ms = (self.now_fn)();
        outcome.provider_id = Some(candidate.id.clone());
        outcome.executable = Some(candidate.command.program.clone());

        if let Some(state) = self.retry_by_provider.get(&candidate.id) {
            if now_ms < state.next_eligible_ms {
                outcome.detail =
                    format!("skip: launch throttled until {}", state.next_eligible_ms);
                return outcome;
            }
        }

        outcome.attempted = true;

        if !(self.spawn_fn)(&candidate.command) {
            self.mark_failure(&candidate.id, now_ms);
            outcome.detail = format!("launch failed for '{}' ({reason})", candidate.display_name);
            return outcome;
        }

        self.retry_by_provider.remove(&candidate.id);
        outcome.launched = true;
        outcome.detail = format!("launched '{}' ({reason})", candidate.display_name);
        outcome
    }

    fn mark_failure(&mut self, id: &str, now_ms: u64) {
        let state = self.retry_by_provider.entry(id.to_owned()).or_default();
        state.failures += 1;
        state.next_eligible_ms = now_ms + compute_backoff_ms(state.failures);
    }
}

/// Back-off for the n-th consecutive failure: exponential from the base,
/// capped, plus a small uniform jitter.
fn compute_backoff_ms(failures: u32) -> u64 {
    let exp = BASE_BACKOFF_MS << failures.saturating_sub(1).min(8);
    let capped = exp.min(MAX_BACKOFF_MS);
    capped + rand::rng().random_range(0..=JITTER_MAX_MS)
}

fn select_candidate(
    manifests: &[ProviderManifest],
    legacy_env_path: Option<&Path>,
    default_fallback_path: Option<&Path>,
    socket_path: &Path,
) -> Result<Candidate, String> {
    let socket_args = |mut args: Vec<String>| {
        args.push("--socket".to_owned());
        args.push(socket_path.to_string_lossy().into_owned());
        args
    };

    if let Some(legacy) = legacy_env_path.filter(|p| !p.as_os_str().is_empty()) {
        if !is_executable_file(legacy) {
            return Err(format!(
                "skip: BB_AUTH_FALLBACK_PATH is not executable: {}",
                legacy.display()
            ));
        }
        return Ok(Candidate {
            id: LEGACY_ENV_ID.to_owned(),
            display_name: "legacy-env".to_owned(),
            command: LaunchCommand {
                program: legacy.to_path_buf(),
                args: socket_args(Vec::new()),
                env: Vec::new(),
            },
        });
    }

    let mut autostart: Vec<&ProviderManifest> =
        manifests.iter().filter(|m| m.autostart).collect();
    autostart.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

    for manifest in autostart {
        let Some(resolved) = resolve_executable(&manifest.exec) else {
            continue;
        };
        return Ok(Candidate {
            id: manifest.id.clone(),
            display_name: manifest.name.clone(),
            command: LaunchCommand {
                program: resolved,
                args: socket_args(manifest.args.clone()),
                env: manifest.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            },
        });
    }

    if let Some(fallback) = default_fallback_path.filter(|p| is_executable_file(p)) {
        return Ok(Candidate {
            id: LEGACY_DEFAULT_ID.to_owned(),
            display_name: "legacy-default".to_owned(),
            command: LaunchCommand {
                program: fallback.to_path_buf(),
                args: socket_args(Vec::new()),
                env: Vec::new(),
            },
        });
    }

    Err("skip: no launchable provider candidate".to_owned())
}

/// Absolute paths are used literally; bare names resolve through `PATH`.
fn resolve_executable(exec: &str) -> Option<PathBuf> {
    if exec.contains('/') {
        let path = PathBuf::from(exec);
        return is_executable_file(&path).then_some(path);
    }
    which::which(exec).ok()
}

fn is_executable_file(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Spawn the provider in its own session with stdio detached. The child is
/// handed to the runtime's orphan reaper, so it outlives the daemon's
/// awareness and never zombies while the daemon runs.
fn spawn_detached(command: &LaunchCommand) -> bool {
    let mut cmd = std::process::Command::new(&command.program);
    cmd.args(&command.args)
        .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    match tokio::process::Command::from(cmd).spawn() {
        Ok(child) => {
            drop(child);
            true
        }
        Err(error) => {
            warn!(program = %command.program.display(), %error, "provider spawn failed");
            false
        }
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
