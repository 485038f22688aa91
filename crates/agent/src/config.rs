// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI configuration and environment knobs.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::daemon::DaemonOptions;

/// Floor for the fallback UI idle auto-exit.
const FALLBACK_IDLE_MIN_MS: u64 = 5000;
const FALLBACK_IDLE_DEFAULT_MS: u64 = 30_000;

const ACTION_TIMEOUT_MIN_MS: u64 = 250;
const ACTION_TIMEOUT_MAX_MS: u64 = 120_000;
const ACTION_TIMEOUT_DEFAULT_MS: u64 = 12_000;

#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Override the control socket path.
    #[arg(long, env = "BB_AUTH_SOCKET")]
    pub socket: Option<PathBuf>,

    /// System directory scanned last for provider manifests.
    #[arg(
        long,
        default_value = "/usr/share/bb-auth/providers.d",
        env = "BB_AUTH_SYSTEM_PROVIDER_DIR"
    )]
    pub system_provider_dir: PathBuf,

    /// Fallback UI binary used when no manifest candidate is launchable.
    #[arg(long, env = "BB_AUTH_DEFAULT_FALLBACK")]
    pub fallback_bin: Option<PathBuf>,

    /// Log level filter.
    #[arg(long, default_value = "info", env = "BB_AUTH_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format: plain or json.
    #[arg(long, default_value = "plain", env = "BB_AUTH_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    pub fn socket_path(&self) -> PathBuf {
        self.socket.clone().unwrap_or_else(crate::paths::default_socket_path)
    }

    pub fn daemon_options(&self) -> DaemonOptions {
        DaemonOptions {
            socket_path: self.socket_path(),
            system_provider_dir: self.system_provider_dir.clone(),
            default_fallback: self.fallback_bin.clone(),
        }
    }

    /// Initialize tracing from config. `try_init` so tests can call it
    /// repeatedly.
    pub fn init_tracing(&self) {
        // Priority: --log-level / BB_AUTH_LOG_LEVEL > RUST_LOG > "info".
        let filter = if std::env::var("BB_AUTH_LOG_LEVEL").is_err() && self.log_level == "info" {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&self.log_level))
        } else {
            EnvFilter::try_new(&self.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
        };

        let result = match self.log_format.as_str() {
            "json" => tracing_subscriber::fmt().with_env_filter(filter).json().try_init(),
            _ => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        };
        drop(result);
    }
}

/// Legacy provider override honoured ahead of manifest discovery.
pub fn legacy_fallback_path() -> Option<PathBuf> {
    std::env::var_os("BB_AUTH_FALLBACK_PATH").filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn env_ms(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse::<u64>().ok()
}

/// Idle auto-exit for fallback UIs, floored at 5 s.
pub fn fallback_idle_ms() -> u64 {
    env_ms("BB_AUTH_FALLBACK_IDLE_MS")
        .unwrap_or(FALLBACK_IDLE_DEFAULT_MS)
        .max(FALLBACK_IDLE_MIN_MS)
}

/// UI action watchdog, clamped to [250 ms, 120 s].
pub fn fallback_action_timeout_ms() -> u64 {
    env_ms("BB_AUTH_FALLBACK_ACTION_TIMEOUT_MS")
        .unwrap_or(ACTION_TIMEOUT_DEFAULT_MS)
        .clamp(ACTION_TIMEOUT_MIN_MS, ACTION_TIMEOUT_MAX_MS)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
