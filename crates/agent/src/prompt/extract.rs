// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Extractors that pull a command name or unlock target out of free-form
//! prompt text.

use std::sync::LazyLock;

use regex::Regex;

use super::normalize::{normalize_compare_text, normalize_detail_text, unique_joined};
use crate::protocol::SessionContext;

#[allow(clippy::unwrap_used)]
static RUN_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\brun\s+['"`]([^'"`]+)['"`]"#).unwrap());

#[allow(clippy::unwrap_used)]
static ABS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(/[A-Za-z0-9_./+-]+)").unwrap());

#[allow(clippy::unwrap_used)]
static UNLOCK_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bunlock\s+(.+)$").unwrap());

/// Name of the command a polkit prompt asks to run: an explicitly quoted
/// `run '<cmd>'` phrase, else the basename of the first absolute path.
pub fn extract_command_name(message: &str) -> String {
    if let Some(captures) = RUN_QUOTED.captures(message) {
        return captures[1].trim().to_owned();
    }
    if let Some(captures) = ABS_PATH.captures(message) {
        let path = captures[1].trim_end_matches('/');
        return path.rsplit('/').next().unwrap_or_default().to_owned();
    }
    String::new()
}

/// Target following an "unlock" phrase, trailing period stripped.
pub fn extract_unlock_target(text: &str) -> String {
    let normalized = normalize_detail_text(text);
    for line in normalized.lines() {
        if let Some(captures) = UNLOCK_TARGET.captures(line) {
            let target = captures[1].trim().trim_end_matches('.').trim();
            if !target.is_empty() {
                return target.to_owned();
            }
        }
    }
    String::new()
}

/// Unlock target from a session context: the keyring name wins over the
/// message, which wins over the description.
pub fn extract_unlock_target_from_context(context: &SessionContext) -> String {
    for text in [
        context.keyring_name.as_deref().unwrap_or_default(),
        &context.message,
        context.description.as_deref().unwrap_or_default(),
    ] {
        let target = extract_unlock_target(text);
        if !target.is_empty() {
            return target;
        }
    }
    String::new()
}

/// Detail lines for an unlock prompt: context texts combined, deduplicated,
/// with boilerplate "unlock <target>" template lines removed.
pub fn build_unlock_details(context: &SessionContext, target: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for text in [
        context.description.as_deref().unwrap_or_default(),
        &context.message,
        context.keyring_name.as_deref().unwrap_or_default(),
    ] {
        lines.extend(normalize_detail_text(text).lines().map(str::to_owned));
    }

    let filtered: Vec<&str> = lines
        .iter()
        .map(String::as_str)
        .filter(|line| !is_unlock_template_line(line, target))
        .collect();
    unique_joined(filtered)
}

fn is_unlock_template_line(line: &str, target: &str) -> bool {
    if target.is_empty() {
        return false;
    }
    let key = normalize_compare_text(&format!("unlock {target}"));
    let normalized = normalize_compare_text(line);
    normalized == key || normalized.ends_with(&format!(" {key}"))
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
