// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Display-ready prompt model derived from a session's context and live
//! prompt fields. Provider UIs render this directly.

use std::sync::LazyLock;

use regex::Regex;

use super::extract::{
    build_unlock_details, extract_command_name, extract_unlock_target_from_context,
};
use super::normalize::{
    first_meaningful_line, normalize_compare_text, normalize_detail_text, text_equivalent,
    trim_to_length, unique_joined,
};
use crate::protocol::{SessionContext, SessionSource};

/// What the prompt is asking the user to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptIntent {
    #[default]
    Generic,
    Unlock,
    RunCommand,
    Fingerprint,
    Fido2,
    OpenPgp,
}

/// Everything a provider needs to render one prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptDisplayModel {
    pub intent: PromptIntent,
    pub title: String,
    pub summary: String,
    pub details: String,
    /// "Requested by ..." line; empty when the requestor is unknown.
    pub requestor: String,
    /// Label for the input field, or the touch instruction.
    pub prompt: String,
    pub passphrase_prompt: bool,
    /// Touch-style intents accept an empty submission.
    pub allow_empty_response: bool,
}

const FINGERPRINT_CUES: &[&str] =
    &["fingerprint", "finger scan", "swipe sensor", "place finger", "place your finger"];

const FIDO_CUES: &[&str] = &["security key", "yubikey", "fido", "u2f"];

#[allow(clippy::unwrap_used)]
static TOUCH_WORDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(touch|tap)\b").unwrap());

fn looks_like_fingerprint_prompt(text: &str) -> bool {
    FINGERPRINT_CUES.iter().any(|cue| text.contains(cue))
}

fn looks_like_fido_prompt(text: &str) -> bool {
    FIDO_CUES.iter().any(|cue| text.contains(cue)) || TOUCH_WORDS.is_match(text)
}

#[allow(clippy::unwrap_used)]
static IDENTITY_QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new("\"([^\"]+)\"").unwrap());

#[allow(clippy::unwrap_used)]
static KEY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bID\s+([A-F0-9]{8,})").unwrap());

#[allow(clippy::unwrap_used)]
static KEY_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{3,5}-bit\s+[A-Za-z0-9-]+\s+key)").unwrap());

#[allow(clippy::unwrap_used)]
static KEY_CREATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)created\s+([0-9]{4}-[0-9]{2}-[0-9]{2})").unwrap());

fn capture_first(text: &str, regex: &Regex) -> String {
    regex
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .unwrap_or_default()
}

fn clean_identity(identity: &str) -> String {
    let collapsed = identity.split_whitespace().collect::<Vec<_>>().join(" ");
    let lowered = collapsed.to_lowercase();
    match lowered.find(" (github)") {
        Some(pos) => {
            let mut kept = collapsed.clone();
            kept.replace_range(pos..pos + " (github)".len(), "");
            kept.trim().to_owned()
        }
        None => collapsed,
    }
}

fn is_identity_line(line: &str) -> bool {
    line.contains('"') && line.contains('<') && line.contains('>')
}

fn is_key_metadata_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    (lower.contains(" id ") || lower.starts_with("id ")) && lower.contains("created")
}

fn is_low_signal_command(command: &str) -> bool {
    let normalized = command.trim().to_lowercase();
    normalized.is_empty() || matches!(normalized.as_str(), "true" | "sh" | "bash")
}

const GENERIC_SUMMARIES: &[&str] = &[
    "authentication is required",
    "authentication required",
    "authorization is required",
    "authorization required",
    "authenticate to continue",
    "authentication is required to continue",
    "authorization is required to continue",
];

fn is_generic_auth_summary(summary: &str) -> bool {
    let normalized = normalize_compare_text(summary);
    normalized.is_empty() || GENERIC_SUMMARIES.contains(&normalized.as_str())
}

/// Turn a polkit action id into a readable phrase: last dot segment,
/// separators spaced, words title-cased.
pub fn humanize_action_id(action_id: &str) -> String {
    let trimmed = action_id.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let tail = trimmed.rsplit('.').next().unwrap_or(trimmed);
    let spaced = tail.replace(['-', '_', '/'], " ");
    spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip one trailing ASCII or fullwidth colon from a prompt label.
pub fn normalize_prompt_label(label: &str) -> String {
    let trimmed = label.trim();
    let stripped = trimmed
        .strip_suffix(':')
        .or_else(|| trimmed.strip_suffix('：'))
        .unwrap_or(trimmed);
    stripped.trim().to_owned()
}

/// Source classification hint for provider chrome (icon, colour).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHint {
    pub kind: String,
    pub icon: Option<String>,
    pub colorize: bool,
}

/// Classify a request by source and text for provider styling.
pub fn classify_source_hint(source: &str, title: &str, description: &str) -> SourceHint {
    let title_lower = title.to_lowercase();
    let description_lower = description.to_lowercase();

    if source == "polkit" {
        return SourceHint {
            kind: "polkit".to_owned(),
            icon: Some("security-high".to_owned()),
            colorize: true,
        };
    }
    if source == "keyring" {
        if title_lower.contains("gpg") || description_lower.contains("openpgp") {
            return SourceHint {
                kind: "gpg".to_owned(),
                icon: Some("gnupg".to_owned()),
                colorize: true,
            };
        }
        if title_lower.contains("ssh") || description_lower.contains("ssh") {
            return SourceHint {
                kind: "ssh".to_owned(),
                icon: Some("ssh-key".to_owned()),
                colorize: true,
            };
        }
        return SourceHint { kind: "keyring".to_owned(), icon: None, colorize: true };
    }
    SourceHint { kind: "unknown".to_owned(), icon: None, colorize: false }
}

/// Build the display model for a session.
///
/// `info` and `live_prompt` are the latest `session.updated` fields, when
/// the provider has seen any.
pub fn build_display_model(
    source: SessionSource,
    context: &SessionContext,
    info: Option<&str>,
    live_prompt: Option<&str>,
) -> PromptDisplayModel {
    let mut model = PromptDisplayModel::default();

    let is_polkit = source == SessionSource::Polkit;
    let is_keyring = source == SessionSource::Keyring;
    let is_pinentry = source == SessionSource::Pinentry;

    let message = context.message.as_str();
    let description = context.description.as_deref().unwrap_or_default();
    let requestor_name = context.requestor.name.trim();
    let requestor_pid = context.requestor.pid.unwrap_or_default();
    let action_id = context.action_id.as_deref().unwrap_or_default().trim();
    let action_summary =
        if is_polkit { humanize_action_id(action_id) } else { String::new() };
    let action_user = context.user.as_deref().unwrap_or_default().trim();

    let info_text = normalize_detail_text(info.unwrap_or_default());
    let live_prompt_text = normalize_detail_text(live_prompt.unwrap_or_default());
    let normalized_message = normalize_detail_text(message);
    let normalized_description = normalize_detail_text(description);
    let detail_text = format!("{normalized_description} {normalized_message}").to_lowercase();
    let auth_hint_text = format!(
        "{detail_text} {} {}",
        info_text.to_lowercase(),
        live_prompt_text.to_lowercase()
    );

    let command_name =
        if is_polkit { extract_command_name(message) } else { String::new() };
    let mut unlock_target = if is_polkit || is_keyring {
        extract_unlock_target_from_context(context)
    } else {
        String::new()
    };
    if is_keyring && unlock_target.is_empty() {
        unlock_target = requestor_name.to_owned();
    }

    let fingerprint_hint = looks_like_fingerprint_prompt(&auth_hint_text);
    let fido_hint = !fingerprint_hint && looks_like_fido_prompt(&auth_hint_text);
    let touch_hint = fingerprint_hint || fido_hint;

    // Classification, most specific first.
    if is_polkit && fingerprint_hint {
        model.intent = PromptIntent::Fingerprint;
    } else if is_polkit && fido_hint {
        model.intent = PromptIntent::Fido2;
    } else if is_pinentry && (detail_text.contains("openpgp") || detail_text.contains("gpg")) {
        model.intent = PromptIntent::OpenPgp;
    } else if is_polkit && !command_name.is_empty() {
        model.intent = PromptIntent::RunCommand;
    } else if (is_polkit || is_keyring) && !unlock_target.is_empty() {
        model.intent = PromptIntent::Unlock;
    }

    match model.intent {
        PromptIntent::Unlock => {
            model.title = format!("Unlock {unlock_target}");
            model.summary = format!("Use your password to unlock {unlock_target}");
            model.details = build_unlock_details(context, &unlock_target);
        }
        PromptIntent::Fingerprint => {
            model.title = "Verify Fingerprint".to_owned();
            model.summary = first_meaningful_line(&normalized_message);
            if model.summary.is_empty() {
                model.summary = "Use your fingerprint sensor to continue".to_owned();
            }
            model.details = normalized_description.clone();
        }
        PromptIntent::Fido2 => {
            model.title = "Use Security Key".to_owned();
            model.summary = first_meaningful_line(&normalized_message);
            if model.summary.is_empty() {
                model.summary = "Touch your security key to continue".to_owned();
            }
            model.details = normalized_description.clone();
        }
        PromptIntent::RunCommand => {
            model.title = "Authorization Required".to_owned();
            model.summary = first_meaningful_line(&normalized_description);
            if model.summary.is_empty() {
                model.summary = first_meaningful_line(&normalized_message);
            }
            if model.summary.is_empty() {
                model.summary = if is_low_signal_command(&command_name) {
                    "Administrative privileges required".to_owned()
                } else {
                    format!("Run {command_name} as superuser")
                };
            }
            model.details.clear();
        }
        PromptIntent::OpenPgp | PromptIntent::Generic if is_pinentry => {
            model.title = if model.intent == PromptIntent::OpenPgp {
                "Unlock OpenPGP Key".to_owned()
            } else if detail_text.contains("ssh") {
                "Unlock SSH Key".to_owned()
            } else {
                "Authentication Required".to_owned()
            };

            let reference = if description.is_empty() { message } else { description };
            let identity = clean_identity(&capture_first(reference, &IDENTITY_QUOTED));
            let key_id = capture_first(reference, &KEY_ID);
            let key_type = capture_first(reference, &KEY_TYPE);
            let created = capture_first(reference, &KEY_CREATED);

            let mut pieces: Vec<String> = Vec::new();
            if !identity.is_empty() {
                pieces.push(trim_to_length(&identity, 72));
            } else if !key_type.is_empty() {
                pieces.push(key_type);
            }
            if !key_id.is_empty() {
                pieces.push(key_id);
            }
            if !created.is_empty() {
                pieces.push(format!("created {created}"));
            }
            model.summary = if pieces.is_empty() {
                first_meaningful_line(reference)
            } else {
                pieces.join("  •  ")
            };

            let pin_text = normalize_detail_text(reference);
            if !pin_text.is_empty() {
                let filtered: Vec<&str> = pin_text
                    .lines()
                    .filter(|line| !is_identity_line(line) && !is_key_metadata_line(line))
                    .collect();
                model.details =
                    if filtered.is_empty() { pin_text } else { filtered.join("\n") };
            }
        }
        PromptIntent::Generic | PromptIntent::OpenPgp => {
            model.title = if is_polkit {
                "Authorization Required".to_owned()
            } else {
                "Authentication Required".to_owned()
            };
            model.summary = first_meaningful_line(&normalized_message);
            if model.summary.is_empty() {
                model.summary = first_meaningful_line(&normalized_description);
            }
            if !normalized_description.is_empty()
                && !text_equivalent(&normalized_description, &model.summary)
            {
                model.details = normalized_description.clone();
            } else if !normalized_message.is_empty()
                && !text_equivalent(&normalized_message, &model.summary)
            {
                model.details = normalized_message.clone();
            }
        }
    }

    // Requestor line.
    if !requestor_name.is_empty() {
        let duplicate_unlock_requestor = model.intent == PromptIntent::Unlock
            && requestor_name.eq_ignore_ascii_case(&unlock_target);
        if !duplicate_unlock_requestor {
            let weak_identity = is_polkit
                && requestor_name.eq_ignore_ascii_case("unknown")
                && requestor_pid > 0;
            model.requestor = if weak_identity {
                format!("Requested by process {requestor_pid}")
            } else {
                format!("Requested by {requestor_name}")
            };
        }
    } else if is_polkit && requestor_pid > 0 {
        model.requestor = format!("Requested by process {requestor_pid}");
    }

    // Promote the first detail line when there is no summary at all.
    if model.summary.is_empty() && !model.details.is_empty() {
        let normalized_details = normalize_detail_text(&model.details);
        match normalized_details.split_once('\n') {
            Some((first, rest)) => {
                model.summary = first.trim().to_owned();
                model.details = rest.trim().to_owned();
            }
            None => {
                model.summary = normalized_details;
                model.details.clear();
            }
        }
    }

    // Drop detail lines that repeat the summary.
    if !model.summary.is_empty() && !model.details.is_empty() {
        let normalized_details = normalize_detail_text(&model.details);
        let mut detail_lines: Vec<&str> = normalized_details.lines().collect();
        if detail_lines
            .first()
            .is_some_and(|first| text_equivalent(first, &model.summary))
        {
            detail_lines.remove(0);
        }
        model.details = detail_lines.join("\n").trim().to_owned();
        if text_equivalent(&model.summary, &model.details) {
            model.details.clear();
        }
    }

    // Live info joins the details unless it repeats something shown already.
    if !info_text.is_empty()
        && !text_equivalent(&info_text, &model.summary)
        && !text_equivalent(&info_text, &model.details)
    {
        model.details = if model.details.is_empty() {
            info_text.clone()
        } else {
            unique_joined([model.details.as_str(), info_text.as_str()])
        };
    }

    // PolicyKit enrichment from the action id.
    if is_polkit {
        if is_generic_auth_summary(&model.summary) && !action_summary.is_empty() {
            model.summary = action_summary.clone();
        }

        let mut action_lines: Vec<String> = Vec::new();
        if !action_summary.is_empty() {
            action_lines.push(format!("Action: {action_summary}"));
        }
        if !action_id.is_empty() && !action_id.eq_ignore_ascii_case(&action_summary) {
            action_lines.push(format!("Policy: {action_id}"));
        }
        if !action_user.is_empty() {
            action_lines.push(format!("Authenticate as {action_user}"));
        }

        let action_details = unique_joined(action_lines.iter().map(String::as_str));
        if !action_details.is_empty() {
            model.details = if model.details.is_empty() {
                action_details
            } else {
                unique_joined([model.details.as_str(), action_details.as_str()])
            };
        }
    }

    // Input field label.
    if is_pinentry {
        let event_prompt = live_prompt.unwrap_or_default().trim();
        let pin_prompt =
            if event_prompt.is_empty() { context.message.trim() } else { event_prompt };
        model.prompt =
            if pin_prompt.is_empty() { "Passphrase:".to_owned() } else { pin_prompt.to_owned() };
    } else {
        model.prompt = "Password:".to_owned();
        if is_polkit && touch_hint {
            model.prompt = "Press Enter to continue (or wait)".to_owned();
            model.allow_empty_response = true;
        }
    }

    model.passphrase_prompt =
        is_pinentry || model.prompt.to_lowercase().contains("passphrase");
    if is_polkit && touch_hint {
        model.passphrase_prompt = false;
    }

    model
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
