// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider manifest format and validation.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const PRIORITY_MIN: i32 = -1000;
const PRIORITY_MAX: i32 = 1000;

#[allow(clippy::unwrap_used)]
static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").unwrap());

fn default_true() -> bool {
    true
}

/// Parsed declaration of a launchable UI provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderManifest {
    pub id: String,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub priority: i32,
    pub exec: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub autostart: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

impl ProviderManifest {
    /// Validate field constraints, trimming the string fields first.
    pub fn validate(mut self) -> Result<Self, String> {
        self.id = self.id.trim().to_owned();
        self.name = self.name.trim().to_owned();
        self.kind = self.kind.trim().to_owned();
        self.exec = self.exec.trim().to_owned();

        if self.id.is_empty() {
            return Err("id is required".to_owned());
        }
        if !ID_PATTERN.is_match(&self.id) {
            return Err("id must match [a-z0-9][a-z0-9._-]*".to_owned());
        }
        if self.name.is_empty() {
            return Err("name is required".to_owned());
        }
        if self.kind.is_empty() {
            return Err("kind is required".to_owned());
        }
        if self.priority < PRIORITY_MIN || self.priority > PRIORITY_MAX {
            return Err("priority must be within [-1000, 1000]".to_owned());
        }
        if self.exec.is_empty() {
            return Err("exec is required".to_owned());
        }
        if !is_valid_exec(&self.exec) {
            return Err("exec must be absolute path or basename".to_owned());
        }
        Ok(self)
    }

    /// Serialize back to the on-disk JSON form.
    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn is_valid_exec(exec: &str) -> bool {
    if exec.contains('/') {
        return Path::new(exec).is_absolute();
    }
    true
}

/// Parse and validate a manifest document.
///
/// The shape checks run against the raw JSON value first so the rejection
/// messages name the offending field instead of a serde path.
pub fn parse_manifest(bytes: &[u8]) -> Result<ProviderManifest, String> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid JSON: {e}"))?;
    let obj = value.as_object().ok_or_else(|| "manifest root must be an object".to_owned())?;

    for field in ["id", "name", "kind", "exec"] {
        if let Some(v) = obj.get(field) {
            if !v.is_string() {
                return Err(format!("{field} must be a string"));
            }
        } else {
            return Err(format!("{field} is required"));
        }
    }
    if let Some(v) = obj.get("priority") {
        if !v.is_i64() {
            return Err("priority must be an integer".to_owned());
        }
    }
    if let Some(v) = obj.get("autostart") {
        if !v.is_boolean() {
            return Err("autostart must be a boolean".to_owned());
        }
    }
    for field in ["args", "capabilities"] {
        if let Some(v) = obj.get(field) {
            match v.as_array() {
                Some(items) if items.iter().all(|i| i.is_string()) => {}
                Some(_) => return Err(format!("{field} must contain only strings")),
                None => return Err(format!("{field} must be an array")),
            }
        }
    }
    if let Some(v) = obj.get("env") {
        match v.as_object() {
            Some(entries) if entries.values().all(|e| e.is_string()) => {}
            Some(_) => return Err("env values must be strings".to_owned()),
            None => return Err("env must be an object of string values".to_owned()),
        }
    }

    let manifest: ProviderManifest =
        serde_json::from_value(value).map_err(|e| format!("invalid manifest: {e}"))?;
    manifest.validate()
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
