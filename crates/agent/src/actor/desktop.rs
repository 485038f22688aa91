// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Index of installed desktop entries used to attribute requests to
//! applications.

use std::path::{Path, PathBuf};

/// One parsed `.desktop` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesktopEntry {
    /// File name, e.g. `org.mozilla.firefox.desktop`.
    pub desktop_id: String,
    pub name: String,
    pub icon: Option<String>,
    /// First word of the `Exec` line, quotes stripped.
    pub exec: Option<String>,
    pub try_exec: Option<String>,
}

/// Searchable collection of desktop entries.
#[derive(Debug, Clone, Default)]
pub struct DesktopIndex {
    entries: Vec<DesktopEntry>,
}

impl DesktopIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index `applications/` under the XDG data dirs (user first).
    pub fn from_standard_locations() -> Self {
        Self::from_dirs(&application_dirs())
    }

    pub fn from_dirs(dirs: &[PathBuf]) -> Self {
        let mut entries = Vec::new();
        for dir in dirs {
            scan_dir(dir, &mut entries);
        }
        Self { entries }
    }

    pub fn from_entries(entries: Vec<DesktopEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Match an executable basename against the index.
    ///
    /// Priority: exact `<base>.desktop`, case-insensitive desktop id,
    /// `Exec` basename, `TryExec` basename.
    pub fn find_for_exe(&self, exe_basename: &str) -> Option<&DesktopEntry> {
        if exe_basename.is_empty() {
            return None;
        }
        let wanted = format!("{exe_basename}.desktop");

        if let Some(entry) = self.entries.iter().find(|e| e.desktop_id == wanted) {
            return Some(entry);
        }
        if let Some(entry) =
            self.entries.iter().find(|e| e.desktop_id.eq_ignore_ascii_case(&wanted))
        {
            return Some(entry);
        }
        if let Some(entry) = self.entries.iter().find(|e| {
            e.exec.as_deref().map(basename).is_some_and(|b| b == exe_basename)
        }) {
            return Some(entry);
        }
        self.entries.iter().find(|e| {
            e.try_exec.as_deref().map(basename).is_some_and(|b| b == exe_basename)
        })
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn application_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(data) = dirs::data_dir() {
        dirs.push(data.join("applications"));
    }
    let system = std::env::var("XDG_DATA_DIRS")
        .unwrap_or_else(|_| "/usr/local/share:/usr/share".to_owned());
    for part in system.split(':').filter(|p| !p.is_empty()) {
        let dir = Path::new(part).join("applications");
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

fn scan_dir(dir: &Path, entries: &mut Vec<DesktopEntry>) {
    let Ok(read) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            scan_dir(&path, entries);
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(parsed) = parse_desktop_entry(&content, file_name) {
            entries.push(parsed);
        }
    }
}

/// Parse the `[Desktop Entry]` group. Entries without a `Name`, or marked
/// `NoDisplay=true`, are excluded from the index.
pub fn parse_desktop_entry(content: &str, file_name: &str) -> Option<DesktopEntry> {
    let mut in_entry_group = false;
    let mut entry = DesktopEntry { desktop_id: file_name.to_owned(), ..DesktopEntry::default() };

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(group) = line.strip_prefix('[') {
            in_entry_group = group.trim_end_matches(']') == "Desktop Entry";
            continue;
        }
        if !in_entry_group {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "NoDisplay" if value.eq_ignore_ascii_case("true") => return None,
            "Name" => entry.name = value.to_owned(),
            "Icon" => entry.icon = Some(value.to_owned()),
            "Exec" => {
                entry.exec = value
                    .split_whitespace()
                    .next()
                    .map(|first| first.trim_matches('"').to_owned());
            }
            "TryExec" => entry.try_exec = Some(value.to_owned()),
            _ => {}
        }
    }

    if entry.name.is_empty() {
        return None;
    }
    Some(entry)
}

#[cfg(test)]
#[path = "desktop_tests.rs"]
mod tests;
