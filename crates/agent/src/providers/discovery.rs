// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest discovery across the precedence-ordered search directories.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::manifest::{parse_manifest, ProviderManifest};

const PROVIDERS_SUBDIR: &str = "bb-auth/providers.d";

/// Manifests in precedence order plus non-fatal warnings.
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    pub manifests: Vec<ProviderManifest>,
    pub warnings: Vec<String>,
}

/// Default search directories, highest precedence first:
/// `$BB_AUTH_PROVIDER_DIR`, the user config dir, the user data dir, then the
/// configured system directory. Duplicates are dropped.
pub fn default_search_dirs(system_dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::with_capacity(4);

    if let Some(explicit) = std::env::var_os("BB_AUTH_PROVIDER_DIR").filter(|v| !v.is_empty()) {
        dirs.push(PathBuf::from(explicit));
    }
    if let Some(config) = dirs::config_dir() {
        push_unique(&mut dirs, config.join(PROVIDERS_SUBDIR));
    }
    if let Some(data) = dirs::data_dir() {
        push_unique(&mut dirs, data.join(PROVIDERS_SUBDIR));
    }
    if !system_dir.as_os_str().is_empty() {
        push_unique(&mut dirs, system_dir.to_path_buf());
    }

    dirs
}

fn push_unique(dirs: &mut Vec<PathBuf>, dir: PathBuf) {
    if !dirs.contains(&dir) {
        dirs.push(dir);
    }
}

/// Scan the directories for `*.json` manifests in lexical filename order.
/// The first occurrence of an id wins; later duplicates and unparseable
/// files are skipped with a warning.
pub fn discover(search_dirs: &[PathBuf]) -> DiscoveryResult {
    let mut result = DiscoveryResult::default();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for dir in search_dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            // Missing directories are expected, not an error.
            Err(_) => continue,
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json")
            })
            .collect();
        files.sort();

        for path in files {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(_) => {
                    result.warnings.push(format!(
                        "Skipping manifest {}: cannot read file",
                        path.display()
                    ));
                    continue;
                }
            };

            let manifest = match parse_manifest(&bytes) {
                Ok(manifest) => manifest,
                Err(error) => {
                    result
                        .warnings
                        .push(format!("Skipping manifest {}: {error}", path.display()));
                    continue;
                }
            };

            if seen_ids.contains(&manifest.id) {
                result.warnings.push(format!(
                    "Skipping manifest {}: duplicate id '{}' already selected from higher precedence directory",
                    path.display(),
                    manifest.id
                ));
                continue;
            }

            seen_ids.insert(manifest.id.clone());
            result.manifests.push(manifest);
        }
    }

    result
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
