//! Entry discovery.

use crate::config::{EntrySpec, RcConfig};
use crate::error::BuildError;
use crate::paths::ProjectPaths;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DEFAULT_ENTRY_CANDIDATES: &[&str] = &["index.js", "index.jsx", "index.ts", "index.tsx"];

/// Resolve the entry map for a target.
///
/// Without an `entry` field the first of `src/index.{js,jsx,ts,tsx}` is used
/// under the chunk name `index`. Patterns containing glob characters are
/// matched against project files (outside `node_modules`); each match becomes
/// a chunk named after its file stem. Development entries (`is_build ==
/// false`) get the live-reload client prepended.
pub fn get_entry(
    config: &RcConfig,
    paths: &ProjectPaths,
    is_build: bool,
) -> Result<BTreeMap<String, Vec<String>>, BuildError> {
    let mut entries = BTreeMap::new();

    match &config.entry {
        None => {
            let found = DEFAULT_ENTRY_CANDIDATES
                .iter()
                .map(|name| paths.app_src.join(name))
                .find(|p| p.is_file())
                .ok_or_else(|| BuildError::EntryNotFound {
                    pattern: "src/index.{js,jsx,ts,tsx}".to_string(),
                })?;
            entries.insert("index".to_string(), vec![display(&found)]);
        }
        Some(EntrySpec::Single(pattern)) => {
            add_pattern(&mut entries, paths, pattern)?;
        }
        Some(EntrySpec::List(patterns)) => {
            for pattern in patterns {
                add_pattern(&mut entries, paths, pattern)?;
            }
        }
        Some(EntrySpec::Named(named)) => {
            for (name, file) in named {
                let path = paths.resolve_app(file);
                if !path.is_file() {
                    return Err(BuildError::EntryNotFound {
                        pattern: file.clone(),
                    });
                }
                entries.insert(name.clone(), vec![display(&path)]);
            }
        }
    }

    if !is_build {
        let client = display(&paths.dev_client);
        for modules in entries.values_mut() {
            modules.insert(0, client.clone());
        }
    }

    Ok(entries)
}

fn add_pattern(
    entries: &mut BTreeMap<String, Vec<String>>,
    paths: &ProjectPaths,
    pattern: &str,
) -> Result<(), BuildError> {
    let matches = if is_glob(pattern) {
        glob_files(&paths.app_directory, pattern)
    } else {
        let path = paths.resolve_app(pattern);
        if path.is_file() {
            vec![path]
        } else {
            Vec::new()
        }
    };

    if matches.is_empty() {
        return Err(BuildError::EntryNotFound {
            pattern: pattern.to_string(),
        });
    }

    for path in matches {
        entries.insert(chunk_name(&path), vec![display(&path)]);
    }
    Ok(())
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Project files matching `pattern`, sorted, skipping `node_modules`.
fn glob_files(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let pattern = pattern.trim_start_matches("./");
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != "node_modules")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .strip_prefix(root)
                .map(|rel| fast_glob::glob_match(pattern, rel.to_string_lossy().as_ref()))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn chunk_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "index".to_string())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
