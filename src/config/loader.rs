use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::types::AppConfig;

/// File name looked up in the current Git repository.
const REPO_LOCAL_FILE: &str = ".gh-project-export.toml";

/// Discover and load the app config.
///
/// Priority:
/// 1. `--config` flag (explicit path)
/// 2. `.gh-project-export.toml` in the current Git repository root
/// 3. `$GH_PROJECT_EXPORT_CONFIG` environment variable
/// 4. `$XDG_CONFIG_HOME/gh-project-export/config.toml`
/// 5. `~/.config/gh-project-export/config.toml`
///
/// If both a global and a repo-local config exist, the local file is merged
/// key by key over the global one. With no file at all, defaults are used.
pub fn load_config(explicit_path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit_path {
        let table = read_table(path)?;
        return into_config(table, path);
    }

    let global_path = find_global_config();
    let local_path = find_repo_local_config();

    match (global_path, local_path) {
        (Some(global), Some(local)) => {
            let mut merged = read_table(&global)?;
            merge_tables(&mut merged, read_table(&local)?);
            into_config(merged, &local)
        }
        (Some(path), None) | (None, Some(path)) => {
            let table = read_table(&path)?;
            into_config(table, &path)
        }
        (None, None) => Ok(AppConfig::default()),
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parsing TOML from {}", path.display()))
}

fn into_config(table: toml::Table, origin: &Path) -> Result<AppConfig> {
    toml::Value::Table(table)
        .try_into()
        .with_context(|| format!("invalid settings in {}", origin.display()))
}

/// Recursively overlay `overlay` on `base`. Nested tables merge; any other
/// value in `overlay` replaces the one in `base`.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                } else {
                    base.insert(key, toml::Value::Table(incoming));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

fn find_repo_local_config() -> Option<PathBuf> {
    // Walk up from CWD looking for the file next to a `.git` directory.
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(REPO_LOCAL_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir.join(".git").exists() {
            return None;
        }
        if !dir.pop() {
            return None;
        }
    }
}

fn find_global_config() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("GH_PROJECT_EXPORT_CONFIG") {
        let p = PathBuf::from(&path);
        if p.is_file() {
            return Some(p);
        }
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let p = PathBuf::from(xdg).join("gh-project-export/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    if let Some(home) = std::env::var("HOME").ok().map(PathBuf::from) {
        let p = home.join(".config/gh-project-export/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    None
}
