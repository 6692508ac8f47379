use std::process::Command;

use crate::error::{ExportError, Result};

/// Resolve a GitHub auth token for the given host.
///
/// Priority:
/// 1. `explicit` (the `--token` flag, which clap also fills from `GITHUB_TOKEN`)
/// 2. `GITHUB_TOKEN` environment variable
/// 3. `GH_TOKEN` environment variable
/// 4. `gh auth token --hostname {host}` (gh CLI)
///
/// Empty values are skipped at every step.
pub fn resolve_token(explicit: Option<&str>, host: &str) -> Result<String> {
    if let Some(token) = explicit.map(str::trim)
        && !token.is_empty()
    {
        return Ok(token.to_owned());
    }

    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var)
            && !token.trim().is_empty()
        {
            return Ok(token.trim().to_owned());
        }
    }

    match token_from_gh_cli(host) {
        Ok(token) => Ok(token),
        Err(reason) => {
            tracing::debug!("auth: gh CLI fallback failed: {reason}");
            Err(ExportError::Configuration(format!(
                "no GitHub token found for host \"{host}\". \
                 Set GITHUB_TOKEN (or GH_TOKEN), pass --token, or run `gh auth login`."
            )))
        }
    }
}

fn token_from_gh_cli(host: &str) -> std::result::Result<String, String> {
    let output = Command::new("gh")
        .args(["auth", "token", "--hostname", host])
        .output()
        .map_err(|e| format!("failed to run `gh auth token`: {e}"))?;

    if !output.status.success() {
        return Err("gh auth token exited with non-zero status".to_owned());
    }

    let token = String::from_utf8(output.stdout)
        .map_err(|_| "gh auth token produced non-UTF-8 output".to_owned())?
        .trim()
        .to_owned();

    if token.is_empty() {
        return Err("gh auth token returned empty string".to_owned());
    }

    Ok(token)
}
