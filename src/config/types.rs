use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::github::graphql::{PageOptions, ResolveLimits};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub github: GitHubConfig,
    pub export: ExportConfig,
}

// ---------------------------------------------------------------------------
// GitHub endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// `github.com` or a GitHub Enterprise Server hostname.
    pub host: String,
    /// Explicit API base URI; overrides the one derived from `host`.
    pub api_url: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_owned(),
            api_url: None,
            timeout_secs: 60,
        }
    }
}

impl GitHubConfig {
    /// API base URI, or `None` for the public `api.github.com` default.
    pub fn api_base(&self) -> Option<String> {
        if let Some(url) = self.api_url.as_deref().map(str::trim)
            && !url.is_empty()
        {
            return Some(url.trim_end_matches('/').to_owned());
        }
        if self.host.is_empty() || self.host == "github.com" {
            None
        } else {
            Some(format!("https://{}/api", self.host))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// Export behaviour
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Items requested per page (GitHub caps this at 100).
    pub page_size: u32,
    /// Pause between item pages.
    pub throttle_ms: u64,
    /// Maximum number of custom fields fetched with the project.
    pub field_limit: u32,
    /// Maximum number of saved views fetched with the project.
    pub view_limit: u32,
    /// Directory for the default output file name.
    pub output_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            throttle_ms: 300,
            field_limit: 100,
            view_limit: 20,
            output_dir: None,
        }
    }
}

impl ExportConfig {
    pub fn page_options(&self) -> PageOptions {
        PageOptions {
            page_size: self.page_size,
            throttle: Duration::from_millis(self.throttle_ms),
        }
    }

    pub fn resolve_limits(&self) -> ResolveLimits {
        ResolveLimits {
            fields: self.field_limit,
            views: self.view_limit,
        }
    }
}
