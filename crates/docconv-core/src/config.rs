//! Centralized configuration for the docconv core.
//!
//! Constant holders for timeouts and directory names, plus [`ToolKind`], the
//! closed set of external tools the core knows how to find, update and install.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "docconv";
    pub const USER_AGENT: &'static str = "docconv/0.3";
}

/// Subprocess probe and invocation timeouts.
pub struct ProbeConfig;

impl ProbeConfig {
    /// Upper bound for a single `--version` or format listing query.
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
    /// Upper bound for checking whether a PDF engine runs at all.
    pub const ENGINE_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
    pub const CONVERSION_TIMEOUT: Duration = Duration::from_secs(600);
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Maximum silence between two chunks of a download body.
    pub const DOWNLOAD_READ_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DOWNLOAD_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const GITHUB_API_BASE: &'static str = "https://api.github.com";
    pub const RELEASES_PER_PAGE: u32 = 30;
    /// Pages of 100 releases searched for a requested version.
    pub const RELEASE_SEARCH_PAGES: u32 = 5;
    pub const RELEASES_TTL: Duration = Duration::from_secs(3600);
}

/// Directory and file names under the application data directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const TOOLS_DIR_NAME: &'static str = "tools";
    pub const DOWNLOADS_DIR_NAME: &'static str = "downloads";
    pub const SETTINGS_FILENAME: &'static str = "settings.json";
    pub const INSTALL_RECORD_FILENAME: &'static str = "install.json";
    pub const INSTALL_LOCK_FILENAME: &'static str = ".install.lock";
    pub const STAGING_DIR_PREFIX: &'static str = ".staging-";
}

/// External tools managed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// The document converter.
    Pandoc,
    /// The typst PDF engine.
    Typst,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::Pandoc, ToolKind::Typst];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Pandoc => "pandoc",
            ToolKind::Typst => "typst",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ToolKind::Pandoc => "Pandoc",
            ToolKind::Typst => "Typst",
        }
    }

    pub fn github_repo(&self) -> &'static str {
        match self {
            ToolKind::Pandoc => "jgm/pandoc",
            ToolKind::Typst => "typst/typst",
        }
    }

    /// Executable file name on the current platform.
    pub fn exe_name(&self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.as_str())
        } else {
            self.as_str().to_string()
        }
    }

    /// Arguments that print the tool's version on stdout.
    pub fn version_args(&self) -> &'static [&'static str] {
        &["--version"]
    }

    /// Arguments listing supported input and output formats, if the tool has them.
    pub fn format_query_args(&self) -> Option<(&'static [&'static str], &'static [&'static str])> {
        match self {
            ToolKind::Pandoc => Some((&["--list-input-formats"], &["--list-output-formats"])),
            ToolKind::Typst => None,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pandoc" => Some(ToolKind::Pandoc),
            "typst" => Some(ToolKind::Typst),
            _ => None,
        }
    }
}

impl Default for ToolKind {
    fn default() -> Self {
        ToolKind::Pandoc
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_kind_from_str() {
        assert_eq!(ToolKind::from_str("pandoc"), Some(ToolKind::Pandoc));
        assert_eq!(ToolKind::from_str(" Typst "), Some(ToolKind::Typst));
        assert_eq!(ToolKind::from_str("latex"), None);
    }

    #[test]
    fn test_tool_kind_serde_roundtrips_as_lowercase() {
        let json = serde_json::to_string(&ToolKind::Typst).unwrap();
        assert_eq!(json, "\"typst\"");
        let parsed: ToolKind = serde_json::from_str("\"pandoc\"").unwrap();
        assert_eq!(parsed, ToolKind::Pandoc);
    }

    #[test]
    fn test_only_pandoc_lists_formats() {
        assert!(ToolKind::Pandoc.format_query_args().is_some());
        assert!(ToolKind::Typst.format_query_args().is_none());
    }

    #[test]
    fn test_exe_name() {
        let name = ToolKind::Pandoc.exe_name();
        if cfg!(windows) {
            assert_eq!(name, "pandoc.exe");
        } else {
            assert_eq!(name, "pandoc");
        }
    }
}
