//! Platform-specific paths.
//!
//! System locations are candidates only; discovery decides which of them
//! actually hold a working binary.

use crate::config::{AppConfig, ToolKind};
use crate::error::{DocconvError, Result};
use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Default application data directory (`~/.local/share/docconv`, `%APPDATA%\docconv`, ...).
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(AppConfig::APP_NAME))
        .ok_or_else(|| DocconvError::Config {
            message: "Could not determine the user data directory".to_string(),
        })
}

/// Every location a system-wide tool binary may live in, PATH matches first.
///
/// Duplicates are removed while keeping first-seen order.
pub fn system_search_paths(tool: ToolKind) -> Vec<PathBuf> {
    let mut paths = path_lookup(tool);
    for candidate in well_known_paths(tool) {
        if !paths.contains(&candidate) {
            paths.push(candidate);
        }
    }
    paths
}

/// Matches for the tool's executable on PATH, in PATH order.
pub fn path_lookup(tool: ToolKind) -> Vec<PathBuf> {
    match which::which_all(tool.as_str()) {
        Ok(found) => found.collect(),
        Err(e) => {
            debug!("{} not found on PATH: {}", tool, e);
            Vec::new()
        }
    }
}

#[cfg(target_os = "windows")]
fn well_known_paths(tool: ToolKind) -> Vec<PathBuf> {
    let exe = tool.exe_name();
    let name = tool.as_str();
    let display = tool.display_name();
    let mut paths = Vec::new();

    if let Ok(profile) = env::var("USERPROFILE") {
        let profile = PathBuf::from(profile);
        paths.push(profile.join("AppData").join("Roaming").join(name).join(&exe));
        paths.push(profile.join("AppData").join("Local").join(name).join(&exe));
        paths.push(profile.join("AppData").join("Local").join(display).join(&exe));
        paths.push(
            profile
                .join("scoop")
                .join("apps")
                .join(name)
                .join("current")
                .join(&exe),
        );
        if tool == ToolKind::Typst {
            paths.push(profile.join(".cargo").join("bin").join(&exe));
        }
    }

    paths.push(PathBuf::from(r"C:\Program Files").join(display).join(&exe));
    paths.push(PathBuf::from(r"C:\Program Files (x86)").join(display).join(&exe));

    if let Ok(choco) = env::var("ChocolateyInstall") {
        paths.push(PathBuf::from(choco).join("bin").join(&exe));
    }
    if let Ok(conda) = env::var("CONDA_PREFIX") {
        let conda = PathBuf::from(conda);
        paths.push(conda.join("Scripts").join(&exe));
        paths.push(conda.join("bin").join(&exe));
    }

    paths
}

#[cfg(target_os = "macos")]
fn well_known_paths(tool: ToolKind) -> Vec<PathBuf> {
    let exe = tool.exe_name();
    let mut paths = vec![
        PathBuf::from("/opt/homebrew/bin").join(&exe),
        PathBuf::from("/usr/local/bin").join(&exe),
    ];

    if let Ok(home) = env::var("HOME") {
        let home = PathBuf::from(home);
        paths.push(home.join(".local").join("bin").join(&exe));
        match tool {
            ToolKind::Pandoc => {
                paths.push(home.join("Library").join("Haskell").join("bin").join(&exe));
                paths.push(home.join(".cabal").join("bin").join(&exe));
            }
            ToolKind::Typst => paths.push(home.join(".cargo").join("bin").join(&exe)),
        }
    }

    paths.push(PathBuf::from("/usr/bin").join(&exe));
    paths
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn well_known_paths(tool: ToolKind) -> Vec<PathBuf> {
    let exe = tool.exe_name();
    let mut paths = vec![
        PathBuf::from("/usr/bin").join(&exe),
        PathBuf::from("/usr/local/bin").join(&exe),
    ];

    if let Ok(home) = env::var("HOME") {
        let home = PathBuf::from(home);
        paths.push(home.join(".local").join("bin").join(&exe));
        match tool {
            ToolKind::Pandoc => paths.push(home.join(".cabal").join("bin").join(&exe)),
            ToolKind::Typst => paths.push(home.join(".cargo").join("bin").join(&exe)),
        }
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_paths_end_with_exe_name() {
        for tool in ToolKind::ALL {
            let exe = tool.exe_name();
            for path in well_known_paths(tool) {
                assert_eq!(path.file_name().unwrap().to_string_lossy(), exe);
            }
        }
    }

    #[test]
    fn test_search_paths_have_no_duplicates() {
        let paths = system_search_paths(ToolKind::Pandoc);
        let mut seen = std::collections::HashSet::new();
        for path in &paths {
            assert!(seen.insert(path.clone()), "duplicate {}", path.display());
        }
    }

    #[test]
    fn test_default_data_dir_ends_with_app_name() {
        if let Ok(dir) = default_data_dir() {
            assert!(dir.ends_with(AppConfig::APP_NAME));
        }
    }
}
