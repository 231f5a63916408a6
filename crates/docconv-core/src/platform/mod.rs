//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here:
//! - `paths` - well-known install locations and the application data directory
//! - `permissions` - executable bits
//! - `process` - hidden, time-limited subprocess execution

pub mod paths;
pub mod permissions;
pub mod process;

pub use paths::{default_data_dir, system_search_paths};
pub use permissions::{is_executable, set_executable};
pub use process::{CommandError, CommandOutput, CommandRunner, CommandSpec, TokioCommandRunner};

use crate::config::ToolKind;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Macos,
    Linux,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86_64,
    Aarch64,
    Unknown,
}

/// Operating system and CPU architecture pair used to pick release assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn current() -> Self {
        let os = if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::Macos
        } else if cfg!(target_os = "linux") {
            Os::Linux
        } else {
            Os::Unknown
        };
        let arch = if cfg!(target_arch = "x86_64") {
            Arch::X86_64
        } else if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else {
            Arch::Unknown
        };
        Self { os, arch }
    }

    /// Substrings identifying a tool's release asset for this platform.
    ///
    /// Windows builds are x86_64 only upstream; ARM Windows runs them under
    /// emulation, so both architectures map to the same asset there.
    pub fn asset_patterns(&self, tool: ToolKind) -> Vec<&'static str> {
        match (tool, self.os, self.arch) {
            (ToolKind::Pandoc, Os::Windows, _) => vec!["windows-x86_64"],
            (ToolKind::Pandoc, Os::Macos, Arch::Aarch64) => vec!["arm64-macOS"],
            (ToolKind::Pandoc, Os::Macos, _) => vec!["x86_64-macOS"],
            (ToolKind::Pandoc, Os::Linux, Arch::Aarch64) => vec!["linux-arm64"],
            (ToolKind::Pandoc, Os::Linux, Arch::X86_64) => vec!["linux-amd64"],

            (ToolKind::Typst, Os::Windows, _) => vec!["x86_64-pc-windows-msvc"],
            (ToolKind::Typst, Os::Macos, Arch::Aarch64) => vec!["aarch64-apple-darwin"],
            (ToolKind::Typst, Os::Macos, _) => vec!["x86_64-apple-darwin"],
            (ToolKind::Typst, Os::Linux, Arch::Aarch64) => vec!["aarch64-unknown-linux-musl"],
            (ToolKind::Typst, Os::Linux, Arch::X86_64) => vec!["x86_64-unknown-linux-musl"],

            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let os = match self.os {
            Os::Windows => "windows",
            Os::Macos => "macos",
            Os::Linux => "linux",
            Os::Unknown => "unknown",
        };
        let arch = match self.arch {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Unknown => "unknown",
        };
        write!(f, "{}-{}", os, arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_platform_display() {
        let platform = Platform::current();
        let text = platform.to_string();
        assert!(text.contains('-'));
    }

    #[test]
    fn test_asset_patterns() {
        let mac_arm = Platform {
            os: Os::Macos,
            arch: Arch::Aarch64,
        };
        assert_eq!(mac_arm.asset_patterns(ToolKind::Pandoc), vec!["arm64-macOS"]);
        assert_eq!(
            mac_arm.asset_patterns(ToolKind::Typst),
            vec!["aarch64-apple-darwin"]
        );

        let linux = Platform {
            os: Os::Linux,
            arch: Arch::X86_64,
        };
        assert_eq!(linux.asset_patterns(ToolKind::Pandoc), vec!["linux-amd64"]);

        let unknown = Platform {
            os: Os::Unknown,
            arch: Arch::Unknown,
        };
        assert!(unknown.asset_patterns(ToolKind::Pandoc).is_empty());
    }
}
