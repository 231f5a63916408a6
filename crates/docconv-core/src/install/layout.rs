//! On-disk layout of managed tool installs.
//!
//! ```text
//! <data_dir>/
//!   settings.json
//!   downloads/            downloaded archives (transient)
//!   tools/<tool>/
//!     <exe>               canonical managed binary
//!     install.json        install record
//!     .install.lock       writer lock
//! <resource_dir>/<tool>/  binaries bundled with the application (read-only)
//! ```

use crate::config::{PathsConfig, ToolKind};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedLayout {
    data_dir: PathBuf,
    resource_dir: Option<PathBuf>,
}

impl ManagedLayout {
    pub fn new(data_dir: impl Into<PathBuf>, resource_dir: Option<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            resource_dir,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn resource_dir(&self) -> Option<&Path> {
        self.resource_dir.as_deref()
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join(PathsConfig::SETTINGS_FILENAME)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join(PathsConfig::DOWNLOADS_DIR_NAME)
    }

    pub fn tool_dir(&self, tool: ToolKind) -> PathBuf {
        self.data_dir.join(PathsConfig::TOOLS_DIR_NAME).join(tool.as_str())
    }

    /// Canonical path of the downloaded managed binary.
    pub fn installed_binary(&self, tool: ToolKind) -> PathBuf {
        self.tool_dir(tool).join(tool.exe_name())
    }

    pub fn install_record(&self, tool: ToolKind) -> PathBuf {
        self.tool_dir(tool).join(PathsConfig::INSTALL_RECORD_FILENAME)
    }

    pub fn install_lock(&self, tool: ToolKind) -> PathBuf {
        self.tool_dir(tool).join(PathsConfig::INSTALL_LOCK_FILENAME)
    }

    /// Binary shipped inside the application's resource directory, if any.
    ///
    /// Looks directly in `<resource_dir>/<tool>/`, then in its `bin/`, then
    /// one directory level down (archives unpacked as `pandoc-3.7/bin/pandoc`).
    pub fn bundled_binary(&self, tool: ToolKind) -> Option<PathBuf> {
        let root = self.resource_dir.as_ref()?.join(tool.as_str());
        find_in_tree(&root, &tool.exe_name())
    }

    /// Managed binaries present on disk: the downloaded install first, then the bundled one.
    pub fn managed_binaries(&self, tool: ToolKind) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let installed = self.installed_binary(tool);
        if installed.is_file() {
            found.push(installed);
        }
        if let Some(bundled) = self.bundled_binary(tool) {
            if !found.contains(&bundled) {
                found.push(bundled);
            }
        }
        found
    }
}

fn find_in_tree(root: &Path, exe: &str) -> Option<PathBuf> {
    let direct = [root.join(exe), root.join("bin").join(exe)];
    if let Some(hit) = direct.into_iter().find(|p| p.is_file()) {
        return Some(hit);
    }

    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(root)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();

    subdirs.into_iter().find_map(|dir| {
        [dir.join(exe), dir.join("bin").join(exe)]
            .into_iter()
            .find(|p| p.is_file())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let layout = ManagedLayout::new("/data/docconv", None);
        assert_eq!(
            layout.installed_binary(ToolKind::Pandoc),
            Path::new("/data/docconv/tools/pandoc").join(ToolKind::Pandoc.exe_name())
        );
        assert_eq!(layout.settings_file(), Path::new("/data/docconv/settings.json"));
        assert!(layout.managed_binaries(ToolKind::Pandoc).is_empty());
    }

    #[test]
    fn test_bundled_binary_lookup_order() {
        let temp = TempDir::new().unwrap();
        let resources = temp.path().join("resources");
        let exe = ToolKind::Pandoc.exe_name();
        let nested = resources.join("pandoc").join("pandoc-3.7").join("bin").join(&exe);
        std::fs::create_dir_all(nested.parent().unwrap()).unwrap();
        std::fs::write(&nested, b"").unwrap();

        let layout = ManagedLayout::new(temp.path().join("data"), Some(resources.clone()));
        assert_eq!(layout.bundled_binary(ToolKind::Pandoc), Some(nested));

        let direct = resources.join("pandoc").join(&exe);
        std::fs::write(&direct, b"").unwrap();
        assert_eq!(layout.bundled_binary(ToolKind::Pandoc), Some(direct));
    }

    #[test]
    fn test_managed_binaries_lists_installed_first() {
        let temp = TempDir::new().unwrap();
        let resources = temp.path().join("resources");
        let layout = ManagedLayout::new(temp.path().join("data"), Some(resources.clone()));
        let exe = ToolKind::Typst.exe_name();

        let bundled = resources.join("typst").join(&exe);
        std::fs::create_dir_all(bundled.parent().unwrap()).unwrap();
        std::fs::write(&bundled, b"").unwrap();
        let installed = layout.installed_binary(ToolKind::Typst);
        std::fs::create_dir_all(installed.parent().unwrap()).unwrap();
        std::fs::write(&installed, b"").unwrap();

        assert_eq!(layout.managed_binaries(ToolKind::Typst), vec![installed, bundled]);
    }
}
