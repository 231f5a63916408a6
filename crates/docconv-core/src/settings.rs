//! Persistent user settings.

use crate::atomic;
use crate::config::ToolKind;
use crate::error::{DocconvError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// Per-tool preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPreference {
    pub custom_path: Option<PathBuf>,
    pub use_custom_path: bool,
    pub last_detected_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub theme: Theme,
    /// Try download mirrors before the upstream host.
    pub use_mirrors: bool,
    pub tools: BTreeMap<ToolKind, ToolPreference>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            use_mirrors: true,
            tools: BTreeMap::new(),
        }
    }
}

impl AppSettings {
    pub fn tool(&self, tool: ToolKind) -> ToolPreference {
        self.tools.get(&tool).cloned().unwrap_or_default()
    }

    pub fn tool_mut(&mut self, tool: ToolKind) -> &mut ToolPreference {
        self.tools.entry(tool).or_default()
    }

    /// The custom path, if one is set, enabled, and non-empty.
    pub fn configured_custom_path(&self, tool: ToolKind) -> Option<PathBuf> {
        let pref = self.tools.get(&tool)?;
        if !pref.use_custom_path {
            return None;
        }
        pref.custom_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
            .cloned()
    }
}

/// Settings file plus its in-memory copy.
///
/// Every change is written through to disk before it becomes visible.
pub struct SettingsStore {
    path: PathBuf,
    settings: RwLock<AppSettings>,
}

impl SettingsStore {
    /// Load settings from `path`. A missing or unreadable file yields defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match atomic::read_json::<AppSettings>(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => AppSettings::default(),
            Err(e) => {
                warn!("Ignoring unreadable settings at {}: {}", path.display(), e);
                AppSettings::default()
            }
        };
        Self {
            path,
            settings: RwLock::new(settings),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self) -> AppSettings {
        self.settings.read().await.clone()
    }

    pub async fn configured_custom_path(&self, tool: ToolKind) -> Option<PathBuf> {
        self.settings.read().await.configured_custom_path(tool)
    }

    /// Apply `change`, persist the result, and return it.
    ///
    /// If the write fails the in-memory settings are left as they were.
    pub async fn update<F>(&self, change: F) -> Result<AppSettings>
    where
        F: FnOnce(&mut AppSettings),
    {
        let mut guard = self.settings.write().await;
        let mut updated = guard.clone();
        change(&mut updated);
        if updated == *guard {
            return Ok(updated);
        }

        let path = self.path.clone();
        let to_write = updated.clone();
        tokio::task::spawn_blocking(move || atomic::write_json(&path, &to_write))
            .await
            .map_err(|e| DocconvError::Other(format!("Settings write task failed: {}", e)))??;

        *guard = updated.clone();
        Ok(updated)
    }
}
