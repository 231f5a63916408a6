//! Source discovery and switching methods on ToolchainApi.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::config::ToolKind;
use crate::discovery::select_best;
use crate::error::{DocconvError, Result};
use crate::models::{ToolInfo, ToolManager};
use crate::ToolchainApi;

impl ToolchainApi {
    // ========================================
    // Discovery
    // ========================================

    /// Discover every tool kind and make each one's best source active.
    pub async fn initialize(&self) -> BTreeMap<ToolKind, Option<ToolManager>> {
        let mut selected = BTreeMap::new();
        for tool in ToolKind::ALL {
            selected.insert(tool, self.refresh_tool(tool).await);
        }
        selected
    }

    /// Re-run discovery for `tool` and select its best source.
    ///
    /// When nothing works the discovery list is still recorded and the
    /// active source is cleared.
    pub async fn refresh_tool(&self, tool: ToolKind) -> Option<ToolManager> {
        let _guard = self.locks(tool).discovery.lock().await;
        let managers = self.probe_sources(tool).await;
        let best = self.state.write().await.initialize(tool, managers);
        match &best {
            Some(manager) => {
                info!("Active {}: {}", tool, manager.source());
                self.remember_version(tool, manager.version()).await;
            }
            None => warn!("No working {} found", tool),
        }
        best
    }

    /// Probe every candidate location of `tool` and record the result.
    ///
    /// Does not change the active source. Concurrent callers for the same
    /// tool wait for the pass in flight.
    pub async fn discover_sources(&self, tool: ToolKind) -> Vec<ToolManager> {
        let _guard = self.locks(tool).discovery.lock().await;
        let managers = self.probe_sources(tool).await;
        self.state
            .write()
            .await
            .record_discovery(tool, managers.clone());
        managers
    }

    pub(crate) async fn probe_sources(&self, tool: ToolKind) -> Vec<ToolManager> {
        let custom = self.settings.configured_custom_path(tool).await;
        self.discovery.discover_sources(tool, custom.as_deref()).await
    }

    /// Result of the last discovery pass; `None` if it never ran.
    pub async fn discovered_sources(&self, tool: ToolKind) -> Option<Vec<ToolManager>> {
        self.state.read().await.discovered(tool).map(<[ToolManager]>::to_vec)
    }

    /// Best available source, discovering first if that never happened.
    pub async fn get_best_manager(&self, tool: ToolKind) -> Option<ToolManager> {
        let cached = self.discovered_sources(tool).await;
        let managers = match cached {
            Some(managers) => managers,
            None => self.discover_sources(tool).await,
        };
        select_best(&managers)
    }

    pub async fn current_manager(&self, tool: ToolKind) -> Option<ToolManager> {
        self.state.read().await.current(tool).cloned()
    }

    // ========================================
    // Custom paths and switching
    // ========================================

    /// Validate `path` as a custom `tool` binary without changing any state.
    pub async fn create_and_validate_custom(&self, tool: ToolKind, path: &Path) -> Result<ToolManager> {
        self.discovery.create_and_validate_custom(tool, path).await
    }

    /// Whether `path` holds a working `tool` binary.
    pub async fn validate_path(&self, tool: ToolKind, path: &Path) -> bool {
        self.discovery.validate_path(tool, path).await
    }

    /// Validate `path`, persist it as the custom path and make it active.
    ///
    /// On any error the settings and the active source are left unchanged.
    pub async fn use_custom_path(&self, tool: ToolKind, path: &Path) -> Result<ToolManager> {
        // Held so a discovery pass cannot reselect from pre-change settings.
        let _guard = self.locks(tool).discovery.lock().await;
        let manager = self.create_and_validate_custom(tool, path).await?;
        self.settings
            .update(|s| {
                let pref = s.tool_mut(tool);
                pref.custom_path = Some(path.to_path_buf());
                pref.use_custom_path = true;
            })
            .await?;
        self.switch_source(tool, manager.clone()).await?;
        Ok(manager)
    }

    /// Stop using the custom path and fall back to the best remaining source.
    pub async fn clear_custom_path(&self, tool: ToolKind) -> Result<Option<ToolManager>> {
        self.settings
            .update(|s| s.tool_mut(tool).use_custom_path = false)
            .await?;
        Ok(self.refresh_tool(tool).await)
    }

    /// Make `manager` the active source for `tool`.
    ///
    /// # Errors
    ///
    /// [`DocconvError::SourceUnavailable`] if the manager did not probe successfully.
    pub async fn switch_source(&self, tool: ToolKind, manager: ToolManager) -> Result<()> {
        let version = manager.version().map(String::from);
        self.state.write().await.switch(tool, manager)?;
        self.remember_version(tool, version.as_deref()).await;
        Ok(())
    }

    /// Capabilities of the active `tool`, or of `custom_path` when given.
    ///
    /// Runs discovery when no source is active yet.
    ///
    /// # Errors
    ///
    /// - [`DocconvError::InvalidCustomPath`] / [`DocconvError::CustomPathProbeFailed`]
    ///   for a bad `custom_path`
    /// - [`DocconvError::ToolNotFound`] when no working binary exists
    pub async fn get_tool_info(&self, tool: ToolKind, custom_path: Option<&Path>) -> Result<ToolInfo> {
        if let Some(path) = custom_path.filter(|p| !p.as_os_str().is_empty()) {
            let manager = self.create_and_validate_custom(tool, path).await?;
            return manager_info(manager);
        }

        let current = match self.current_manager(tool).await {
            Some(manager) => Some(manager),
            None => self.refresh_tool(tool).await,
        };
        match current {
            Some(manager) => manager_info(manager),
            None => {
                let searched = self
                    .discovered_sources(tool)
                    .await
                    .map(|m| m.len())
                    .unwrap_or(0);
                Err(DocconvError::ToolNotFound {
                    tool: tool.to_string(),
                    searched,
                })
            }
        }
    }

    async fn remember_version(&self, tool: ToolKind, version: Option<&str>) {
        let Some(version) = version else { return };
        let version = version.to_string();
        if let Err(e) = self
            .settings
            .update(|s| s.tool_mut(tool).last_detected_version = Some(version))
            .await
        {
            warn!("Failed to persist detected {} version: {}", tool, e);
        }
    }
}

fn manager_info(manager: ToolManager) -> Result<ToolInfo> {
    let source = manager.source().to_string();
    manager
        .info()
        .cloned()
        .ok_or(DocconvError::SourceUnavailable { source_desc: source })
}
