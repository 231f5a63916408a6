//! Update checks and managed installs on ToolchainApi.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::config::{NetworkConfig, ToolKind};
use crate::discovery::select_best;
use crate::error::{DocconvError, Result};
use crate::install::InstallRecord;
use crate::models::{DownloadProgress, DownloadStatus, Release, ToolInfo, ToolManager, ToolSource};
use crate::network::effective_mirrors;
use crate::state::ManagerEvent;
use crate::version::{needs_update, normalize_version};
use crate::ToolchainApi;

/// Result of comparing the managed install with the latest release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCheck {
    pub tool: ToolKind,
    /// Version of the best managed install; `None` when there is none.
    pub current_version: Option<String>,
    pub latest_version: String,
    pub update_available: bool,
    pub release_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Asset that would be installed on this platform.
    pub asset: Option<String>,
}

impl ToolchainApi {
    // ========================================
    // Releases
    // ========================================

    pub async fn latest_release(&self, tool: ToolKind, force_refresh: bool) -> Result<Release> {
        self.registry.get_latest_release(tool, force_refresh).await
    }

    pub async fn list_releases(
        &self,
        tool: ToolKind,
        page: u32,
        per_page: u32,
        force_refresh: bool,
    ) -> Result<Vec<Release>> {
        self.registry
            .list_releases(tool, page, per_page, force_refresh)
            .await
    }

    /// The release tagged `version`, or the latest release when `None`.
    ///
    /// Tags are compared after normalization, so `v0.13.1` matches `0.13.1`.
    /// Up to [`NetworkConfig::RELEASE_SEARCH_PAGES`] pages of history are searched.
    ///
    /// # Errors
    ///
    /// [`DocconvError::ReleaseNotFound`] when no release carries the tag.
    pub async fn resolve_release(&self, tool: ToolKind, version: Option<&str>) -> Result<Release> {
        let Some(requested) = version.map(str::trim).filter(|v| !v.is_empty()) else {
            return self.registry.get_latest_release(tool, false).await;
        };
        let wanted = normalize_version(requested);

        for page in 1..=NetworkConfig::RELEASE_SEARCH_PAGES {
            let releases = self.registry.list_releases(tool, page, 100, false).await?;
            let last_page = releases.len() < 100;
            if let Some(release) = releases.into_iter().find(|r| r.version == wanted) {
                return Ok(release);
            }
            if last_page {
                break;
            }
        }
        Err(DocconvError::ReleaseNotFound {
            tool: tool.to_string(),
            version: requested.to_string(),
        })
    }

    /// Compare the managed `tool` with the latest upstream release.
    ///
    /// With no managed install an update is always available.
    pub async fn check_update(&self, tool: ToolKind) -> Result<UpdateCheck> {
        let release = self.registry.get_latest_release(tool, false).await?;
        let current_version = self.managed_version(tool).await;
        let update_available = current_version
            .as_deref()
            .map_or(true, |current| needs_update(current, &release.version));
        let asset = release
            .find_asset(&self.platform.asset_patterns(tool))
            .map(|a| a.name.clone());

        info!(
            "{} update check: current {:?}, latest {}, update available: {}",
            tool, current_version, release.version, update_available
        );
        Ok(UpdateCheck {
            tool,
            current_version,
            latest_version: release.version,
            update_available,
            release_url: release.html_url,
            published_at: release.published_at,
            asset,
        })
    }

    async fn managed_version(&self, tool: ToolKind) -> Option<String> {
        let managers = match self.discovered_sources(tool).await {
            Some(managers) => managers,
            None => self.discover_sources(tool).await,
        };
        let managed: Vec<ToolManager> = managers
            .into_iter()
            .filter(|m| m.source() == &ToolSource::Managed)
            .collect();
        select_best(&managed).and_then(|m| m.version().map(String::from))
    }

    // ========================================
    // Download and install
    // ========================================

    /// Download a release of `tool`, install it and make it active.
    ///
    /// `version` selects a release by tag; `None` installs the latest one.
    /// Progress is published as [`ManagerEvent::DownloadProgress`] and, when
    /// given, sent on `progress`. A second caller for the same tool waits for
    /// the first to finish. Any failure leaves the active source untouched.
    /// The outcome stays readable through [`download_status`](Self::download_status).
    pub async fn download_and_install(
        &self,
        tool: ToolKind,
        version: Option<&str>,
        progress: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<ToolInfo> {
        let _guard = self.locks(tool).download.lock().await;
        let cancel = self.cancel_token(tool);
        cancel.reset();
        self.progress.write().await.remove(&tool);
        self.set_status(
            tool,
            DownloadStatus::Running {
                version: version.map(String::from),
            },
        )
        .await;

        let result = self.run_update(tool, version, progress, cancel).await;
        let (event, status) = match &result {
            Ok(info) => (
                ManagerEvent::UpdateInstalled {
                    tool,
                    version: info.version.clone(),
                },
                DownloadStatus::Installed { info: info.clone() },
            ),
            Err(e) => {
                warn!("Updating {} failed: {}", tool, e);
                (
                    ManagerEvent::UpdateFailed {
                        tool,
                        message: e.to_string(),
                    },
                    DownloadStatus::failed(e),
                )
            }
        };
        self.set_status(tool, status).await;
        self.state.read().await.publish(event);
        result
    }

    /// Run [`download_and_install`](Self::download_and_install) on a background task.
    ///
    /// [`download_status`](Self::download_status) already reads `Running`
    /// when this returns.
    pub async fn start_download(
        self: &Arc<Self>,
        tool: ToolKind,
        version: Option<String>,
    ) -> JoinHandle<Result<ToolInfo>> {
        self.set_status(
            tool,
            DownloadStatus::Running {
                version: version.clone(),
            },
        )
        .await;
        let api = Arc::clone(self);
        tokio::spawn(async move {
            api.download_and_install(tool, version.as_deref(), None)
                .await
        })
    }

    async fn run_update(
        &self,
        tool: ToolKind,
        version: Option<&str>,
        progress: Option<mpsc::Sender<DownloadProgress>>,
        cancel: &CancellationToken,
    ) -> Result<ToolInfo> {
        let release = self.resolve_release(tool, version).await?;
        let asset = release
            .find_asset(&self.platform.asset_patterns(tool))
            .cloned()
            .ok_or_else(|| DocconvError::NoCompatibleAsset {
                tool: tool.to_string(),
                platform: self.platform.to_string(),
            })?;
        let use_mirrors = self.settings.get().await.use_mirrors;
        let mirrors = effective_mirrors(&self.mirrors, use_mirrors);
        info!(
            "Updating {} to {} with {} ({} mirrors)",
            tool,
            release.version,
            asset.name,
            mirrors.len()
        );

        let (tx, mut rx) = mpsc::channel::<DownloadProgress>(32);
        let events = self.state.read().await.event_sender();
        let forward = async {
            while let Some(update) = rx.recv().await {
                self.progress.write().await.insert(tool, update.clone());
                let _ = events.send(ManagerEvent::DownloadProgress {
                    tool,
                    progress: update.clone(),
                });
                if let Some(external) = &progress {
                    let _ = external.send(update).await;
                }
            }
        };
        let downloads_dir = self.layout.downloads_dir();
        let download = self
            .downloader
            .download(&asset, &mirrors, &downloads_dir, Some(tx), cancel);
        let (downloaded, ()) = tokio::join!(download, forward);
        let archive = downloaded?;

        cancel.check()?;
        let installed = self.installer.install(tool, &archive).await;
        if let Err(e) = tokio::fs::remove_file(&archive).await {
            warn!("Failed to remove {}: {}", archive.display(), e);
        }
        let info = installed?;

        // Probed paths are absolute even when the data dir is not.
        let canonical = self.layout.installed_binary(tool);
        let canonical = std::path::absolute(&canonical).unwrap_or(canonical);
        let managers = {
            let _guard = self.locks(tool).discovery.lock().await;
            let managers = self.probe_sources(tool).await;
            self.state
                .write()
                .await
                .record_discovery(tool, managers.clone());
            managers
        };
        let manager = managers
            .into_iter()
            .find(|m| m.source() == &ToolSource::Managed && m.path() == canonical && m.is_available())
            .unwrap_or_else(|| ToolManager::available(ToolSource::Managed, info.clone()));
        self.switch_source(tool, manager.clone()).await?;

        Ok(manager.info().cloned().unwrap_or(info))
    }

    /// Cancel the download in flight for `tool`, if any.
    pub fn cancel_download(&self, tool: ToolKind) {
        info!("Cancelling {} download", tool);
        self.cancel_token(tool).cancel();
    }

    /// Last progress reported by the current or most recent download.
    pub async fn download_progress(&self, tool: ToolKind) -> Option<DownloadProgress> {
        self.progress.read().await.get(&tool).cloned()
    }

    /// Outcome of the current or most recent download; `None` before the first.
    pub async fn download_status(&self, tool: ToolKind) -> Option<DownloadStatus> {
        self.status.read().await.get(&tool).cloned()
    }

    async fn set_status(&self, tool: ToolKind, status: DownloadStatus) {
        self.status.write().await.insert(tool, status);
    }

    pub fn install_record(&self, tool: ToolKind) -> Result<Option<InstallRecord>> {
        self.installer.install_record(tool)
    }

    /// Remove the downloaded managed `tool` and reselect the active source.
    pub async fn uninstall_managed(&self, tool: ToolKind) -> Result<Option<ToolManager>> {
        let _guard = self.locks(tool).download.lock().await;
        if self.installer.uninstall(tool).await? {
            Ok(self.refresh_tool(tool).await)
        } else {
            Ok(self.current_manager(tool).await)
        }
    }
}
