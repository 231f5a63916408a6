//! Builder for configuring ToolchainApi initialization.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::{NetworkConfig, ProbeConfig};
use crate::conversion::Converter;
use crate::discovery::{DiscoveryEngine, Prober};
use crate::error::{DocconvError, Result};
use crate::install::{Installer, ManagedLayout};
use crate::network::{default_mirrors, HttpClient, Mirror, MirrorDownloader, ReleaseRegistry};
use crate::platform::{CommandRunner, Platform, TokioCommandRunner};
use crate::settings::SettingsStore;
use crate::state::ManagerState;
use crate::ToolchainApi;

/// Builder for configuring ToolchainApi initialization.
///
/// # Example
///
/// ```rust,ignore
/// use docconv_core::ToolchainApi;
///
/// let api = ToolchainApi::builder("./data")
///     .resource_dir("./resources")
///     .probe_timeout(std::time::Duration::from_secs(10))
///     .build()
///     .await?;
/// ```
pub struct ToolchainApiBuilder {
    data_dir: PathBuf,
    resource_dir: Option<PathBuf>,
    registry_base_url: Option<String>,
    registry_ttl: Duration,
    mirrors: Option<Vec<Mirror>>,
    probe_timeout: Duration,
    download_read_timeout: Duration,
    system_dirs: Option<Vec<PathBuf>>,
    engine_search_path: Option<OsString>,
    runner: Option<Arc<dyn CommandRunner>>,
}

impl ToolchainApiBuilder {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            resource_dir: None,
            registry_base_url: None,
            registry_ttl: NetworkConfig::RELEASES_TTL,
            mirrors: None,
            probe_timeout: ProbeConfig::PROBE_TIMEOUT,
            download_read_timeout: NetworkConfig::DOWNLOAD_READ_TIMEOUT,
            system_dirs: None,
            engine_search_path: None,
            runner: None,
        }
    }

    /// Directory holding binaries bundled with the application.
    pub fn resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }

    /// GitHub-compatible API root. Default: `https://api.github.com`.
    pub fn registry_base_url(mut self, url: impl Into<String>) -> Self {
        self.registry_base_url = Some(url.into());
        self
    }

    pub fn registry_ttl(mut self, ttl: Duration) -> Self {
        self.registry_ttl = ttl;
        self
    }

    /// Ordered download mirrors. Default: [`default_mirrors`].
    pub fn mirrors(mut self, mirrors: Vec<Mirror>) -> Self {
        self.mirrors = Some(mirrors);
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn download_read_timeout(mut self, timeout: Duration) -> Self {
        self.download_read_timeout = timeout;
        self
    }

    /// Search only these directories for system installs.
    pub fn system_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.system_dirs = Some(dirs);
        self
    }

    /// PATH-style list used to look up PDF engines instead of the process PATH.
    pub fn engine_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.engine_search_path = Some(path.into());
        self
    }

    /// Subprocess runner used for probes and conversions.
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Build the ToolchainApi instance.
    ///
    /// Creates the data directory if needed and loads the settings file.
    pub async fn build(self) -> Result<ToolchainApi> {
        tokio::fs::create_dir_all(&self.data_dir).await.map_err(|e| DocconvError::Io {
            message: format!("Failed to create data directory: {}", self.data_dir.display()),
            path: Some(self.data_dir.clone()),
            source: Some(e),
        })?;

        let layout = ManagedLayout::new(self.data_dir.clone(), self.resource_dir);
        let runner = self
            .runner
            .unwrap_or_else(|| Arc::new(TokioCommandRunner) as Arc<dyn CommandRunner>);
        let prober = Prober::new(runner.clone()).with_timeout(self.probe_timeout);

        let api_client = Arc::new(HttpClient::new()?);
        let download_client = Arc::new(HttpClient::for_downloads()?);
        let registry = match &self.registry_base_url {
            Some(url) => ReleaseRegistry::with_base_url(api_client, url, self.registry_ttl),
            None => ReleaseRegistry::with_base_url(
                api_client,
                NetworkConfig::GITHUB_API_BASE,
                self.registry_ttl,
            ),
        };
        let downloader =
            MirrorDownloader::new(download_client).with_read_timeout(self.download_read_timeout);

        let mut discovery = DiscoveryEngine::new(layout.clone(), prober.clone());
        if let Some(dirs) = self.system_dirs {
            discovery = discovery.with_system_dirs(dirs);
        }

        let mut converter = Converter::new(runner);
        if let Some(path) = self.engine_search_path {
            converter = converter.with_engine_search_path(path);
        }

        let settings = SettingsStore::load(layout.settings_file());
        info!(
            "Toolchain core ready (data: {}, registry: {})",
            layout.data_dir().display(),
            registry.base_url()
        );

        Ok(ToolchainApi {
            platform: Platform::current(),
            installer: Installer::new(layout.clone(), prober),
            layout,
            registry,
            downloader,
            discovery,
            converter,
            mirrors: self.mirrors.unwrap_or_else(default_mirrors),
            settings,
            state: RwLock::new(ManagerState::new()),
            locks: Default::default(),
            cancel_tokens: Default::default(),
            progress: RwLock::new(Default::default()),
            status: RwLock::new(Default::default()),
        })
    }
}
