//! docconv core - tool acquisition and version resolution for a document
//! conversion shell.
//!
//! The crate finds every usable pandoc (and typst, used as a PDF engine),
//! picks the one to use, checks it against the latest upstream release and
//! installs updates through a list of download mirrors. It can be used
//! programmatically without the RPC layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use docconv_core::{ToolKind, ToolchainApi};
//!
//! #[tokio::main]
//! async fn main() -> docconv_core::Result<()> {
//!     let api = ToolchainApi::builder("/path/to/data").build().await?;
//!     api.initialize().await;
//!
//!     let check = api.check_update(ToolKind::Pandoc).await?;
//!     if check.update_available {
//!         let info = api.download_and_install(ToolKind::Pandoc, None, None).await?;
//!         println!("Installed pandoc {}", info.version);
//!     }
//!     Ok(())
//! }
//! ```

pub mod atomic;
pub mod cancel;
pub mod config;
pub mod conversion;
pub mod discovery;
pub mod error;
pub mod install;
pub mod models;
pub mod network;
pub mod platform;
pub mod settings;
pub mod state;
pub mod version;

mod api;

pub use api::{ToolchainApiBuilder, UpdateCheck};
pub use cancel::{CancellationToken, CancelledError};
pub use config::ToolKind;
pub use conversion::{ConversionOutcome, ConversionRequest, PdfEngine};
pub use discovery::select_best;
pub use error::{DocconvError, ErrorKind, Result};
pub use models::{DownloadProgress, DownloadStatus, InvalidReason, Release, ReleaseAsset, ToolInfo, ToolManager, ToolSource};
pub use network::Mirror;
pub use settings::{AppSettings, Theme};
pub use state::ManagerEvent;
pub use version::needs_update;

use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

/// Main entry point for the toolchain core.
///
/// Owns every component: the release registry client, the mirror-aware
/// downloader, the installer, the discovery engine, the persisted settings
/// and the [`ManagerState`](state::ManagerState). Methods are grouped by
/// concern in the `api` submodules.
pub struct ToolchainApi {
    layout: install::ManagedLayout,
    platform: platform::Platform,
    registry: network::ReleaseRegistry,
    downloader: network::MirrorDownloader,
    installer: install::Installer,
    discovery: discovery::DiscoveryEngine,
    converter: conversion::Converter,
    mirrors: Vec<network::Mirror>,
    settings: settings::SettingsStore,
    state: RwLock<state::ManagerState>,
    locks: PerTool<ToolLocks>,
    cancel_tokens: PerTool<CancellationToken>,
    progress: RwLock<HashMap<ToolKind, DownloadProgress>>,
    status: RwLock<HashMap<ToolKind, DownloadStatus>>,
}

/// One value per [`ToolKind`].
#[derive(Default)]
struct PerTool<T> {
    pandoc: T,
    typst: T,
}

impl<T> PerTool<T> {
    fn get(&self, tool: ToolKind) -> &T {
        match tool {
            ToolKind::Pandoc => &self.pandoc,
            ToolKind::Typst => &self.typst,
        }
    }
}

/// One in-flight discovery and one in-flight download per tool kind.
#[derive(Default)]
struct ToolLocks {
    discovery: Mutex<()>,
    download: Mutex<()>,
}

impl ToolchainApi {
    /// Create a builder rooted at `data_dir`.
    pub fn builder(data_dir: impl Into<std::path::PathBuf>) -> ToolchainApiBuilder {
        ToolchainApiBuilder::new(data_dir)
    }

    /// Create an API with default settings in the platform data directory.
    pub async fn new() -> Result<Self> {
        ToolchainApiBuilder::new(platform::default_data_dir()?).build().await
    }

    pub fn data_dir(&self) -> &std::path::Path {
        self.layout.data_dir()
    }

    fn locks(&self, tool: ToolKind) -> &ToolLocks {
        self.locks.get(tool)
    }

    fn cancel_token(&self, tool: ToolKind) -> &CancellationToken {
        self.cancel_tokens.get(tool)
    }
}
