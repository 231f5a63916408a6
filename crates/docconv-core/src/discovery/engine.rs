//! Source discovery: enumerate candidate binaries, probe them, rank them.

use crate::config::ToolKind;
use crate::discovery::probe::{Candidate, ProbeState, Prober};
use crate::error::{DocconvError, Result};
use crate::install::ManagedLayout;
use crate::models::{ToolManager, ToolSource};
use crate::platform::{is_executable, system_search_paths};
use crate::version::compare_versions;
use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Finds and ranks every usable binary of a tool.
pub struct DiscoveryEngine {
    layout: ManagedLayout,
    prober: Prober,
    /// Replaces the platform's system locations when set (directories).
    system_dirs: Option<Vec<PathBuf>>,
}

impl DiscoveryEngine {
    pub fn new(layout: ManagedLayout, prober: Prober) -> Self {
        Self {
            layout,
            prober,
            system_dirs: None,
        }
    }

    /// Search only these directories for system installs instead of PATH
    /// and the platform's well-known locations.
    pub fn with_system_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.system_dirs = Some(dirs);
        self
    }

    fn system_candidates(&self, tool: ToolKind) -> Vec<PathBuf> {
        match &self.system_dirs {
            Some(dirs) => dirs.iter().map(|d| d.join(tool.exe_name())).collect(),
            None => system_search_paths(tool),
        }
    }

    /// Probe every candidate location of `tool`.
    ///
    /// Candidates are the custom path (when given and non-empty), managed
    /// installs present on disk, and system locations that exist. One manager
    /// is returned per distinct path, in that order. Probes run concurrently;
    /// the list is only returned once all of them finished.
    pub async fn discover_sources(&self, tool: ToolKind, custom_path: Option<&Path>) -> Vec<ToolManager> {
        let mut seen = HashSet::new();
        let mut search_paths = Vec::new();
        let mut candidates = Vec::new();

        let mut push = |source: ToolSource, path: PathBuf, exists_required: bool| {
            let key = std::path::absolute(&path).unwrap_or_else(|_| path.clone());
            if !seen.insert(key) {
                return;
            }
            search_paths.push(path.clone());
            if !exists_required || path.exists() {
                candidates.push(Candidate::new(tool, source, path));
            }
        };

        if let Some(custom) = custom_path.filter(|p| !p.as_os_str().is_empty()) {
            push(ToolSource::Custom(custom.to_path_buf()), custom.to_path_buf(), false);
        }
        for managed in self.layout.managed_binaries(tool) {
            push(ToolSource::Managed, managed, true);
        }
        for system in self.system_candidates(tool) {
            push(ToolSource::System(system.clone()), system, true);
        }

        join_all(candidates.iter_mut().map(|c| c.probe(&self.prober))).await;

        let detected: Vec<PathBuf> = candidates
            .iter()
            .filter(|c| matches!(c.state(), ProbeState::Valid(_)))
            .map(|c| c.path.clone())
            .collect();
        info!(
            "Discovered {} {} candidate(s), {} working, {} location(s) searched",
            candidates.len(),
            tool,
            detected.len(),
            search_paths.len()
        );

        candidates
            .into_iter()
            .map(|c| c.into_manager().with_search_context(&detected, &search_paths))
            .collect()
    }

    /// Validate a user-supplied path without touching any state.
    ///
    /// # Errors
    ///
    /// - [`DocconvError::InvalidCustomPath`] when the path is empty, missing,
    ///   not a file or not executable
    /// - [`DocconvError::CustomPathProbeFailed`] when the binary does not validate
    pub async fn create_and_validate_custom(&self, tool: ToolKind, path: &Path) -> Result<ToolManager> {
        let invalid = |reason: &str| DocconvError::InvalidCustomPath {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if path.as_os_str().is_empty() {
            return Err(invalid("path is empty"));
        }
        if !path.exists() {
            return Err(invalid("file does not exist"));
        }
        if !path.is_file() {
            return Err(invalid("not a file"));
        }
        if !is_executable(path) {
            return Err(invalid("file is not executable"));
        }

        match self.prober.probe(tool, path).await {
            Ok(info) => Ok(ToolManager::available(ToolSource::Custom(path.to_path_buf()), info)),
            Err(reason) => Err(DocconvError::CustomPathProbeFailed {
                path: path.to_path_buf(),
                reason: reason.to_string(),
            }),
        }
    }

    /// Whether `path` holds a working `tool` binary.
    pub async fn validate_path(&self, tool: ToolKind, path: &Path) -> bool {
        self.prober.probe(tool, path).await.is_ok()
    }
}

/// Pick the best available manager: Custom, then Managed, then System.
///
/// Among managed candidates the newer probed version wins, ties keep list
/// order. Unavailable managers are never returned.
pub fn select_best(candidates: &[ToolManager]) -> Option<ToolManager> {
    let best = candidates
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_available())
        .min_by(|(ia, a), (ib, b)| {
            a.source()
                .rank()
                .cmp(&b.source().rank())
                .then_with(|| match (a.source(), b.source()) {
                    (ToolSource::Managed, ToolSource::Managed) => compare_versions(
                        b.version().unwrap_or_default(),
                        a.version().unwrap_or_default(),
                    ),
                    _ => Ordering::Equal,
                })
                .then(ia.cmp(ib))
        })
        .map(|(_, m)| m.clone());

    match &best {
        Some(m) => debug!("Selected {} at {}", m.source(), m.path().display()),
        None => debug!("No available candidate among {}", candidates.len()),
    }
    best
}
