//! Installation manager.
//!
//! Installs place a single tool binary at the canonical managed path:
//!
//! 1. take the per-tool writer lock
//! 2. extract the archive into a staging directory and locate the binary
//! 3. copy it next to the canonical path under a temporary name, mark it executable
//! 4. probe the staged copy
//! 5. rename it over the canonical path and record the install
//!
//! A failure at any step leaves the previous install untouched.

use crate::atomic;
use crate::config::{PathsConfig, ToolKind};
use crate::discovery::Prober;
use crate::error::{DocconvError, Result};
use crate::install::extract::{extract_archive, ArchiveFormat};
use crate::install::layout::ManagedLayout;
use crate::models::ToolInfo;
use crate::platform::set_executable;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Metadata written next to a managed binary after a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub tool: ToolKind,
    pub version: String,
    /// File name of the archive or binary the install came from.
    pub source_file: String,
    pub installed_at: DateTime<Utc>,
}

/// Exclusive advisory lock on a tool's managed directory.
struct InstallLock {
    file: File,
}

impl InstallLock {
    fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release install lock: {}", e);
        }
    }
}

/// A staged binary that is deleted unless it was moved into place.
struct StagedBinary {
    path: PathBuf,
    committed: bool,
}

impl Drop for StagedBinary {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn install_io_error(err: io::Error, path: &Path) -> DocconvError {
    if err.kind() == io::ErrorKind::PermissionDenied {
        DocconvError::InstallPermissionDenied {
            path: path.to_path_buf(),
        }
    } else {
        DocconvError::io_with_path(err, path)
    }
}

fn join_error(err: tokio::task::JoinError) -> DocconvError {
    DocconvError::Other(format!("Install task failed: {}", err))
}

/// Installs downloaded artifacts into the managed directory.
pub struct Installer {
    layout: ManagedLayout,
    prober: Prober,
}

impl Installer {
    pub fn new(layout: ManagedLayout, prober: Prober) -> Self {
        Self { layout, prober }
    }

    pub fn layout(&self) -> &ManagedLayout {
        &self.layout
    }

    /// Install `artifact` (an archive or a bare executable) as the managed `tool`.
    ///
    /// Returns the probe result of the installed binary, with `path` set to
    /// the canonical managed location.
    ///
    /// # Errors
    ///
    /// - [`DocconvError::InstallExtractionFailed`] when the archive is corrupt
    ///   or holds no binary for `tool`
    /// - [`DocconvError::InstallPermissionDenied`] when the managed directory
    ///   is not writable
    /// - [`DocconvError::InstallProbeFailed`] when the new binary does not run
    pub async fn install(&self, tool: ToolKind, artifact: &Path) -> Result<ToolInfo> {
        let tool_dir = self.layout.tool_dir(tool);
        let canonical = self.layout.installed_binary(tool);
        info!("Installing {} from {}", tool, artifact.display());

        tokio::fs::create_dir_all(&tool_dir)
            .await
            .map_err(|e| install_io_error(e, &tool_dir))?;

        let lock_path = self.layout.install_lock(tool);
        let _lock = tokio::task::spawn_blocking({
            let lock_path = lock_path.clone();
            move || InstallLock::acquire(&lock_path)
        })
        .await
        .map_err(join_error)?
        .map_err(|e| install_io_error(e, &lock_path))?;

        let staged_path = tokio::task::spawn_blocking({
            let artifact = artifact.to_path_buf();
            let tool_dir = tool_dir.clone();
            move || stage_binary(tool, &artifact, &tool_dir)
        })
        .await
        .map_err(join_error)??;
        let mut staged = StagedBinary {
            path: staged_path,
            committed: false,
        };

        let mut info = self.prober.probe(tool, &staged.path).await.map_err(|reason| {
            warn!("Staged {} failed validation: {}", tool, reason);
            DocconvError::InstallProbeFailed {
                path: canonical.clone(),
                reason: reason.to_string(),
            }
        })?;

        tokio::fs::rename(&staged.path, &canonical)
            .await
            .map_err(|e| install_io_error(e, &canonical))?;
        staged.committed = true;
        info.path = canonical.clone();

        let record = InstallRecord {
            tool,
            version: info.version.clone(),
            source_file: artifact
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            installed_at: Utc::now(),
        };
        let record_path = self.layout.install_record(tool);
        let written = tokio::task::spawn_blocking(move || atomic::write_json(&record_path, &record))
            .await
            .map_err(join_error)?;
        if let Err(e) = written {
            warn!("Installed {} but failed to write install record: {}", tool, e);
        }

        info!("Installed {} {} at {}", tool, info.version, canonical.display());
        Ok(info)
    }

    /// Record of the last successful install, if any.
    pub fn install_record(&self, tool: ToolKind) -> Result<Option<InstallRecord>> {
        atomic::read_json(&self.layout.install_record(tool))
    }

    /// Remove the downloaded managed binary and its record. Bundled binaries stay.
    pub async fn uninstall(&self, tool: ToolKind) -> Result<bool> {
        let canonical = self.layout.installed_binary(tool);
        let removed = match tokio::fs::remove_file(&canonical).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(install_io_error(e, &canonical)),
        };
        let record = self.layout.install_record(tool);
        if let Err(e) = tokio::fs::remove_file(&record).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", record.display(), e);
            }
        }
        if removed {
            info!("Removed managed {} at {}", tool, canonical.display());
        }
        Ok(removed)
    }
}

/// Extract (if needed) and copy the tool binary next to the canonical path.
fn stage_binary(tool: ToolKind, artifact: &Path, tool_dir: &Path) -> Result<PathBuf> {
    let exe = tool.exe_name();
    let artifact_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staged = tool_dir.join(format!(".staged-{}-{}", uuid::Uuid::new_v4(), exe));

    match ArchiveFormat::from_file_name(&artifact_name) {
        Some(format) => {
            let staging = tempfile::Builder::new()
                .prefix(PathsConfig::STAGING_DIR_PREFIX)
                .tempdir_in(tool_dir)
                .map_err(|e| install_io_error(e, tool_dir))?;
            extract_archive(artifact, staging.path(), format)?;

            let found = find_binary(staging.path(), &exe).ok_or_else(|| {
                DocconvError::InstallExtractionFailed {
                    message: format!("no {} executable inside {}", exe, artifact_name),
                }
            })?;
            debug!("Found {} in archive at {}", exe, found.display());
            fs::copy(&found, &staged).map_err(|e| install_io_error(e, &staged))?;
        }
        None => {
            fs::copy(artifact, &staged).map_err(|e| install_io_error(e, &staged))?;
        }
    }

    let finish = || -> io::Result<()> {
        set_executable(&staged)?;
        File::open(&staged)?.sync_all()
    };
    if let Err(e) = finish() {
        let _ = fs::remove_file(&staged);
        return Err(install_io_error(e, &staged));
    }
    Ok(staged)
}

/// Shallowest regular file named `exe` under `root`.
fn find_binary(root: &Path, exe: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .max_depth(6)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == exe)
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::probe::tests::FakeRunner;
    use crate::platform::CommandRunner;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write_tar_gz(path: &Path, entry: &str, data: &[u8]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, entry, data).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    /// Runner that answers any program whose name contains `pandoc`.
    struct AnyPandoc(&'static str);

    #[async_trait::async_trait]
    impl CommandRunner for AnyPandoc {
        async fn run(
            &self,
            spec: crate::platform::CommandSpec,
        ) -> std::result::Result<crate::platform::CommandOutput, crate::platform::CommandError>
        {
            let ok = spec.program.to_string_lossy().contains("pandoc") && !self.0.is_empty();
            Ok(crate::platform::CommandOutput {
                success: ok,
                code: Some(if ok { 0 } else { 1 }),
                stdout: if ok { format!("pandoc {}\n", self.0) } else { String::new() },
                stderr: String::new(),
            })
        }
    }

    fn installer(temp: &TempDir, runner: Arc<dyn CommandRunner>) -> Installer {
        Installer::new(
            ManagedLayout::new(temp.path().join("data"), None),
            Prober::new(runner),
        )
    }

    #[test]
    fn test_find_binary_prefers_shallowest() {
        let temp = TempDir::new().unwrap();
        let deep = temp.path().join("a").join("b").join("pandoc");
        let shallow = temp.path().join("c").join("pandoc");
        for p in [&deep, &shallow] {
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, b"").unwrap();
        }
        assert_eq!(find_binary(temp.path(), "pandoc"), Some(shallow));
        assert_eq!(find_binary(temp.path(), "typst"), None);
    }

    #[tokio::test]
    async fn test_install_from_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pandoc-3.7-linux-amd64.tar.gz");
        let exe = ToolKind::Pandoc.exe_name();
        write_tar_gz(&archive, &format!("pandoc-3.7/bin/{}", exe), b"binary");

        let installer = installer(&temp, Arc::new(AnyPandoc("3.7")));
        let info = installer.install(ToolKind::Pandoc, &archive).await.unwrap();

        let canonical = installer.layout().installed_binary(ToolKind::Pandoc);
        assert_eq!(info.path, canonical);
        assert_eq!(info.version, "3.7");
        assert_eq!(fs::read(&canonical).unwrap(), b"binary");

        let record = installer.install_record(ToolKind::Pandoc).unwrap().unwrap();
        assert_eq!(record.version, "3.7");
        assert_eq!(record.source_file, "pandoc-3.7-linux-amd64.tar.gz");

        // Nothing but the binary, the record and the lock file remain.
        let mut names: Vec<_> = fs::read_dir(installer.layout().tool_dir(ToolKind::Pandoc))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        let mut expected = vec![
            PathsConfig::INSTALL_LOCK_FILENAME.to_string(),
            exe.clone(),
            PathsConfig::INSTALL_RECORD_FILENAME.to_string(),
        ];
        expected.sort();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_probe_failure_keeps_previous_install() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pandoc-3.8.tar.gz");
        let exe = ToolKind::Pandoc.exe_name();
        write_tar_gz(&archive, &exe, b"new");

        let installer = installer(&temp, Arc::new(AnyPandoc("")));
        let canonical = installer.layout().installed_binary(ToolKind::Pandoc);
        fs::create_dir_all(canonical.parent().unwrap()).unwrap();
        fs::write(&canonical, b"old").unwrap();

        let err = installer.install(ToolKind::Pandoc, &archive).await.unwrap_err();
        assert!(matches!(err, DocconvError::InstallProbeFailed { .. }));
        assert_eq!(fs::read(&canonical).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_archive_without_binary() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("docs.tar.gz");
        write_tar_gz(&archive, "README.md", b"hello");

        let installer = installer(&temp, Arc::new(FakeRunner::default()));
        let err = installer.install(ToolKind::Pandoc, &archive).await.unwrap_err();
        assert!(matches!(err, DocconvError::InstallExtractionFailed { .. }));
        assert!(!installer.layout().installed_binary(ToolKind::Pandoc).exists());
    }

    #[tokio::test]
    async fn test_install_bare_binary_and_uninstall() {
        let temp = TempDir::new().unwrap();
        let binary = temp.path().join("pandoc-3.7-standalone");
        fs::write(&binary, b"pandoc").unwrap();

        let installer = installer(&temp, Arc::new(AnyPandoc("3.7")));
        let info = installer.install(ToolKind::Pandoc, &binary).await.unwrap();
        let canonical = installer.layout().installed_binary(ToolKind::Pandoc);
        assert_eq!(info.path, canonical);
        assert!(crate::platform::is_executable(&canonical));

        assert!(installer.uninstall(ToolKind::Pandoc).await.unwrap());
        assert!(!canonical.exists());
        assert!(installer.install_record(ToolKind::Pandoc).unwrap().is_none());
        assert!(!installer.uninstall(ToolKind::Pandoc).await.unwrap());
    }
}
