//! Archive extraction for downloaded tool packages.
//!
//! Blocking; callers run it on the blocking pool. Entries that would land
//! outside the destination (absolute paths, `..`, links) are skipped.

use crate::error::{DocconvError, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path};
use tracing::{debug, info, warn};

/// Archive formats upstream tools are published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarXz,
    TarZst,
}

impl ArchiveFormat {
    /// Detect the format from a file name, case-insensitively.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Some(ArchiveFormat::TarXz)
        } else if lower.ends_with(".tar.zst") {
            Some(ArchiveFormat::TarZst)
        } else {
            None
        }
    }
}

fn extraction_error(archive: &Path, err: impl std::fmt::Display) -> DocconvError {
    DocconvError::InstallExtractionFailed {
        message: format!("{}: {}", archive.display(), err),
    }
}

/// Extract `archive_path` into `dest_dir`.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path, format: ArchiveFormat) -> Result<()> {
    info!(
        "Extracting {:?} archive {} to {}",
        format,
        archive_path.display(),
        dest_dir.display()
    );
    fs::create_dir_all(dest_dir).map_err(|e| DocconvError::io_with_path(e, dest_dir))?;

    let file = File::open(archive_path).map_err(|e| extraction_error(archive_path, e))?;
    let reader = BufReader::new(file);

    let result = match format {
        ArchiveFormat::Zip => extract_zip(reader, dest_dir),
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(reader), dest_dir),
        ArchiveFormat::TarXz => extract_tar(xz2::read::XzDecoder::new(reader), dest_dir),
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::read::Decoder::new(reader)
                .map_err(|e| extraction_error(archive_path, e))?;
            extract_tar(decoder, dest_dir)
        }
    };

    result.map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => DocconvError::InstallPermissionDenied {
            path: dest_dir.to_path_buf(),
        },
        _ => extraction_error(archive_path, e),
    })
}

fn is_safe_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn extract_zip<R: Read + io::Seek>(reader: R, dest_dir: &Path) -> io::Result<()> {
    let mut archive = zip::ZipArchive::new(reader).map_err(io::Error::other)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(io::Error::other)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe path in zip: {}", entry.name());
            continue;
        };
        if !is_safe_relative(&relative) {
            continue;
        }
        let dest_path = dest_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&dest_path)?;
        io::copy(&mut entry, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode & 0o777))?;
        }
    }

    debug!("ZIP extraction complete");
    Ok(())
}

fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> io::Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(false);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();

        if entry_type.is_symlink() || entry_type.is_hard_link() {
            debug!("Skipping link entry in tar archive");
            continue;
        }

        let relative = entry.path()?.into_owned();
        if !is_safe_relative(&relative) {
            warn!("Skipping unsafe path in tar: {}", relative.display());
            continue;
        }
        let dest_path = dest_dir.join(&relative);

        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else if entry_type.is_file() {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&dest_path)?;
            io::copy(&mut entry, &mut outfile)?;

            #[cfg(unix)]
            if let Ok(mode) = entry.header().mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode & 0o777))?;
            }
        }
    }

    debug!("TAR extraction complete");
    Ok(())
}
