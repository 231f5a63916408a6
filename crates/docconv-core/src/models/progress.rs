//! Download progress snapshots and outcomes.

use crate::error::{DocconvError, ErrorKind};
use crate::models::ToolInfo;
use serde::{Deserialize, Serialize};

/// Progress of one mirror attempt of a download.
///
/// `downloaded` restarts at zero whenever the downloader moves to the next
/// mirror; `current_mirror` identifies which mirror the numbers belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Total bytes, 0 while unknown.
    pub total: u64,
    /// Percentage complete, always within 0..=100.
    pub percentage: f64,
    pub speed_bytes_per_sec: f64,
    pub current_mirror: String,
    /// Zero-based index of the mirror within the attempted list.
    pub mirror_index: usize,
    pub mirror_count: usize,
}

impl DownloadProgress {
    pub fn new(
        downloaded: u64,
        total: u64,
        speed_bytes_per_sec: f64,
        current_mirror: impl Into<String>,
        mirror_index: usize,
        mirror_count: usize,
    ) -> Self {
        let percentage = if total > 0 {
            ((downloaded as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            downloaded,
            total,
            percentage,
            speed_bytes_per_sec,
            current_mirror: current_mirror.into(),
            mirror_index,
            mirror_count,
        }
    }
}

/// Where the current or most recent download of a tool stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownloadStatus {
    /// A download or install is in flight. `version` is the requested tag,
    /// `None` for the latest release.
    Running { version: Option<String> },
    Installed { info: ToolInfo },
    Failed { kind: ErrorKind, message: String },
}

impl DownloadStatus {
    pub fn failed(err: &DocconvError) -> Self {
        DownloadStatus::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, DownloadStatus::Running { .. })
    }
}

/// Human readable byte count, e.g. `12.3 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
