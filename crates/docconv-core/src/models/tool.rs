//! Tool sources, probe results and the managers built from them.

use crate::config::ToolKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a tool binary comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ToolSource {
    /// A path the user configured explicitly.
    Custom(PathBuf),
    /// A binary installed and owned by the application (downloaded or bundled).
    Managed,
    /// A binary found on PATH or in a well-known system location.
    System(PathBuf),
}

impl ToolSource {
    /// Selection priority; lower wins.
    pub fn rank(&self) -> u8 {
        match self {
            ToolSource::Custom(_) => 0,
            ToolSource::Managed => 1,
            ToolSource::System(_) => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolSource::Custom(_) => "custom",
            ToolSource::Managed => "managed",
            ToolSource::System(_) => "system",
        }
    }
}

impl fmt::Display for ToolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolSource::Custom(p) => write!(f, "custom ({})", p.display()),
            ToolSource::Managed => write!(f, "managed"),
            ToolSource::System(p) => write!(f, "system ({})", p.display()),
        }
    }
}

/// Capabilities of a working tool binary, captured by one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub tool: ToolKind,
    pub version: String,
    pub path: PathBuf,
    pub is_working: bool,
    pub supported_input_formats: Vec<String>,
    pub supported_output_formats: Vec<String>,
    /// Every path where a working binary was detected in the same pass.
    #[serde(default)]
    pub detected_paths: Vec<PathBuf>,
    /// Every path that was searched in the same pass.
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
}

impl ToolInfo {
    pub fn supports_output(&self, format: &str) -> bool {
        self.supported_output_formats.iter().any(|f| f == format)
    }
}

/// Why a candidate binary was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InvalidReason {
    NotFound,
    NotExecutable,
    SpawnFailed { message: String },
    Timeout { secs: u64 },
    NonZeroExit { code: Option<i32>, stderr: String },
    UnrecognizedOutput { output: String },
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::NotFound => write!(f, "file does not exist"),
            InvalidReason::NotExecutable => write!(f, "file is not executable"),
            InvalidReason::SpawnFailed { message } => write!(f, "failed to start: {}", message),
            InvalidReason::Timeout { secs } => write!(f, "did not respond within {}s", secs),
            InvalidReason::NonZeroExit { code, stderr } => {
                match code {
                    Some(code) => write!(f, "exited with status {}", code)?,
                    None => write!(f, "terminated by signal")?,
                }
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            InvalidReason::UnrecognizedOutput { output } => {
                write!(f, "no version in output '{}'", output)
            }
        }
    }
}

/// A candidate tool binary together with the outcome of probing it.
///
/// Constructed only through [`ToolManager::available`] and
/// [`ToolManager::unavailable`], so `is_available()` always implies a
/// working [`ToolInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolManager {
    source: ToolSource,
    path: PathBuf,
    info: Option<ToolInfo>,
    available: bool,
    invalid_reason: Option<InvalidReason>,
}

impl ToolManager {
    /// A manager for a binary that probed successfully.
    ///
    /// A `ToolInfo` whose `is_working` flag is false is recorded as unavailable.
    pub fn available(source: ToolSource, info: ToolInfo) -> Self {
        let working = info.is_working;
        Self {
            source,
            path: info.path.clone(),
            available: working,
            invalid_reason: if working {
                None
            } else {
                Some(InvalidReason::UnrecognizedOutput {
                    output: String::new(),
                })
            },
            info: Some(info),
        }
    }

    pub fn unavailable(source: ToolSource, path: impl Into<PathBuf>, reason: InvalidReason) -> Self {
        Self {
            source,
            path: path.into(),
            info: None,
            available: false,
            invalid_reason: Some(reason),
        }
    }

    pub fn source(&self) -> &ToolSource {
        &self.source
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> Option<&ToolInfo> {
        self.info.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn invalid_reason(&self) -> Option<&InvalidReason> {
        self.invalid_reason.as_ref()
    }

    pub fn version(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.version.as_str())
    }

    pub fn tool(&self) -> Option<ToolKind> {
        self.info.as_ref().map(|i| i.tool)
    }

    /// Attach the search context of the discovery pass that produced this manager.
    pub(crate) fn with_search_context(mut self, detected: &[PathBuf], searched: &[PathBuf]) -> Self {
        if let Some(info) = self.info.as_mut() {
            info.detected_paths = detected.to_vec();
            info.search_paths = searched.to_vec();
        }
        self
    }
}
