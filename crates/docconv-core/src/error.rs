//! Error types for the docconv toolchain core.
//!
//! Every failure the core can produce is a typed variant here. Each variant
//! belongs to one [`ErrorKind`] so the UI layer can decide how to present it
//! (offer a retry, suggest a mirror switch, ask for a different path, ...)
//! without matching on individual variants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of an error, used for presentation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No usable tool or release was found.
    NotFound,
    /// Registry or mirror could not be reached. Never auto-retried by the core.
    Network,
    /// Downloaded or extracted content does not match what was expected.
    Corruption,
    /// The caller supplied a bad path or parameter.
    InvalidInput,
    /// A binary exists but failed to validate.
    ProbeFailure,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// Filesystem, serialization or other local failure.
    Internal,
}

/// One failed attempt against a single download mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorFailure {
    pub mirror: String,
    pub message: String,
}

impl fmt::Display for MirrorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.mirror, self.message)
    }
}

fn summarize_failures(failures: &[MirrorFailure]) -> String {
    if failures.is_empty() {
        return "no mirrors configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type for the docconv core.
#[derive(Debug, Error)]
pub enum DocconvError {
    // Registry errors
    #[error("Release registry unreachable: {message}")]
    RegistryUnreachable { message: String },

    #[error("Release registry rate limited, retry after {retry_after_secs:?} seconds")]
    RegistryRateLimited { retry_after_secs: Option<u64> },

    #[error("Release registry returned a malformed response: {message}")]
    RegistryMalformedResponse { message: String },

    #[error("No {tool} release tagged {version}")]
    ReleaseNotFound { tool: String, version: String },

    #[error("No {tool} release asset for platform {platform}")]
    NoCompatibleAsset { tool: String, platform: String },

    // Download errors
    #[error("All mirrors failed: {}", summarize_failures(.failures))]
    AllMirrorsFailed { failures: Vec<MirrorFailure> },

    #[error("Downloaded size mismatch: expected {expected} bytes, got {actual}")]
    DownloadSizeMismatch { expected: u64, actual: u64 },

    #[error("Downloaded checksum mismatch: expected {expected}, got {actual}")]
    DownloadChecksumMismatch { expected: String, actual: String },

    #[error("Download cancelled")]
    DownloadCancelled,

    // Installation errors
    #[error("Failed to extract tool archive: {message}")]
    InstallExtractionFailed { message: String },

    #[error("Permission denied while installing to {path}")]
    InstallPermissionDenied { path: PathBuf },

    #[error("Installed binary {path} failed validation: {reason}")]
    InstallProbeFailed { path: PathBuf, reason: String },

    // Discovery errors
    #[error("Invalid custom path {path}: {reason}")]
    InvalidCustomPath { path: PathBuf, reason: String },

    #[error("Custom path {path} failed validation: {reason}")]
    CustomPathProbeFailed { path: PathBuf, reason: String },

    #[error("No working {tool} found ({searched} locations searched)")]
    ToolNotFound { tool: String, searched: usize },

    #[error("Cannot switch to unavailable source {source_desc}")]
    SourceUnavailable { source_desc: String },

    // Conversion errors
    #[error("Output format '{format}' is not supported by the active converter")]
    UnsupportedFormat { format: String },

    #[error("PDF engine '{engine}' is not available")]
    PdfEngineUnavailable { engine: String },

    #[error("Conversion failed: {message}")]
    ConversionFailed { message: String },

    // Local errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid parameter {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias using DocconvError.
pub type Result<T> = std::result::Result<T, DocconvError>;

impl From<std::io::Error> for DocconvError {
    fn from(err: std::io::Error) -> Self {
        DocconvError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for DocconvError {
    fn from(err: serde_json::Error) -> Self {
        DocconvError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<crate::cancel::CancelledError> for DocconvError {
    fn from(_: crate::cancel::CancelledError) -> Self {
        DocconvError::DownloadCancelled
    }
}

impl DocconvError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        DocconvError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocconvError::RegistryUnreachable { .. }
            | DocconvError::RegistryRateLimited { .. }
            | DocconvError::AllMirrorsFailed { .. }
            | DocconvError::Network { .. } => ErrorKind::Network,

            DocconvError::ReleaseNotFound { .. }
            | DocconvError::NoCompatibleAsset { .. }
            | DocconvError::ToolNotFound { .. } => ErrorKind::NotFound,

            DocconvError::RegistryMalformedResponse { .. }
            | DocconvError::DownloadSizeMismatch { .. }
            | DocconvError::DownloadChecksumMismatch { .. }
            | DocconvError::InstallExtractionFailed { .. } => ErrorKind::Corruption,

            DocconvError::InvalidCustomPath { .. }
            | DocconvError::SourceUnavailable { .. }
            | DocconvError::UnsupportedFormat { .. }
            | DocconvError::PdfEngineUnavailable { .. }
            | DocconvError::Validation { .. } => ErrorKind::InvalidInput,

            DocconvError::InstallProbeFailed { .. }
            | DocconvError::CustomPathProbeFailed { .. } => ErrorKind::ProbeFailure,

            DocconvError::DownloadCancelled => ErrorKind::Cancelled,

            DocconvError::InstallPermissionDenied { .. }
            | DocconvError::ConversionFailed { .. }
            | DocconvError::Io { .. }
            | DocconvError::Json { .. }
            | DocconvError::Config { .. }
            | DocconvError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Network/connectivity error
    /// - -32001: Tool or release not found
    /// - -32002: Corrupted download or archive
    /// - -32003: Installation or conversion failed
    /// - -32004: Cancelled by user
    /// - -32005: Validation error (bad path, bad parameter)
    pub fn to_rpc_error_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Network => -32000,
            ErrorKind::NotFound => -32001,
            ErrorKind::Corruption => -32002,
            ErrorKind::ProbeFailure => -32003,
            ErrorKind::Cancelled => -32004,
            ErrorKind::InvalidInput => -32005,
            ErrorKind::Internal => match self {
                DocconvError::InstallPermissionDenied { .. }
                | DocconvError::ConversionFailed { .. } => -32003,
                _ => -32603,
            },
        }
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// The core itself never retries; this is a hint for the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DocconvError::RegistryUnreachable { .. }
                | DocconvError::RegistryRateLimited { .. }
                | DocconvError::AllMirrorsFailed { .. }
                | DocconvError::Network { .. }
        )
    }
}
