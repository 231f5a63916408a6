//! Upstream release metadata.
//!
//! [`GitHubRelease`] mirrors the registry's wire format; [`Release`] is the
//! validated, read-only form handed to the rest of the core.

use crate::error::{DocconvError, Result};
use crate::install::ArchiveFormat;
use crate::version::normalize_version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Release asset as returned by the registry API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

/// Release as returned by the registry API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
    /// Declared size in bytes; 0 when the registry did not report one.
    pub size: u64,
    pub content_type: Option<String>,
    /// Content digest in `algorithm:hex` form, e.g. `sha256:ab12...`.
    pub digest: Option<String>,
}

impl ReleaseAsset {
    /// Expected SHA-256 hex digest, when the registry published one.
    pub fn sha256(&self) -> Option<&str> {
        self.digest
            .as_deref()
            .and_then(|d| d.strip_prefix("sha256:"))
            .filter(|hex| !hex.is_empty())
    }
}

/// A published upstream release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Tag exactly as published (e.g. `v0.13.1` or `3.7.0.2`).
    pub tag: String,
    /// Normalized version derived from the tag.
    pub version: String,
    pub name: String,
    pub notes: String,
    pub published_at: Option<DateTime<Utc>>,
    pub prerelease: bool,
    pub html_url: Option<String>,
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// First installable asset matching the platform patterns, in pattern order.
    ///
    /// Only archives the installer can unpack qualify, so installers such as
    /// `.msi`, `.pkg` or `.deb` are skipped even when their names match.
    pub fn find_asset(&self, patterns: &[&str]) -> Option<&ReleaseAsset> {
        patterns.iter().find_map(|pattern| {
            self.assets.iter().find(|asset| {
                asset.name.contains(pattern)
                    && ArchiveFormat::from_file_name(&asset.name).is_some()
            })
        })
    }
}

impl TryFrom<GitHubRelease> for Release {
    type Error = DocconvError;

    fn try_from(raw: GitHubRelease) -> Result<Self> {
        let tag = raw.tag_name.trim().to_string();
        if tag.is_empty() {
            return Err(DocconvError::RegistryMalformedResponse {
                message: "release has an empty tag".into(),
            });
        }

        let published_at = match raw.published_at.as_deref() {
            Some(ts) => Some(
                DateTime::parse_from_rfc3339(ts)
                    .map_err(|e| DocconvError::RegistryMalformedResponse {
                        message: format!("invalid publish timestamp '{}': {}", ts, e),
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let assets = raw
            .assets
            .into_iter()
            .map(|a| ReleaseAsset {
                name: a.name,
                download_url: a.download_url,
                size: a.size,
                content_type: a.content_type,
                digest: a.digest,
            })
            .collect();

        Ok(Self {
            version: normalize_version(&tag),
            name: raw.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| tag.clone()),
            notes: raw.body.unwrap_or_default(),
            tag,
            published_at,
            prerelease: raw.prerelease,
            html_url: raw.html_url,
            assets,
        })
    }
}
