//! Download mirrors.
//!
//! A mirror is a URL prefix placed in front of the asset's original
//! download URL (`https://gh.ddlc.top/https://github.com/...`). The empty
//! prefix fetches from the origin directly.

use crate::error::{DocconvError, Result};
use serde::{Deserialize, Serialize};

/// One download endpoint, tried in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    /// Short identifier reported in progress events and errors.
    pub id: String,
    /// Prefix prepended to the original URL; empty for direct access.
    pub prefix: String,
}

impl Mirror {
    /// Build a mirror, rejecting prefixes that are not absolute http(s) URLs.
    pub fn new(id: impl Into<String>, prefix: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let prefix = prefix.into();
        if id.trim().is_empty() {
            return Err(DocconvError::Validation {
                field: "mirror.id".into(),
                message: "mirror id must not be empty".into(),
            });
        }
        if !prefix.is_empty() {
            let parsed = url::Url::parse(&prefix).map_err(|e| DocconvError::Validation {
                field: "mirror.prefix".into(),
                message: format!("'{}' is not a valid URL: {}", prefix, e),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(DocconvError::Validation {
                    field: "mirror.prefix".into(),
                    message: format!("'{}' must use http or https", prefix),
                });
            }
        }
        Ok(Self { id, prefix })
    }

    /// Direct access to the asset's origin.
    pub fn direct() -> Self {
        Self {
            id: "github".into(),
            prefix: String::new(),
        }
    }

    pub fn is_direct(&self) -> bool {
        self.prefix.is_empty()
    }

    /// URL to fetch `original_url` through this mirror.
    pub fn url_for(&self, original_url: &str) -> String {
        format!("{}{}", self.prefix, original_url)
    }
}

/// Built-in mirror list: public GitHub proxies first, the origin last.
pub fn default_mirrors() -> Vec<Mirror> {
    vec![
        Mirror {
            id: "gitmirror".into(),
            prefix: "https://hub.gitmirror.com/".into(),
        },
        Mirror {
            id: "ddlc".into(),
            prefix: "https://gh.ddlc.top/".into(),
        },
        Mirror::direct(),
    ]
}

/// Mirrors to use for a download given the user's preference.
///
/// With mirrors disabled only the configured direct entries remain; when
/// none are configured the origin is used.
pub fn effective_mirrors(configured: &[Mirror], use_mirrors: bool) -> Vec<Mirror> {
    if use_mirrors {
        return configured.to_vec();
    }
    let direct: Vec<Mirror> = configured.iter().filter(|m| m.is_direct()).cloned().collect();
    if direct.is_empty() {
        vec![Mirror::direct()]
    } else {
        direct
    }
}
