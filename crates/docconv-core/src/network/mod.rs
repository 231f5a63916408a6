//! Network access: HTTP client, release registry, mirrors and downloads.

mod client;
mod download;
mod mirrors;
mod registry;

pub use client::{extract_domain, HttpClient, RateLimitState};
pub use download::MirrorDownloader;
pub use mirrors::{default_mirrors, effective_mirrors, Mirror};
pub use registry::ReleaseRegistry;
