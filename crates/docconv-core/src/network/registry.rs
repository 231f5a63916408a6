//! Release registry client.
//!
//! Reads release metadata from a GitHub-compatible releases API. Responses
//! are cached in memory for [`NetworkConfig::RELEASES_TTL`]; nothing is
//! persisted and nothing is retried here.

use crate::config::{NetworkConfig, ToolKind};
use crate::error::{DocconvError, Result};
use crate::models::{GitHubRelease, Release};
use crate::network::client::{retry_after_secs, HttpClient};
use mini_moka::sync::Cache;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const ACCEPT_HEADER: (&str, &str) = ("Accept", "application/vnd.github+json");

/// Client for the upstream release index.
pub struct ReleaseRegistry {
    http: Arc<HttpClient>,
    base_url: String,
    latest: Cache<ToolKind, Release>,
    pages: Cache<(ToolKind, u32, u32), Vec<Release>>,
}

impl ReleaseRegistry {
    /// Registry client for the public GitHub API.
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self::with_base_url(http, NetworkConfig::GITHUB_API_BASE, NetworkConfig::RELEASES_TTL)
    }

    /// Registry client for any GitHub-compatible API root.
    pub fn with_base_url(http: Arc<HttpClient>, base_url: &str, ttl: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            latest: Cache::builder().time_to_live(ttl).max_capacity(8).build(),
            pages: Cache::builder().time_to_live(ttl).max_capacity(32).build(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Latest published release of `tool`.
    ///
    /// # Errors
    ///
    /// - [`DocconvError::RegistryUnreachable`] on transport errors and
    ///   unexpected HTTP statuses
    /// - [`DocconvError::RegistryRateLimited`] on HTTP 403/429
    /// - [`DocconvError::RegistryMalformedResponse`] when the payload is not a release
    pub async fn get_latest_release(&self, tool: ToolKind, force_refresh: bool) -> Result<Release> {
        if !force_refresh {
            if let Some(release) = self.latest.get(&tool) {
                debug!("Using cached latest release for {}: {}", tool, release.tag);
                return Ok(release);
            }
        }

        let url = format!("{}/repos/{}/releases/latest", self.base_url, tool.github_repo());
        let raw: GitHubRelease = self.fetch_json(&url).await?;
        let release = Release::try_from(raw)?;

        info!("Latest {} release: {}", tool, release.tag);
        self.latest.insert(tool, release.clone());
        Ok(release)
    }

    /// One page of the release history, newest first. Drafts are omitted.
    pub async fn list_releases(
        &self,
        tool: ToolKind,
        page: u32,
        per_page: u32,
        force_refresh: bool,
    ) -> Result<Vec<Release>> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let key = (tool, page, per_page);

        if !force_refresh {
            if let Some(releases) = self.pages.get(&key) {
                return Ok(releases);
            }
        }

        let url = format!(
            "{}/repos/{}/releases?per_page={}&page={}",
            self.base_url,
            tool.github_repo(),
            per_page,
            page
        );
        let raw: Vec<GitHubRelease> = self.fetch_json(&url).await?;
        let releases = raw
            .into_iter()
            .filter(|r| !r.draft)
            .map(Release::try_from)
            .collect::<Result<Vec<_>>>()?;

        debug!("Fetched {} {} releases (page {})", releases.len(), tool, page);
        self.pages.insert(key, releases.clone());
        Ok(releases)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url, &[ACCEPT_HEADER])
            .await
            .map_err(|e| DocconvError::RegistryUnreachable {
                message: e.to_string(),
            })?;
        let response = self.check_status(response, url)?;

        let body = response
            .text()
            .await
            .map_err(|e| DocconvError::RegistryUnreachable {
                message: format!("Failed to read response from {}: {}", url, e),
            })?;

        serde_json::from_str(&body).map_err(|e| DocconvError::RegistryMalformedResponse {
            message: format!("{} returned unexpected JSON: {}", url, e),
        })
    }

    fn check_status(&self, response: Response, url: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after_secs(&response)
                .or_else(|| self.http.rate_limit_state().seconds_until_reset());
            warn!("Release registry rate limited ({}), retry after {:?}s", status, retry_after);
            return Err(DocconvError::RegistryRateLimited {
                retry_after_secs: retry_after,
            });
        }

        Err(DocconvError::RegistryUnreachable {
            message: format!("HTTP {} from {}", status, url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LATEST_JSON: &str = r#"{
        "tag_name": "3.1.2",
        "name": "pandoc 3.1.2",
        "body": "Release notes",
        "published_at": "2023-03-11T10:00:00Z",
        "assets": [{
            "name": "pandoc-3.1.2-linux-amd64.tar.gz",
            "size": 31000000,
            "browser_download_url": "https://github.com/jgm/pandoc/releases/download/3.1.2/pandoc-3.1.2-linux-amd64.tar.gz"
        }]
    }"#;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn registry(base: &str) -> ReleaseRegistry {
        let http = Arc::new(HttpClient::new().unwrap());
        ReleaseRegistry::with_base_url(http, base, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_latest_release_is_parsed_and_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/repos/jgm/pandoc/releases/latest",
            get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { LATEST_JSON }
            }),
        );
        let base = serve(router).await;
        let registry = registry(&base);

        let release = registry.get_latest_release(ToolKind::Pandoc, false).await.unwrap();
        assert_eq!(release.version, "3.1.2");
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].size, 31_000_000);

        registry.get_latest_release(ToolKind::Pandoc, false).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        registry.get_latest_release(ToolKind::Pandoc, true).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rate_limited_with_retry_after() {
        let router = Router::new().route(
            "/repos/jgm/pandoc/releases/latest",
            get(|| async {
                let mut headers = HeaderMap::new();
                headers.insert("Retry-After", HeaderValue::from_static("60"));
                (StatusCode::TOO_MANY_REQUESTS, headers, "slow down")
            }),
        );
        let base = serve(router).await;

        let err = registry(&base)
            .get_latest_release(ToolKind::Pandoc, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocconvError::RegistryRateLimited {
                retry_after_secs: Some(60)
            }
        ));
    }

    #[tokio::test]
    async fn test_forbidden_is_rate_limited() {
        let router = Router::new().route(
            "/repos/typst/typst/releases/latest",
            get(|| async { (StatusCode::FORBIDDEN, "API rate limit exceeded") }),
        );
        let base = serve(router).await;

        let err = registry(&base)
            .get_latest_release(ToolKind::Typst, false)
            .await
            .unwrap_err();
        assert!(matches!(err, DocconvError::RegistryRateLimited { .. }));
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let router = Router::new().route(
            "/repos/jgm/pandoc/releases/latest",
            get(|| async { r#"{"message": "weird"}"# }),
        );
        let base = serve(router).await;

        let err = registry(&base)
            .get_latest_release(ToolKind::Pandoc, false)
            .await
            .unwrap_err();
        assert!(matches!(err, DocconvError::RegistryMalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_registry() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = registry(&format!("http://{}", addr))
            .get_latest_release(ToolKind::Pandoc, false)
            .await
            .unwrap_err();
        assert!(matches!(err, DocconvError::RegistryUnreachable { .. }));
    }

    #[tokio::test]
    async fn test_not_found_is_unreachable() {
        let base = serve(Router::new()).await;
        let err = registry(&base)
            .get_latest_release(ToolKind::Pandoc, false)
            .await
            .unwrap_err();
        assert!(matches!(err, DocconvError::RegistryUnreachable { .. }));
    }

    #[tokio::test]
    async fn test_list_releases_skips_drafts() {
        let router = Router::new().route(
            "/repos/jgm/pandoc/releases",
            get(|| async {
                r#"[
                    {"tag_name": "3.2", "draft": true, "assets": []},
                    {"tag_name": "3.1.2", "assets": []},
                    {"tag_name": "3.1.1", "prerelease": true, "assets": []}
                ]"#
            }),
        );
        let base = serve(router).await;

        let releases = registry(&base)
            .list_releases(ToolKind::Pandoc, 1, 30, false)
            .await
            .unwrap();
        let tags: Vec<_> = releases.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["3.1.2", "3.1.1"]);
        assert!(releases[1].prerelease);
    }
}
