//! Mirror-aware downloader.
//!
//! Streams a release asset through an ordered list of mirrors into a `.part`
//! file next to the destination, verifies the byte count (and SHA-256 digest
//! when the registry published one), then renames it into place. The
//! partial file is removed on every failure path, including when the
//! download future is dropped.

use crate::cancel::CancellationToken;
use crate::config::NetworkConfig;
use crate::error::{DocconvError, MirrorFailure, Result};
use crate::models::{format_file_size, DownloadProgress, ReleaseAsset};
use crate::network::client::HttpClient;
use crate::network::mirrors::Mirror;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome of one mirror attempt that did not produce a file.
enum AttemptError {
    /// Transport failure or bad status; try the next mirror.
    Transport(String),
    /// The mirror served content that failed verification; try the next mirror.
    Integrity(DocconvError),
    /// Stop immediately (cancellation, local I/O failure).
    Fatal(DocconvError),
}

/// A `.part` file that deletes itself unless committed.
struct PartialFile {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    committed: bool,
}

impl PartialFile {
    async fn create(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::create(path)
            .await
            .map_err(|e| DocconvError::io_with_path(e, path))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            committed: false,
        })
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self.file.as_mut() {
            Some(file) => file
                .write_all(data)
                .await
                .map_err(|e| DocconvError::io_with_path(e, &self.path)),
            None => Err(DocconvError::Other("partial file already closed".into())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| DocconvError::io_with_path(e, &self.path))?;
            file.sync_all()
                .await
                .map_err(|e| DocconvError::io_with_path(e, &self.path))?;
        }
        Ok(())
    }

    async fn commit(mut self, destination: &Path) -> Result<()> {
        self.close().await?;
        tokio::fs::rename(&self.path, destination)
            .await
            .map_err(|e| DocconvError::io_with_path(e, destination))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        self.file.take();
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial download {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

/// Downloads release assets with mirror fallback.
pub struct MirrorDownloader {
    http: Arc<HttpClient>,
    progress_interval: Duration,
    read_timeout: Duration,
}

impl MirrorDownloader {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self {
            http,
            progress_interval: NetworkConfig::DOWNLOAD_PROGRESS_INTERVAL,
            read_timeout: NetworkConfig::DOWNLOAD_READ_TIMEOUT,
        }
    }

    /// Override the maximum silence allowed between two body chunks.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Download `asset` into `destination_dir`, trying `mirrors` in order.
    ///
    /// Progress events restart at zero for every mirror attempt and carry
    /// the mirror's id. Returns the path of the verified file.
    ///
    /// # Errors
    ///
    /// - [`DocconvError::AllMirrorsFailed`] when no mirror delivered the file
    /// - [`DocconvError::DownloadSizeMismatch`] or
    ///   [`DocconvError::DownloadChecksumMismatch`] when every mirror that
    ///   answered served content failing verification
    /// - [`DocconvError::DownloadCancelled`] when `cancel` fires
    pub async fn download(
        &self,
        asset: &ReleaseAsset,
        mirrors: &[Mirror],
        destination_dir: &Path,
        progress_tx: Option<mpsc::Sender<DownloadProgress>>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        cancel.check()?;

        let file_name = safe_file_name(&asset.name)?;
        tokio::fs::create_dir_all(destination_dir)
            .await
            .map_err(|e| DocconvError::io_with_path(e, destination_dir))?;
        let final_path = destination_dir.join(&file_name);
        let part_path =
            destination_dir.join(format!("{}{}", file_name, NetworkConfig::DOWNLOAD_TEMP_SUFFIX));

        let mut failures = Vec::new();
        let mut integrity_error = None;
        let mut transport_failed = false;

        for (index, mirror) in mirrors.iter().enumerate() {
            cancel.check()?;
            let url = mirror.url_for(&asset.download_url);
            info!("Downloading {} via {} ({}/{})", asset.name, mirror.id, index + 1, mirrors.len());

            let mut part = PartialFile::create(&part_path).await?;
            let attempt = Attempt {
                asset,
                mirror,
                index,
                count: mirrors.len(),
                progress_tx: progress_tx.as_ref(),
                cancel,
            };

            match self.fetch(&url, &attempt, &mut part).await {
                Ok(bytes) => {
                    part.commit(&final_path).await?;
                    info!("Downloaded {} to {}", format_file_size(bytes), final_path.display());
                    return Ok(final_path);
                }
                Err(AttemptError::Transport(message)) => {
                    warn!("Mirror {} failed: {}", mirror.id, message);
                    transport_failed = true;
                    failures.push(MirrorFailure {
                        mirror: mirror.id.clone(),
                        message,
                    });
                }
                Err(AttemptError::Integrity(err)) => {
                    warn!("Mirror {} served bad content: {}", mirror.id, err);
                    failures.push(MirrorFailure {
                        mirror: mirror.id.clone(),
                        message: err.to_string(),
                    });
                    integrity_error = Some(err);
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
            }
        }

        match integrity_error {
            Some(err) if !transport_failed => Err(err),
            _ => Err(DocconvError::AllMirrorsFailed { failures }),
        }
    }

    async fn fetch(
        &self,
        url: &str,
        attempt: &Attempt<'_>,
        part: &mut PartialFile,
    ) -> std::result::Result<u64, AttemptError> {
        let response = self
            .http
            .get(url, &[])
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Transport(format!("HTTP {}", status)));
        }

        let expected = if attempt.asset.size > 0 {
            Some(attempt.asset.size)
        } else {
            response.content_length()
        };
        let total = expected.unwrap_or(0);

        let started = Instant::now();
        let mut downloaded: u64 = 0;
        let mut hasher = Sha256::new();
        attempt.report(downloaded, total, 0.0).await;
        let mut last_report = Instant::now();

        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                next = tokio::time::timeout(self.read_timeout, stream.next()) => next,
                () = attempt.cancel.cancelled() => {
                    return Err(AttemptError::Fatal(DocconvError::DownloadCancelled));
                }
            };
            let chunk = match next {
                Err(_) => {
                    return Err(AttemptError::Transport(format!(
                        "no data received for {:?}",
                        self.read_timeout
                    )))
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => return Err(AttemptError::Transport(e.to_string())),
                Ok(Some(Ok(chunk))) => chunk,
            };

            if attempt.cancel.is_cancelled() {
                return Err(AttemptError::Fatal(DocconvError::DownloadCancelled));
            }

            downloaded += chunk.len() as u64;
            if let Some(expected) = expected {
                if downloaded > expected {
                    return Err(AttemptError::Integrity(DocconvError::DownloadSizeMismatch {
                        expected,
                        actual: downloaded,
                    }));
                }
            }

            part.write_all(&chunk).await.map_err(AttemptError::Fatal)?;
            hasher.update(&chunk);

            if last_report.elapsed() >= self.progress_interval {
                attempt.report(downloaded, total, speed(downloaded, started)).await;
                last_report = Instant::now();
            }
        }

        part.close().await.map_err(AttemptError::Fatal)?;
        attempt.report(downloaded, total, speed(downloaded, started)).await;

        if let Some(expected) = expected {
            if downloaded != expected {
                return Err(AttemptError::Integrity(DocconvError::DownloadSizeMismatch {
                    expected,
                    actual: downloaded,
                }));
            }
        }

        if let Some(expected_hash) = attempt.asset.sha256() {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected_hash) {
                return Err(AttemptError::Integrity(DocconvError::DownloadChecksumMismatch {
                    expected: expected_hash.to_string(),
                    actual,
                }));
            }
            debug!("SHA-256 verified for {}", attempt.asset.name);
        }

        Ok(downloaded)
    }
}

/// Context of one mirror attempt.
struct Attempt<'a> {
    asset: &'a ReleaseAsset,
    mirror: &'a Mirror,
    index: usize,
    count: usize,
    progress_tx: Option<&'a mpsc::Sender<DownloadProgress>>,
    cancel: &'a CancellationToken,
}

impl Attempt<'_> {
    async fn report(&self, downloaded: u64, total: u64, speed: f64) {
        if let Some(tx) = self.progress_tx {
            let progress =
                DownloadProgress::new(downloaded, total, speed, &self.mirror.id, self.index, self.count);
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(progress).await;
        }
    }
}

fn speed(bytes: u64, started: Instant) -> f64 {
    let secs = started.elapsed().as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / secs
    } else {
        0.0
    }
}

/// Reject asset names that would escape the destination directory.
fn safe_file_name(name: &str) -> Result<String> {
    let candidate = Path::new(name).file_name().and_then(|n| n.to_str());
    match candidate {
        Some(file_name) if file_name == name && !name.starts_with('.') => Ok(name.to_string()),
        _ => Err(DocconvError::Validation {
            field: "asset.name".into(),
            message: format!("'{}' is not a plain file name", name),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;

    const PAYLOAD: &[u8] = b"pretend this is a pandoc tarball";

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn asset(url: String, size: u64) -> ReleaseAsset {
        ReleaseAsset {
            name: "pandoc.tar.gz".into(),
            download_url: url,
            size,
            content_type: None,
            digest: None,
        }
    }

    fn downloader() -> MirrorDownloader {
        MirrorDownloader::new(Arc::new(HttpClient::for_downloads().unwrap()))
    }

    fn part_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with(".part"))
            .collect()
    }

    #[test]
    fn test_safe_file_name() {
        assert!(safe_file_name("pandoc-3.7-linux-amd64.tar.gz").is_ok());
        assert!(safe_file_name("../evil").is_err());
        assert!(safe_file_name("a/b.zip").is_err());
        assert!(safe_file_name(".hidden").is_err());
    }

    #[tokio::test]
    async fn test_downloads_via_direct_mirror() {
        let base = serve(Router::new().route("/files/pandoc.tar.gz", get(|| async { PAYLOAD }))).await;
        let dest = tempfile::TempDir::new().unwrap();

        let path = downloader()
            .download(
                &asset(format!("{}/files/pandoc.tar.gz", base), PAYLOAD.len() as u64),
                &[Mirror::direct()],
                dest.path(),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), PAYLOAD);
        assert!(part_files(dest.path()).is_empty());
    }

    #[tokio::test]
    async fn test_size_mismatch_leaves_no_file() {
        let base = serve(Router::new().route("/files/pandoc.tar.gz", get(|| async { PAYLOAD }))).await;
        let dest = tempfile::TempDir::new().unwrap();

        let err = downloader()
            .download(
                &asset(format!("{}/files/pandoc.tar.gz", base), PAYLOAD.len() as u64 + 10),
                &[Mirror::direct()],
                dest.path(),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DocconvError::DownloadSizeMismatch { .. }));
        assert!(!dest.path().join("pandoc.tar.gz").exists());
        assert!(part_files(dest.path()).is_empty());
    }

    #[tokio::test]
    async fn test_checksum_mismatch() {
        let base = serve(Router::new().route("/files/pandoc.tar.gz", get(|| async { PAYLOAD }))).await;
        let dest = tempfile::TempDir::new().unwrap();
        let mut bad = asset(format!("{}/files/pandoc.tar.gz", base), PAYLOAD.len() as u64);
        bad.digest = Some(format!("sha256:{}", "0".repeat(64)));

        let err = downloader()
            .download(&bad, &[Mirror::direct()], dest.path(), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DocconvError::DownloadChecksumMismatch { .. }));

        let mut good = bad.clone();
        good.digest = Some(format!("sha256:{}", hex::encode(Sha256::digest(PAYLOAD))));
        downloader()
            .download(&good, &[Mirror::direct()], dest.path(), None, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_http_errors_on_every_mirror() {
        let base = serve(Router::new()).await;
        let dest = tempfile::TempDir::new().unwrap();
        let mirrors = vec![
            Mirror::new("proxy", format!("{}/proxy/", base)).unwrap(),
            Mirror::direct(),
        ];

        let err = downloader()
            .download(
                &asset(format!("{}/missing.tar.gz", base), 10),
                &mirrors,
                dest.path(),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            DocconvError::AllMirrorsFailed { failures } => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].mirror, "proxy");
                assert!(failures[1].message.contains("404"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(part_files(dest.path()).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dest = tempfile::TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = downloader()
            .download(
                &asset("http://127.0.0.1:9/pandoc.tar.gz".into(), 10),
                &[Mirror::direct()],
                dest.path(),
                None,
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DocconvError::DownloadCancelled));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_stalled_mirror() {
        // One chunk, then the body never continues.
        let stalled = || async {
            let first = futures::stream::once(async { Ok::<_, std::io::Error>(vec![1u8; 16]) });
            axum::body::Body::from_stream(first.chain(futures::stream::pending()))
        };
        let base = serve(Router::new().route("/files/pandoc.tar.gz", get(stalled))).await;
        let dest = tempfile::TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = downloader()
            .download(
                &asset(format!("{}/files/pandoc.tar.gz", base), 1024),
                &[Mirror::direct()],
                dest.path(),
                None,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DocconvError::DownloadCancelled));
        assert!(started.elapsed() < NetworkConfig::DOWNLOAD_READ_TIMEOUT / 4);
        assert!(part_files(dest.path()).is_empty());
        assert!(!dest.path().join("pandoc.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_complete() {
        let big: &'static [u8] = Box::leak(vec![7u8; 256 * 1024].into_boxed_slice());
        let base = serve(Router::new().route("/big.tar.gz", get(move || async move { big }))).await;
        let dest = tempfile::TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::channel(1024);

        let collector = tokio::spawn(async move {
            let mut events = Vec::new();
            while let Some(p) = rx.recv().await {
                events.push(p);
            }
            events
        });

        let mut big_asset = asset(format!("{}/big.tar.gz", base), big.len() as u64);
        big_asset.name = "big.tar.gz".into();
        downloader()
            .download(&big_asset, &[Mirror::direct()], dest.path(), Some(tx), &CancellationToken::new())
            .await
            .unwrap();

        let events = collector.await.unwrap();
        assert!(!events.is_empty());
        for pair in events.windows(2) {
            assert!(pair[1].downloaded >= pair[0].downloaded);
        }
        let last = events.last().unwrap();
        assert_eq!(last.downloaded, big.len() as u64);
        assert_eq!(last.percentage, 100.0);
        assert!(events.iter().all(|p| p.downloaded <= p.total));
    }
}
