//! Browser-gated spreadsheet downloads
//!
//! A bounded pool runs one download per id. Ids that fail in the first pass
//! are retried exactly once; whatever still fails is reported, not retried.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::crawling::session_bootstrapper::SessionError;
use crate::infrastructure::{FetchError, FetchRequest, PageFetcher};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("empty download from {0}")]
    Empty(String),

    #[error("cannot write {path}: {message}")]
    Io { path: String, message: String },
}

/// Outcome of both passes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: Vec<PathBuf>,
    /// ids that failed in the retry pass too
    pub failed: Vec<String>,
}

pub struct DownloadPool {
    workers: usize,
}

impl DownloadPool {
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub async fn run<F, Fut>(&self, ids: Vec<String>, download: F) -> DownloadReport
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PathBuf, DownloadError>> + Send + 'static,
    {
        let download = Arc::new(download);
        let total = ids.len();

        let (mut downloaded, failed) = self.pass(ids, Arc::clone(&download)).await;
        if failed.is_empty() {
            info!("📥 downloads complete: {}/{}", downloaded.len(), total);
            return DownloadReport { downloaded, failed };
        }

        info!("🔁 retrying {} failed downloads", failed.len());
        let (mut retried, still_failed) = self.pass(failed, download).await;
        downloaded.append(&mut retried);

        if still_failed.is_empty() {
            info!("✅ all downloads succeeded after retry ({})", downloaded.len());
        } else {
            warn!("⚠️ downloads still failing after retry: {:?}", still_failed);
        }
        DownloadReport {
            downloaded,
            failed: still_failed,
        }
    }

    async fn pass<F, Fut>(&self, ids: Vec<String>, download: Arc<F>) -> (Vec<PathBuf>, Vec<String>)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PathBuf, DownloadError>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let tasks: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let semaphore = Arc::clone(&semaphore);
                let download = Arc::clone(&download);
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return (id, Err(DownloadError::Io {
                            path: String::new(),
                            message: "download pool closed".to_string(),
                        }));
                    };
                    let result = download(id.clone()).await;
                    (id, result)
                })
            })
            .collect();

        let mut downloaded = Vec::new();
        let mut failed = Vec::new();
        for joined in futures::future::join_all(tasks).await {
            match joined {
                Ok((id, Ok(path))) => {
                    debug!("📥 {} → {}", id, path.display());
                    downloaded.push(path);
                }
                Ok((id, Err(e))) => {
                    warn!("⚠️ download failed for {}: {}", id, e);
                    failed.push(id);
                }
                Err(e) => error!("❌ download task terminated abnormally: {}", e),
            }
        }
        (downloaded, failed)
    }
}

/// Send `request` and write the body to `path`, creating parent directories.
pub async fn save_download<F: PageFetcher + ?Sized>(
    fetcher: &F,
    request: FetchRequest,
    path: &Path,
) -> Result<PathBuf, DownloadError> {
    let url = request.url.clone();
    let response = fetcher.request(request).await?.error_for_status(&url)?;
    if response.body.is_empty() {
        return Err(DownloadError::Empty(url));
    }

    let io_error = |e: std::io::Error| DownloadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(path, &response.body).await.map_err(io_error)?;
    info!("💾 saved {} ({} bytes)", path.display(), response.body.len());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[tokio::test]
    async fn failed_ids_are_retried_exactly_once() {
        let attempts: Arc<Mutex<HashMap<String, u32>>> = Arc::default();
        let counter = Arc::clone(&attempts);

        let report = DownloadPool::new(3)
            .run(
                vec!["ok".into(), "flaky".into(), "broken".into()],
                move |id: String| {
                    let counter = Arc::clone(&counter);
                    async move {
                        let attempt = {
                            let mut map = counter.lock().unwrap();
                            let n = map.entry(id.clone()).or_insert(0);
                            *n += 1;
                            *n
                        };
                        match (id.as_str(), attempt) {
                            ("ok", _) | ("flaky", 2) => Ok(PathBuf::from(format!("{id}.xlsx"))),
                            _ => Err(DownloadError::Empty(id)),
                        }
                    }
                },
            )
            .await;

        let mut downloaded = report.downloaded.clone();
        downloaded.sort();
        assert_eq!(downloaded, vec![PathBuf::from("flaky.xlsx"), PathBuf::from("ok.xlsx")]);
        assert_eq!(report.failed, vec!["broken".to_string()]);

        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts["ok"], 1);
        assert_eq!(attempts["flaky"], 2);
        assert_eq!(attempts["broken"], 2);
    }

    #[tokio::test]
    async fn save_download_writes_body() {
        use crate::infrastructure::FetchResponse;
        use async_trait::async_trait;

        struct Fixed(u16, &'static [u8]);

        #[async_trait]
        impl PageFetcher for Fixed {
            async fn request(&self, _request: FetchRequest) -> Result<FetchResponse, FetchError> {
                Ok(FetchResponse { status: self.0, body: self.1.to_vec() })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opinion").join("PRC_A,2501010000.xlsx");
        let saved = save_download(&Fixed(200, b"PK\x03\x04"), FetchRequest::get("https://x/y"), &path)
            .await
            .unwrap();
        assert_eq!(std::fs::read(saved).unwrap(), b"PK\x03\x04");

        let err = save_download(&Fixed(403, b"denied"), FetchRequest::get("https://x/y"), &path)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Fetch(FetchError::Status { status: 403, .. })));

        let err = save_download(&Fixed(200, b""), FetchRequest::get("https://x/y"), &path)
            .await
            .unwrap_err();
        assert_eq!(err, DownloadError::Empty("https://x/y".into()));
    }
}
