//! Worker-Pool Importer
//!
//! Two tiers connected by a bounded row queue:
//!
//! ```text
//!  page queue (pre-filled, closed)      row queue (bounded)
//!  ┌──────────┐   fetch workers ×N    ┌──────────┐   persist workers ×M
//!  │ 1 2 3 …  │ ───────────────────▶  │ row row …│ ──────────────────▶ store
//!  └──────────┘                       └──────────┘
//! ```
//!
//! A supervisor task joins every fetch worker and only then drops the last
//! row sender, which is the end-of-stream signal for the persist tier.
//! Each persisted row is isolated: an error or a panic inside the sink is
//! counted as a failure and the worker moves on to the next row.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::crawling::collector::CollectorError;
use crate::crawling::html::HtmlError;
use crate::crawling::proposer_resolver::ResolveError;
use crate::domain::{DomainError, StoreError};
use crate::infrastructure::FetchError;
use crate::infrastructure::config::ApiConfig;

/// Per-row failure. Every variant is counted and logged; none stops the pool.
#[derive(Error, Debug)]
pub enum RowError {
    #[error("data quality: {0}")]
    DataQuality(String),

    #[error("transient: {0}")]
    Transient(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error("unexpected fault: {0}")]
    UnexpectedFault(String),
}

impl From<FetchError> for RowError {
    fn from(e: FetchError) -> Self {
        Self::Transient(e.to_string())
    }
}

impl From<CollectorError> for RowError {
    fn from(e: CollectorError) -> Self {
        Self::Transient(e.to_string())
    }
}

impl From<HtmlError> for RowError {
    fn from(e: HtmlError) -> Self {
        Self::DataQuality(e.to_string())
    }
}

impl From<DomainError> for RowError {
    fn from(e: DomainError) -> Self {
        Self::DataQuality(e.to_string())
    }
}

/// Fetch tier input: one call per page number.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Row: Send + 'static;

    async fn fetch_page(&self, page: u32) -> Result<Vec<Self::Row>, CollectorError>;
}

/// Persist tier output: normalize, resolve and write one row.
#[async_trait]
pub trait RowSink<R>: Send + Sync {
    async fn persist(&self, row: R) -> Result<(), RowError>;
}

/// Jobs per synthetic page in a [`JobBatch`]
pub const JOB_CHUNK_SIZE: usize = 100;

/// Pre-extracted jobs (e.g. spreadsheet rows) served as pages, so they go
/// through the same pool as API rows.
pub struct JobBatch<R> {
    chunks: Mutex<Vec<Option<Vec<R>>>>,
}

impl<R: Send + 'static> JobBatch<R> {
    pub fn new(jobs: Vec<R>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let mut chunks = Vec::new();
        let mut jobs = jobs.into_iter().peekable();
        while jobs.peek().is_some() {
            chunks.push(Some(jobs.by_ref().take(chunk_size).collect()));
        }
        Self {
            chunks: Mutex::new(chunks),
        }
    }

    pub async fn total_pages(&self) -> u32 {
        u32::try_from(self.chunks.lock().await.len()).unwrap_or(u32::MAX)
    }
}

#[async_trait]
impl<R: Send + 'static> PageSource for JobBatch<R> {
    type Row = R;

    async fn fetch_page(&self, page: u32) -> Result<Vec<R>, CollectorError> {
        let index = page.saturating_sub(1) as usize;
        let mut chunks = self.chunks.lock().await;
        Ok(chunks.get_mut(index).and_then(Option::take).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    pub total_pages: u32,
    pub fetch_workers: usize,
    pub persist_workers: usize,
    pub row_queue_capacity: usize,
}

impl ImportOptions {
    #[must_use]
    pub fn from_api(api: &ApiConfig, total_pages: u32) -> Self {
        Self {
            total_pages,
            fetch_workers: api.fetch_workers,
            persist_workers: api.persist_workers,
            row_queue_capacity: api.row_queue_capacity,
        }
    }

    /// Options for an in-memory job list: one fetch worker is enough.
    #[must_use]
    pub fn for_jobs(total_pages: u32, persist_workers: usize) -> Self {
        Self {
            total_pages,
            fetch_workers: 1,
            persist_workers,
            row_queue_capacity: 1_000,
        }
    }
}

/// Concurrently updated counters
#[derive(Debug, Default)]
pub struct ImportStats {
    fetched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl ImportStats {
    fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counters read once after drain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub fetched: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// pages whose fetch failed with something other than `NoData`
    pub failed_pages: Vec<u32>,
    pub elapsed: Duration,
}

impl ImportSummary {
    #[must_use]
    pub fn loss_rate(&self) -> f64 {
        if self.fetched == 0 {
            0.0
        } else {
            self.failed as f64 / self.fetched as f64 * 100.0
        }
    }

    pub fn log(&self, label: &str) {
        info!(
            "📊 {} - fetched: {}, succeeded: {}, failed: {}, Loss rate: {:.2}%, failed pages: {}, elapsed: {:.1}s",
            label,
            self.fetched,
            self.succeeded,
            self.failed,
            self.loss_rate(),
            self.failed_pages.len(),
            self.elapsed.as_secs_f64()
        );
    }
}

pub struct Importer {
    options: ImportOptions,
}

impl Importer {
    #[must_use]
    pub const fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    /// Run both tiers to completion.
    pub async fn run<S, K>(&self, source: Arc<S>, sink: Arc<K>) -> ImportSummary
    where
        S: PageSource + 'static,
        K: RowSink<S::Row> + 'static,
    {
        let started = Instant::now();
        let options = self.options;
        let stats = Arc::new(ImportStats::default());
        let failed_pages = Arc::new(Mutex::new(Vec::new()));

        if options.total_pages == 0 {
            debug!("nothing to import");
            return ImportSummary::default();
        }

        // Page queue: capacity == total pages, filled and closed before any worker starts.
        let (page_tx, page_rx) = mpsc::channel(options.total_pages as usize);
        for page in 1..=options.total_pages {
            if page_tx.send(page).await.is_err() {
                break;
            }
        }
        drop(page_tx);
        let page_rx = Arc::new(Mutex::new(page_rx));

        let (row_tx, row_rx) = mpsc::channel::<S::Row>(options.row_queue_capacity.max(1));
        let row_rx = Arc::new(Mutex::new(row_rx));

        let fetch_handles: Vec<_> = (0..options.fetch_workers.max(1))
            .map(|worker_id| {
                tokio::spawn(fetch_worker(
                    worker_id,
                    Arc::clone(&source),
                    Arc::clone(&page_rx),
                    row_tx.clone(),
                    Arc::clone(&stats),
                    Arc::clone(&failed_pages),
                ))
            })
            .collect();

        let supervisor = tokio::spawn(async move {
            for handle in fetch_handles {
                if let Err(e) = handle.await {
                    error!("❌ fetch worker terminated abnormally: {}", e);
                }
            }
            drop(row_tx);
            debug!("row queue closed");
        });

        let persist_handles: Vec<_> = (0..options.persist_workers.max(1))
            .map(|worker_id| {
                tokio::spawn(persist_worker(
                    worker_id,
                    Arc::clone(&sink),
                    Arc::clone(&row_rx),
                    Arc::clone(&stats),
                ))
            })
            .collect();

        if let Err(e) = supervisor.await {
            error!("❌ import supervisor terminated abnormally: {}", e);
        }
        for handle in persist_handles {
            if let Err(e) = handle.await {
                error!("❌ persist worker terminated abnormally: {}", e);
            }
        }

        let mut failed_pages = std::mem::take(&mut *failed_pages.lock().await);
        failed_pages.sort_unstable();
        ImportSummary {
            fetched: stats.fetched.load(Ordering::Relaxed),
            succeeded: stats.succeeded.load(Ordering::Relaxed),
            failed: stats.failed.load(Ordering::Relaxed),
            failed_pages,
            elapsed: started.elapsed(),
        }
    }
}

async fn fetch_worker<S: PageSource>(
    worker_id: usize,
    source: Arc<S>,
    pages: Arc<Mutex<mpsc::Receiver<u32>>>,
    rows: mpsc::Sender<S::Row>,
    stats: Arc<ImportStats>,
    failed_pages: Arc<Mutex<Vec<u32>>>,
) {
    loop {
        let Some(page) = pages.lock().await.recv().await else {
            break;
        };

        match source.fetch_page(page).await {
            Ok(batch) => {
                debug!("[fetch-{}] page {}: {} rows", worker_id, page, batch.len());
                for row in batch {
                    if rows.send(row).await.is_err() {
                        warn!("[fetch-{}] row queue closed early", worker_id);
                        return;
                    }
                    stats.record_fetched();
                }
            }
            Err(CollectorError::NoData) => {
                debug!("[fetch-{}] page {}: no data", worker_id, page);
            }
            Err(e) => {
                warn!("⚠️ [fetch-{}] page {} failed: {}", worker_id, page, e);
                failed_pages.lock().await.push(page);
            }
        }
    }
}

async fn persist_worker<R, K>(
    worker_id: usize,
    sink: Arc<K>,
    rows: Arc<Mutex<mpsc::Receiver<R>>>,
    stats: Arc<ImportStats>,
) where
    R: Send + 'static,
    K: RowSink<R> + ?Sized,
{
    loop {
        let Some(row) = rows.lock().await.recv().await else {
            break;
        };

        let outcome = AssertUnwindSafe(sink.persist(row))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(RowError::UnexpectedFault(panic_message(panic.as_ref()))));

        match outcome {
            Ok(()) => stats.record_success(),
            Err(e @ RowError::DataQuality(_)) => {
                warn!("⚠️ [persist-{}] row skipped: {}", worker_id, e);
                stats.record_failure();
            }
            Err(e) => {
                error!("❌ [persist-{}] row failed: {}", worker_id, e);
                stats.record_failure();
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
