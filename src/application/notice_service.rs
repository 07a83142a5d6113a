//! 진행 중 입법예고 수집
//!
//! 1. 브라우저 세션으로 목록 엑셀 다운로드 (`legislation_notice_<stamp>.xlsx`)
//! 2. 최신 파일에서 {의안번호, 의견수} 추출
//! 3. 의안번호 → 의안 ID (없으면 ALLBILL fallback)
//! 4. 의견 목록 페이지에서 예고기간/의견수 확인 후 upsert

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::application::bill_service::BillLookup;
use crate::application::context::{PipelineContext, SharedFetcher};
use crate::crawling::html::parse_notice_page;
use crate::crawling::importer::JOB_CHUNK_SIZE;
use crate::crawling::spreadsheet_extractor::{NOTICE_FILE_PREFIX, latest_notice_file};
use crate::crawling::{
    ImportOptions, ImportSummary, Importer, JobBatch, PortalUrls, RowError, RowSink, SessionBootstrapper,
    SessionTarget, SpreadsheetExtractor, save_download,
};
use crate::domain::dates::{file_stamp, kst};
use crate::domain::{LegislativeNotice, LegislativeStore, NoticeListing};
use crate::infrastructure::{BrowserLauncher, PageFetcher, XlsxReader};

pub struct NoticeSink<F> {
    store: Arc<dyn LegislativeStore>,
    fetcher: F,
    urls: PortalUrls,
    bills: BillLookup,
}

impl<F: PageFetcher> NoticeSink<F> {
    pub fn new(store: Arc<dyn LegislativeStore>, fetcher: F, urls: PortalUrls, bills: BillLookup) -> Self {
        Self {
            store,
            fetcher,
            urls,
            bills,
        }
    }
}

#[async_trait]
impl<F: PageFetcher + 'static> RowSink<NoticeListing> for NoticeSink<F> {
    async fn persist(&self, listing: NoticeListing) -> Result<(), RowError> {
        let Some(bill_id) = self.bills.bill_id(&listing.bill_no).await? else {
            return Err(RowError::DataQuality(format!("bill {} not found", listing.bill_no)));
        };

        let comments_url = self.urls.opinion_list(&bill_id);
        let html = self.fetcher.get_text(&comments_url).await?;
        let page = parse_notice_page(&html)?;

        let notice = LegislativeNotice {
            bill_id,
            start_date: page.start_date,
            end_date: page.end_date,
            comments_url,
            comments_count: page.comments_count.unwrap_or(listing.comment_count),
        };
        self.store.upsert_notice(&notice).await?;
        debug!("📢 {} {} ~ {} ({} comments)", notice.bill_id, notice.start_date, notice.end_date, notice.comments_count);
        Ok(())
    }
}

pub struct NoticeService<L> {
    context: PipelineContext,
    bootstrapper: SessionBootstrapper<L>,
}

impl<L: BrowserLauncher> NoticeService<L> {
    pub fn new(context: PipelineContext, bootstrapper: SessionBootstrapper<L>) -> Self {
        Self { context, bootstrapper }
    }

    fn notice_dir(&self) -> PathBuf {
        self.context.config.legislation.notice_dir()
    }

    /// Download the ongoing-notice spreadsheet through a browser session.
    pub async fn download_list(&self) -> Result<PathBuf> {
        let path = self.notice_dir().join(format!(
            "{NOTICE_FILE_PREFIX}{}.xlsx",
            file_stamp(&Utc::now().with_timezone(&kst()))
        ));
        let requests = self.context.portal_requests();
        let fetcher: SharedFetcher = Arc::clone(&self.context.fetcher);

        let saved = self
            .bootstrapper
            .with_session(&SessionTarget::NoticeList, |session| async move {
                save_download(&fetcher, requests.notice_list_download(&session), &path).await
            })
            .await
            .context("notice list session failed")?
            .context("notice list download failed")?;
        Ok(saved)
    }

    /// Import the newest notice spreadsheet and delete it afterwards.
    pub async fn import_latest(&self) -> Result<ImportSummary> {
        let dir = self.notice_dir();
        let path = latest_notice_file(&dir)?
            .ok_or_else(|| anyhow!("no {NOTICE_FILE_PREFIX}*.xlsx in {}", dir.display()))?;
        self.import_file(&path).await
    }

    pub async fn import_file(&self, path: &Path) -> Result<ImportSummary> {
        let extractor = SpreadsheetExtractor::new(XlsxReader, Arc::clone(&self.context.store));
        let listings = extractor
            .read_notice_file(path)
            .with_context(|| format!("cannot read {}", path.display()))?;

        let collector = match self.context.collector() {
            Ok(collector) => Some(collector),
            Err(e) => {
                warn!("⚠️ ALLBILL fallback disabled: {:#}", e);
                None
            }
        };
        let sink = Arc::new(NoticeSink::new(
            Arc::clone(&self.context.store),
            Arc::clone(&self.context.fetcher),
            self.context.portal_urls(),
            BillLookup::new(Arc::clone(&self.context.store), collector),
        ));

        let workers = self.context.config.legislation.notice_workers;
        let batch = Arc::new(JobBatch::new(listings, JOB_CHUNK_SIZE));
        let pages = batch.total_pages().await;
        let summary = Importer::new(ImportOptions::for_jobs(pages, workers))
            .run(batch, sink)
            .await;
        summary.log("legislative notices");

        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("⚠️ failed to delete {}: {}", path.display(), e);
        } else {
            info!("🗑️ removed {}", path.display());
        }
        Ok(summary)
    }

    pub async fn run(&self) -> Result<ImportSummary> {
        let path = self.download_list().await?;
        info!("📄 notice list saved to {}", path.display());
        self.import_latest().await
    }
}
