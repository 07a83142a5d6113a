//! 입법예고 등록의견 수집
//!
//! Notices still open (or closing within N days) → opinion spreadsheets via
//! the download pool → watermark-filtered jobs → opinion workers that fetch
//! the body text with the browser session and upsert by {bill_id, opinion_no}.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::application::context::{PipelineContext, SharedFetcher};
use crate::application::politician_service::merge;
use crate::crawling::importer::JOB_CHUNK_SIZE;
use crate::crawling::spreadsheet_extractor::opinion_files;
use crate::crawling::{
    AuthenticatedRequests, DownloadPool, DownloadReport, ImportOptions, ImportSummary, Importer, JobBatch,
    RowError, RowSink, SessionBootstrapper, SessionTarget, SpreadsheetExtractor, save_download,
};
use crate::domain::dates::{file_stamp, kst, parse_ymd, today_kst};
use crate::domain::legislation::{infer_agreement, infer_anonymous};
use crate::domain::{LegislativeNotice, LegislativeOpinion, LegislativeStore, OpinionJob, Session};
use crate::infrastructure::{BrowserLauncher, PageFetcher, XlsxReader};

/// `findOneLgsltpaOpnById.json` 응답 본문
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpinionContent {
    pub content: String,
    pub created_at: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct ContentEnvelope {
    #[serde(default)]
    result: Option<ContentResult>,
}

#[derive(Deserialize)]
struct ContentResult {
    #[serde(default)]
    cn: Option<String>,
    #[serde(rename = "opnRgDt", default)]
    registered: Option<String>,
}

pub fn parse_opinion_content(body: &[u8]) -> Result<OpinionContent, RowError> {
    let envelope: ContentEnvelope =
        serde_json::from_slice(body).map_err(|e| RowError::Transient(format!("opinion content: {e}")))?;
    let result = envelope
        .result
        .ok_or_else(|| RowError::Transient("opinion content without result".to_string()))?;
    Ok(OpinionContent {
        content: result.cn.unwrap_or_default().trim().to_string(),
        created_at: result.registered.as_deref().and_then(parse_ymd),
    })
}

pub struct OpinionSink<F> {
    store: Arc<dyn LegislativeStore>,
    fetcher: F,
    requests: AuthenticatedRequests,
    session: Arc<Session>,
    today: NaiveDate,
}

impl<F: PageFetcher> OpinionSink<F> {
    pub fn new(
        store: Arc<dyn LegislativeStore>,
        fetcher: F,
        requests: AuthenticatedRequests,
        session: Arc<Session>,
        today: NaiveDate,
    ) -> Self {
        Self {
            store,
            fetcher,
            requests,
            session,
            today,
        }
    }

    async fn fetch_content(&self, job: &OpinionJob) -> Result<OpinionContent, RowError> {
        let request = self.requests.opinion_content(&self.session, &job.bill_id, job.opinion_no);
        let url = request.url.clone();
        let response = self.fetcher.request(request).await?.error_for_status(&url)?;
        parse_opinion_content(&response.body)
    }
}

#[async_trait]
impl<F: PageFetcher + 'static> RowSink<OpinionJob> for OpinionSink<F> {
    async fn persist(&self, job: OpinionJob) -> Result<(), RowError> {
        let row_date = parse_ymd(&job.created_at);
        if row_date.is_none() {
            warn!("⚠️ invalid createdAt for {}#{}: {:?}", job.bill_id, job.opinion_no, job.created_at);
        }

        let is_anonymous = infer_anonymous(&job.subject, "");
        let fetched = if is_anonymous == Some(true) {
            OpinionContent::default()
        } else {
            self.fetch_content(&job).await?
        };

        let opinion = LegislativeOpinion {
            agreement: infer_agreement(&job.subject, &fetched.content),
            created_at: row_date.or(fetched.created_at).unwrap_or(self.today),
            bill_id: job.bill_id,
            opinion_no: job.opinion_no,
            subject: job.subject,
            content: fetched.content,
            author: job.author,
            is_anonymous,
        };
        self.store.upsert_opinion(&opinion).await?;
        debug!("💬 {}#{} agreement={:?}", opinion.bill_id, opinion.opinion_no, opinion.agreement);
        Ok(())
    }
}

pub struct OpinionService<L> {
    context: PipelineContext,
    bootstrapper: SessionBootstrapper<L>,
}

impl<L: BrowserLauncher> OpinionService<L> {
    pub fn new(context: PipelineContext, bootstrapper: SessionBootstrapper<L>) -> Self {
        Self { context, bootstrapper }
    }

    fn opinion_dir(&self) -> PathBuf {
        self.context.config.legislation.opinion_dir()
    }

    /// Notices ending today or later; with `within_days`, only those ending
    /// in `[today, today + N]`.
    pub async fn select_notices(&self, within_days: Option<u32>) -> Result<Vec<LegislativeNotice>> {
        let today = today_kst();
        let until = within_days.and_then(|days| today.checked_add_days(Days::new(u64::from(days))));
        let notices = self
            .context
            .store
            .notices_ending_between(today, until)
            .await
            .context("notice selection failed")?;
        info!("📋 {} notices selected (until {:?})", notices.len(), until);
        Ok(notices)
    }

    /// One browser session, seeded with the first bill, shared by the pool.
    pub async fn download(&self, bill_ids: Vec<String>) -> Result<DownloadReport> {
        let Some(seed) = bill_ids.first().cloned() else {
            return Ok(DownloadReport::default());
        };
        let workers = self.context.config.legislation.download_workers;
        let dir = self.opinion_dir();
        let requests = self.context.portal_requests();
        let fetcher: SharedFetcher = Arc::clone(&self.context.fetcher);

        self.bootstrapper
            .with_session(&SessionTarget::Opinions { bill_id: seed }, |session| async move {
                DownloadPool::new(workers)
                    .run(bill_ids, move |bill_id: String| {
                        let path = dir.join(format!(
                            "{bill_id},{}.xlsx",
                            file_stamp(&Utc::now().with_timezone(&kst()))
                        ));
                        let request = requests.opinion_download(&session, &bill_id);
                        let fetcher = Arc::clone(&fetcher);
                        async move { save_download(&fetcher, request, &path).await }
                    })
                    .await
            })
            .await
            .context("opinion download session failed")
    }

    /// Import every downloaded opinion file. A file is deleted once its jobs
    /// have been through the pool; unreadable files are left in place.
    pub async fn import_downloads(&self, seed_bill_id: &str) -> Result<ImportSummary> {
        let files = opinion_files(&self.opinion_dir())?;
        if files.is_empty() {
            info!("📭 no opinion files to import");
            return Ok(ImportSummary::default());
        }

        self.bootstrapper
            .with_session(
                &SessionTarget::Opinions {
                    bill_id: seed_bill_id.to_string(),
                },
                |session| async move { self.import_files(files, session).await },
            )
            .await
            .context("opinion content session failed")
    }

    async fn import_files(&self, files: Vec<PathBuf>, session: Arc<Session>) -> ImportSummary {
        let extractor = SpreadsheetExtractor::new(XlsxReader, Arc::clone(&self.context.store));
        let workers = self.context.config.legislation.opinion_workers;
        let mut total = ImportSummary::default();

        for path in files {
            let batch = match extractor.read_opinion_file(&path).await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("⚠️ skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let sink = Arc::new(OpinionSink::new(
                Arc::clone(&self.context.store),
                Arc::clone(&self.context.fetcher),
                self.context.portal_requests(),
                Arc::clone(&session),
                today_kst(),
            ));
            let jobs = Arc::new(JobBatch::new(batch.jobs, JOB_CHUNK_SIZE));
            let pages = jobs.total_pages().await;
            let summary = Importer::new(ImportOptions::for_jobs(pages, workers)).run(jobs, sink).await;
            summary.log(&format!("opinions {}", batch.bill_id));
            merge(&mut total, &summary);

            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("⚠️ failed to delete {}: {}", path.display(), e);
            }
        }
        total
    }

    pub async fn run(&self, within_days: Option<u32>) -> Result<ImportSummary> {
        let notices = self.select_notices(within_days).await?;
        let Some(seed) = notices.first().map(|n| n.bill_id.clone()) else {
            info!("📭 no open notices");
            return Ok(ImportSummary::default());
        };

        let report = self
            .download(notices.into_iter().map(|n| n.bill_id).collect())
            .await?;
        if !report.failed.is_empty() {
            warn!("⚠️ {} opinion downloads failed: {:?}", report.failed.len(), report.failed);
        }

        let summary = self.import_downloads(&seed).await?;
        summary.log("opinions");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawling::PortalUrls;
    use crate::infrastructure::{DatabaseConnection, FetchError, FetchRequest, FetchResponse, SqliteLegislativeStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ContentFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for ContentFetcher {
        async fn request(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.header_value("x-csrf-token"), Some("tok"));
            let body = r#"{"result":{"cn":"이 법안에 반대합니다. 반대!","opnRgDt":"2025-02-01"}}"#;
            Ok(FetchResponse { status: 200, body: body.as_bytes().to_vec() })
        }
    }

    fn job(no: u64, subject: &str, created_at: &str) -> OpinionJob {
        OpinionJob {
            bill_id: "PRC_O1".into(),
            opinion_no: no,
            subject: subject.into(),
            author: "김**".into(),
            created_at: created_at.into(),
        }
    }

    #[test]
    fn content_response_is_parsed() {
        let parsed = parse_opinion_content(r#"{"result":{"cn":" 본문 ","opnRgDt":"2025-01-31"}}"#.as_bytes()).unwrap();
        assert_eq!(parsed.content, "본문");
        assert_eq!(parsed.created_at, parse_ymd("2025-01-31"));
        assert!(parse_opinion_content(b"{}").is_err());
    }

    #[tokio::test]
    async fn anonymous_opinions_skip_the_content_fetch() {
        let db = DatabaseConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let store: Arc<dyn LegislativeStore> = Arc::new(SqliteLegislativeStore::new(db.pool().clone()));
        let fetcher = Arc::new(ContentFetcher { calls: AtomicUsize::new(0) });

        let sink = OpinionSink::new(
            Arc::clone(&store),
            Arc::clone(&fetcher),
            AuthenticatedRequests::new(PortalUrls::new("https://pal.assembly.go.kr"), "UA"),
            Arc::new(Session::new("tok".into(), Vec::new())),
            parse_ymd("2025-03-01").unwrap(),
        );

        sink.persist(job(1, "[비공개] 의견", "2025-01-02")).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

        sink.persist(job(2, "의견", "not a date")).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        assert_eq!(store.max_opinion_no("PRC_O1").await.unwrap(), 2);
    }
}
