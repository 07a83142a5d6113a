//! Idempotent re-runs against an on-disk SQLite store

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;

use gwatch_pipeline::application::OpinionSink;
use gwatch_pipeline::crawling::spreadsheet_extractor::above_watermark;
use gwatch_pipeline::crawling::{AuthenticatedRequests, ImportOptions, Importer, JobBatch, PortalUrls};
use gwatch_pipeline::domain::{LegislativeStore, OpinionJob, Politician, PoliticianTerm, Session};
use gwatch_pipeline::infrastructure::{
    DatabaseConnection, FetchError, FetchRequest, FetchResponse, PageFetcher, SqliteLegislativeStore,
};

async fn file_store(dir: &TempDir) -> (DatabaseConnection, Arc<dyn LegislativeStore>) {
    let url = format!("sqlite://{}", dir.path().join("gwatch.db").display());
    let db = DatabaseConnection::new(&url, 4).await.unwrap();
    db.migrate().await.unwrap();
    let store: Arc<dyn LegislativeStore> = Arc::new(SqliteLegislativeStore::new(db.pool().clone()));
    (db, store)
}

async fn count(db: &DatabaseConnection, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(db.pool())
        .await
        .unwrap()
}

/// Anonymous opinions never reach the network.
struct Offline;

#[async_trait]
impl PageFetcher for Offline {
    async fn request(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        Err(FetchError::Request {
            url: request.url,
            message: "offline".into(),
        })
    }
}

fn anonymous_jobs(range: std::ops::RangeInclusive<u64>) -> Vec<OpinionJob> {
    range
        .map(|no| OpinionJob {
            bill_id: "PRC_R1".into(),
            opinion_no: no,
            subject: format!("[비공개] 의견 {no}"),
            author: "익명".into(),
            created_at: "2025-03-02".into(),
        })
        .collect()
}

async fn import_opinions(store: &Arc<dyn LegislativeStore>, jobs: Vec<OpinionJob>) -> (u64, u64) {
    let sink = Arc::new(OpinionSink::new(
        Arc::clone(store),
        Offline,
        AuthenticatedRequests::new(PortalUrls::new("https://pal.assembly.go.kr"), "UA"),
        Arc::new(Session::new("tok".into(), Vec::new())),
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
    ));
    let batch = Arc::new(JobBatch::new(jobs, 7));
    let pages = batch.total_pages().await;
    let summary = Importer::new(ImportOptions::for_jobs(pages, 4)).run(batch, sink).await;
    (summary.succeeded, summary.failed)
}

#[tokio::test]
async fn concurrent_upserts_of_one_member_leave_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let (db, store) = file_store(&dir).await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let id = store
                    .upsert_politician(&Politician {
                        mona_cd: "MONA1".into(),
                        name: "홍길동".into(),
                        ..Politician::default()
                    })
                    .await
                    .unwrap();
                let party = store.get_or_create_party("무소속").await.unwrap();
                store
                    .upsert_term(id, party, &PoliticianTerm { unit: 22, party: "무소속".into(), ..PoliticianTerm::default() })
                    .await
                    .unwrap();
                id
            })
        })
        .collect();

    let ids: Vec<i64> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(count(&db, "politicians").await, 1);
    assert_eq!(count(&db, "politician_terms").await, 1);
    assert_eq!(count(&db, "parties").await, 1);
}

#[tokio::test]
async fn rerunning_an_opinion_import_adds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (db, store) = file_store(&dir).await;

    assert_eq!(import_opinions(&store, anonymous_jobs(1..=30)).await, (30, 0));
    assert_eq!(import_opinions(&store, anonymous_jobs(1..=30)).await, (30, 0));

    assert_eq!(count(&db, "legislative_opinions").await, 30);
    assert_eq!(store.max_opinion_no("PRC_R1").await.unwrap(), 30);
}

#[tokio::test]
async fn watermark_limits_the_second_run_to_new_rows() {
    let dir = tempfile::tempdir().unwrap();
    let (db, store) = file_store(&dir).await;
    import_opinions(&store, anonymous_jobs(1..=10)).await;

    let watermark = store.max_opinion_no("PRC_R1").await.unwrap();
    let fresh = above_watermark(anonymous_jobs(1..=15), watermark);
    assert_eq!(fresh.iter().map(|j| j.opinion_no).collect::<Vec<_>>(), vec![11, 12, 13, 14, 15]);

    assert_eq!(import_opinions(&store, fresh).await, (5, 0));
    assert_eq!(count(&db, "legislative_opinions").await, 15);
}

#[tokio::test]
async fn non_anonymous_opinion_without_network_fails_the_row_only() {
    let dir = tempfile::tempdir().unwrap();
    let (db, store) = file_store(&dir).await;

    let mut jobs = anonymous_jobs(1..=3);
    jobs[1].subject = "공개 의견".into();

    assert_eq!(import_opinions(&store, jobs).await, (2, 1));
    assert_eq!(count(&db, "legislative_opinions").await, 2);
}
