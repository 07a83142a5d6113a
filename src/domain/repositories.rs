//! Repository interfaces (Persistence Gateway)
//!
//! Every write is a merge-on-conflict keyed by a business key: re-running an
//! import never duplicates rows, and blank incoming values never overwrite
//! previously stored ones. Implementations must tolerate concurrent callers;
//! the pipeline adds no locking of its own.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{
    Bill, BillRelation, BillStep, Candidate, LegislativeNotice, LegislativeOpinion, Politician,
    PoliticianCareer, PoliticianContact, PoliticianSns, PoliticianTerm,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct StoreError {
    pub operation: &'static str,
    pub message: String,
}

impl StoreError {
    pub fn new(operation: &'static str, source: impl std::fmt::Display) -> Self {
        Self {
            operation,
            message: source.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait LegislativeStore: Send + Sync {
    // 국회의원 ({mona_cd} 키, 하위 테이블은 politician_id 키)
    async fn upsert_politician(&self, politician: &Politician) -> StoreResult<i64>;
    async fn find_politician_id(&self, mona_cd: &str) -> StoreResult<Option<i64>>;
    async fn upsert_term(
        &self,
        politician_id: i64,
        party_id: Option<i64>,
        term: &PoliticianTerm,
    ) -> StoreResult<()>;
    async fn upsert_contact(&self, politician_id: i64, contact: &PoliticianContact) -> StoreResult<()>;
    async fn upsert_career(&self, politician_id: i64, career: &PoliticianCareer) -> StoreResult<()>;
    async fn upsert_sns(&self, politician_id: i64, sns: &PoliticianSns) -> StoreResult<()>;

    // 이름 기반 lookup 테이블. 빈 이름은 None.
    async fn get_or_create_party(&self, name: &str) -> StoreResult<Option<i64>>;
    async fn get_or_create_committee(&self, name: &str) -> StoreResult<Option<i64>>;

    /// politicians ⋈ politician_terms rows sharing `name`
    async fn find_candidates(&self, name: &str) -> StoreResult<Vec<Candidate>>;

    // 의안 ({bill_id} 키, 단계/관계는 복합키)
    async fn upsert_bill(&self, bill: &Bill) -> StoreResult<i64>;
    async fn find_bill_id_by_no(&self, bill_no: &str) -> StoreResult<Option<String>>;
    async fn upsert_bill_step(&self, step: &BillStep) -> StoreResult<()>;
    async fn upsert_bill_relation(&self, relation: &BillRelation) -> StoreResult<()>;

    // 입법예고 / 의견
    async fn upsert_notice(&self, notice: &LegislativeNotice) -> StoreResult<()>;
    /// Notices with `end_date` in `[from, until]`; `until = None` is open-ended.
    async fn notices_ending_between(
        &self,
        from: NaiveDate,
        until: Option<NaiveDate>,
    ) -> StoreResult<Vec<LegislativeNotice>>;
    /// Watermark: highest stored opinion number for a bill, 0 when none.
    async fn max_opinion_no(&self, bill_id: &str) -> StoreResult<u64>;
    async fn upsert_opinion(&self, opinion: &LegislativeOpinion) -> StoreResult<()>;
}
