//! 국회의원 수집
//!
//! - 역대 국회의원: 대수별 (`UNIT_CD = 1000NN`), politician + term
//! - 현역 국회의원: politician + term + contact + career
//! - SNS: 이미 저장된 의원에 한해 upsert

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::application::context::{PipelineContext, SharedFetcher};
use crate::crawling::{
    ApiCollector, ImportOptions, ImportSummary, Importer, Resource, ResourcePages, RowError, RowSink,
};
use crate::domain::dates::today_kst;
use crate::domain::{LegislativeStore, PoliticianRow, SnsRow};

/// Term used when neither the row nor discovery yields one
pub const KNOWN_CURRENT_UNIT: u32 = 22;

/// Which fields of a member row are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberScope {
    /// Historical members of one term: identity and term only
    Historical { unit: u32 },
    /// Current members: term from `UNITS`, plus contact and career
    Current { fallback_unit: u32 },
}

pub struct MemberSink {
    store: Arc<dyn LegislativeStore>,
    scope: MemberScope,
    today: NaiveDate,
}

impl MemberSink {
    pub fn new(store: Arc<dyn LegislativeStore>, scope: MemberScope, today: NaiveDate) -> Self {
        Self { store, scope, today }
    }

    fn unit_for(&self, row: &PoliticianRow) -> u32 {
        match self.scope {
            MemberScope::Historical { unit } => unit,
            MemberScope::Current { fallback_unit } => row.latest_unit().unwrap_or_else(|| {
                warn!(
                    "⚠️ no term in UNITS for {} ({}), using {}",
                    row.name, row.mona_cd, fallback_unit
                );
                fallback_unit
            }),
        }
    }
}

#[async_trait]
impl RowSink<PoliticianRow> for MemberSink {
    async fn persist(&self, row: PoliticianRow) -> Result<(), RowError> {
        let unit = self.unit_for(&row);
        let record = row.to_entities(unit, self.today)?;

        let politician_id = self.store.upsert_politician(&record.politician).await?;
        let party_id = self.store.get_or_create_party(&record.term.party).await?;
        self.store.upsert_term(politician_id, party_id, &record.term).await?;

        if matches!(self.scope, MemberScope::Current { .. }) {
            self.store.upsert_contact(politician_id, &record.contact).await?;
            self.store.upsert_career(politician_id, &record.career).await?;
        }

        debug!("👤 {} ({}) {}대", record.politician.name, record.politician.mona_cd, unit);
        Ok(())
    }
}

pub struct SnsSink {
    store: Arc<dyn LegislativeStore>,
}

impl SnsSink {
    pub fn new(store: Arc<dyn LegislativeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RowSink<SnsRow> for SnsSink {
    async fn persist(&self, row: SnsRow) -> Result<(), RowError> {
        let mona_cd = row.mona_cd.trim();
        let Some(politician_id) = self.store.find_politician_id(mona_cd).await? else {
            return Err(RowError::DataQuality(format!(
                "SNS row for unknown member {} ({})",
                row.name, mona_cd
            )));
        };
        self.store.upsert_sns(politician_id, &row.to_entity()).await?;
        Ok(())
    }
}

pub struct PoliticianService {
    context: PipelineContext,
    collector: Arc<ApiCollector<SharedFetcher>>,
}

impl PoliticianService {
    pub fn new(context: PipelineContext) -> Result<Self> {
        let collector = context.collector()?;
        Ok(Self { context, collector })
    }

    /// Largest term number among current members, or the known term when the
    /// discovery call fails.
    pub async fn current_unit(&self) -> u32 {
        match self.collector.discover_current_unit().await {
            Ok(unit) => {
                info!("🏛️ current legislative term: {}대", unit);
                unit
            }
            Err(e) => {
                warn!("⚠️ current term discovery failed, using {}: {}", KNOWN_CURRENT_UNIT, e);
                KNOWN_CURRENT_UNIT
            }
        }
    }

    async fn import<T, K>(&self, resource: Resource, sink: K) -> Result<ImportSummary>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
        K: RowSink<T> + 'static,
    {
        let api = &self.context.config.api;
        let total_pages = self.collector.fetch_total_pages(&resource, api.page_size).await?;
        info!("📥 {}: {} pages", resource, total_pages);

        let pages = Arc::new(ResourcePages::<_, T>::new(
            Arc::clone(&self.collector),
            resource.clone(),
            api.page_size,
        ));
        let summary = Importer::new(ImportOptions::from_api(api, total_pages))
            .run(pages, Arc::new(sink))
            .await;
        summary.log(&resource.to_string());
        Ok(summary)
    }

    /// 역대 국회의원 1대..=`current_unit`
    pub async fn import_historical(&self, current_unit: u32) -> Result<ImportSummary> {
        let mut total = ImportSummary::default();
        for unit in 1..=current_unit {
            let sink = MemberSink::new(
                Arc::clone(&self.context.store),
                MemberScope::Historical { unit },
                today_kst(),
            );
            match self.import::<PoliticianRow, _>(Resource::HistoricalMembers { unit }, sink).await {
                Ok(summary) => merge(&mut total, &summary),
                Err(e) => warn!("⚠️ historical members for {}대 failed: {:#}", unit, e),
            }
        }
        Ok(total)
    }

    pub async fn import_current(&self, current_unit: u32) -> Result<ImportSummary> {
        let sink = MemberSink::new(
            Arc::clone(&self.context.store),
            MemberScope::Current {
                fallback_unit: current_unit,
            },
            today_kst(),
        );
        self.import::<PoliticianRow, _>(Resource::CurrentMembers, sink).await
    }

    pub async fn import_sns(&self) -> Result<ImportSummary> {
        let sink = SnsSink::new(Arc::clone(&self.context.store));
        self.import::<SnsRow, _>(Resource::MemberSns, sink).await
    }

    /// Historical, then current, then SNS.
    pub async fn run(&self) -> Result<ImportSummary> {
        let unit = self.current_unit().await;
        let mut total = self.import_historical(unit).await?;
        merge(&mut total, &self.import_current(unit).await?);
        merge(&mut total, &self.import_sns().await?);
        total.log("politicians");
        Ok(total)
    }
}

/// Fold one summary into a running total.
pub(crate) fn merge(total: &mut ImportSummary, other: &ImportSummary) {
    total.fetched += other.fetched;
    total.succeeded += other.succeeded;
    total.failed += other.failed;
    total.failed_pages.extend_from_slice(&other.failed_pages);
    total.elapsed += other.elapsed;
}
