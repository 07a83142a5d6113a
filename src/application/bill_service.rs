//! 의안 수집
//!
//! Per bill row: detail page → committee → bill upsert → status-flow steps →
//! member list → proposer resolution → relations. A proposer that cannot be
//! resolved is logged and skipped; the bill itself still counts as stored.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::application::context::{PipelineContext, SharedFetcher};
use crate::application::politician_service::merge;
use crate::crawling::html::{parse_bill_detail, parse_member_list};
use crate::crawling::{
    ApiCollector, ImportOptions, ImportSummary, Importer, ProposerResolver, Resource, ResourcePages,
    RowError, RowSink,
};
use crate::domain::{BillDetail, BillRelation, BillRow, BillStep, LegislativeStore, ProposerRole};
use crate::infrastructure::PageFetcher;

pub struct BillSink<F> {
    store: Arc<dyn LegislativeStore>,
    fetcher: F,
    resolver: ProposerResolver,
    age: u32,
}

impl<F: PageFetcher> BillSink<F> {
    pub fn new(store: Arc<dyn LegislativeStore>, fetcher: F, age: u32) -> Self {
        let resolver = ProposerResolver::new(Arc::clone(&store));
        Self {
            store,
            fetcher,
            resolver,
            age,
        }
    }

    async fn detail(&self, row: &BillRow) -> Result<BillDetail, RowError> {
        let link = row.detail_link.trim();
        if link.is_empty() {
            warn!("⚠️ {} has no detail link", row.bill_id);
            return Ok(BillDetail::default());
        }
        let html = self.fetcher.get_text(link).await?;
        Ok(parse_bill_detail(&html)?)
    }

    /// Returns the number of relations stored.
    async fn link_proposers(&self, bill_pk: i64, row: &BillRow) -> Result<usize, RowError> {
        let url = row.member_list_url.trim();
        if url.is_empty() {
            return Ok(0);
        }
        let html = self.fetcher.get_text(url).await?;

        let mut linked = 0;
        for (index, text) in parse_member_list(&html)?.iter().enumerate() {
            let resolution = match self.resolver.resolve_text(text, self.age).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    warn!("⚠️ [{}] proposer skipped: {}", row.bill_id, e);
                    continue;
                }
            };
            self.store
                .upsert_bill_relation(&BillRelation {
                    bill_pk,
                    politician_id: resolution.politician_id,
                    role: ProposerRole::for_position(index),
                })
                .await?;
            linked += 1;
        }
        Ok(linked)
    }
}

#[async_trait]
impl<F: PageFetcher + 'static> RowSink<BillRow> for BillSink<F> {
    async fn persist(&self, row: BillRow) -> Result<(), RowError> {
        let detail = self.detail(&row).await?;
        let committee_id = self.store.get_or_create_committee(&row.committee).await?;
        let bill = row.to_entity(&detail, committee_id, self.age)?;
        let bill_pk = self.store.upsert_bill(&bill).await?;

        for (step_order, step_name) in detail.status_flow() {
            self.store
                .upsert_bill_step(&BillStep {
                    bill_pk,
                    step_order,
                    step_name,
                })
                .await?;
        }

        let linked = self.link_proposers(bill_pk, &row).await?;
        debug!("📜 {} [{}] steps={} proposers={}", bill.bill_id, bill.current_step, detail.steps.len(), linked);
        Ok(())
    }
}

/// bill_no → bill_id, inserting from `ALLBILL` when the bill is not stored yet
pub struct BillLookup {
    store: Arc<dyn LegislativeStore>,
    collector: Option<Arc<ApiCollector<SharedFetcher>>>,
}

impl BillLookup {
    pub fn new(store: Arc<dyn LegislativeStore>, collector: Option<Arc<ApiCollector<SharedFetcher>>>) -> Self {
        Self { store, collector }
    }

    pub async fn bill_id(&self, bill_no: &str) -> Result<Option<String>, RowError> {
        if let Some(bill_id) = self.store.find_bill_id_by_no(bill_no).await? {
            return Ok(Some(bill_id));
        }
        let Some(collector) = &self.collector else {
            return Ok(None);
        };

        let Some(summary) = collector.find_bill_by_no(bill_no).await? else {
            return Ok(None);
        };
        let bill = summary.to_entity(bill_no)?;
        self.store.upsert_bill(&bill).await?;
        info!("➕ bill {} inserted from ALLBILL as {}", bill_no, bill.bill_id);
        Ok(Some(bill.bill_id))
    }
}

pub struct BillService {
    context: PipelineContext,
    collector: Arc<ApiCollector<SharedFetcher>>,
}

impl BillService {
    pub fn new(context: PipelineContext) -> Result<Self> {
        let collector = context.collector()?;
        Ok(Self { context, collector })
    }

    /// Bills of one legislative term.
    pub async fn import_term(&self, age: u32) -> Result<ImportSummary> {
        let api = &self.context.config.api;
        let resource = Resource::Bills { age };
        let total_pages = self.collector.fetch_total_pages(&resource, api.page_size).await?;
        info!("📥 {}: {} pages", resource, total_pages);

        let pages = Arc::new(ResourcePages::<_, BillRow>::new(
            Arc::clone(&self.collector),
            resource.clone(),
            api.page_size,
        ));
        let sink = Arc::new(BillSink::new(
            Arc::clone(&self.context.store),
            Arc::clone(&self.context.fetcher),
            age,
        ));
        let summary = Importer::new(ImportOptions::from_api(api, total_pages))
            .run(pages, sink)
            .await;
        summary.log(&resource.to_string());
        Ok(summary)
    }

    /// Every term from 1 to `current_unit`.
    pub async fn import_all(&self, current_unit: u32) -> Result<ImportSummary> {
        let mut total = ImportSummary::default();
        for age in 1..=current_unit {
            match self.import_term(age).await {
                Ok(summary) => merge(&mut total, &summary),
                Err(e) => warn!("⚠️ bills for {}대 failed: {:#}", age, e),
            }
        }
        total.log("bills");
        Ok(total)
    }
}
