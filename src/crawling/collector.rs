//! Paginated Collector (열린국회정보 Open API)
//!
//! Builds the query URL for a resource, fetches one page through the
//! [`PageFetcher`] and classifies the envelope. The collector holds no mutable
//! state and can be shared by any number of fetch workers.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::crawling::envelope::{self, Envelope};
use crate::crawling::importer::PageSource;
use crate::domain::politician::latest_unit;
use crate::domain::{BillSummaryRow, PoliticianRow};
use crate::infrastructure::{FetchError, FetchRequest, PageFetcher};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    /// Query matched nothing. A loop-termination condition, not a failure.
    #[error("no data")]
    NoData,

    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("decode error for {resource}: {message}")]
    Decode { resource: String, message: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid request URL: {0}")]
    Url(String),
}

/// Open API collections used by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// 국회의원 발의법률안 (대수별)
    Bills { age: u32 },
    /// 국회의원 인적사항 (현역)
    CurrentMembers,
    /// 역대 국회의원 현황 (대수별)
    HistoricalMembers { unit: u32 },
    /// 국회의원 SNS 정보
    MemberSns,
    /// 의안 통합 검색 (의안번호)
    AllBills { bill_no: String },
}

impl Resource {
    #[must_use]
    pub const fn endpoint(&self) -> &'static str {
        match self {
            Self::Bills { .. } => "nzmimeepazxkubdpn",
            Self::CurrentMembers => "nwvrqwxyaytdsfvhu",
            Self::HistoricalMembers { .. } => "npffdutiapkzbfyvr",
            Self::MemberSns => "negnlnyvatsjwocar",
            Self::AllBills { .. } => "ALLBILL",
        }
    }

    /// Resource-specific filter parameters
    fn filters(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Bills { age } => vec![("AGE", age.to_string())],
            Self::HistoricalMembers { unit } => vec![("UNIT_CD", format!("1000{unit:02}"))],
            Self::AllBills { bill_no } => vec![("BILL_NO", bill_no.clone())],
            Self::CurrentMembers | Self::MemberSns => Vec::new(),
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bills { age } => write!(f, "bills(AGE={age})"),
            Self::CurrentMembers => f.write_str("current-members"),
            Self::HistoricalMembers { unit } => write!(f, "historical-members(unit={unit})"),
            Self::MemberSns => f.write_str("member-sns"),
            Self::AllBills { bill_no } => write!(f, "all-bills(BILL_NO={bill_no})"),
        }
    }
}

/// Sample size used for current-term discovery
const CURRENT_UNIT_SAMPLE: u32 = 10;
/// `ALLBILL` lookup page size
const BILL_LOOKUP_PAGE_SIZE: u32 = 5;

pub struct ApiCollector<F> {
    fetcher: F,
    base_url: String,
    api_key: String,
}

impl<F: PageFetcher> ApiCollector<F> {
    pub fn new(fetcher: F, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn page_url(&self, resource: &Resource, page: u32, page_size: u32) -> Result<Url, CollectorError> {
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), resource.endpoint());
        let mut url = Url::parse(&raw).map_err(|e| CollectorError::Url(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("KEY", &self.api_key)
                .append_pair("Type", "json")
                .append_pair("pIndex", &page.to_string())
                .append_pair("pSize", &page_size.to_string());
            for (name, value) in resource.filters() {
                query.append_pair(name, &value);
            }
        }
        Ok(url)
    }

    async fn fetch_envelope<T: DeserializeOwned>(
        &self,
        resource: &Resource,
        page: u32,
        page_size: u32,
    ) -> Result<Envelope<T>, CollectorError> {
        let url = self.page_url(resource, page, page_size)?;
        let response = self
            .fetcher
            .request(FetchRequest::get(url.as_str()))
            .await?
            .error_for_status(url.as_str())?;

        envelope::decode(&response.body, resource.endpoint()).map_err(|e| CollectorError::Decode {
            resource: resource.to_string(),
            message: e.to_string(),
        })
    }

    /// One page of rows. `NoData` and upstream error codes come back as
    /// [`CollectorError::NoData`] / [`CollectorError::Api`].
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        resource: &Resource,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<T>, CollectorError> {
        match self.fetch_envelope(resource, page, page_size).await? {
            Envelope::Rows { rows, .. } => {
                debug!("📦 {} page {}: {} rows", resource, page, rows.len());
                Ok(rows)
            }
            Envelope::NoData => Err(CollectorError::NoData),
            Envelope::Failed { code, message } => Err(CollectorError::Api { code, message }),
        }
    }

    /// `list_total_count` of the first page (pSize=1).
    pub async fn fetch_total_count(&self, resource: &Resource) -> Result<u64, CollectorError> {
        match self.fetch_envelope::<serde_json::Value>(resource, 1, 1).await? {
            Envelope::Rows { total_count, .. } => Ok(total_count),
            Envelope::NoData => Err(CollectorError::NoData),
            Envelope::Failed { code, message } => Err(CollectorError::Api { code, message }),
        }
    }

    /// Pages for the resource at `page_size`; `NoData` counts as zero pages.
    pub async fn fetch_total_pages(&self, resource: &Resource, page_size: u32) -> Result<u32, CollectorError> {
        match self.fetch_total_count(resource).await {
            Ok(total) => Ok(envelope::total_pages(total, page_size)),
            Err(CollectorError::NoData) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Current legislative term: the largest number in `UNITS` among the
    /// first current members.
    pub async fn discover_current_unit(&self) -> Result<u32, CollectorError> {
        let rows: Vec<PoliticianRow> = self
            .fetch_page(&Resource::CurrentMembers, 1, CURRENT_UNIT_SAMPLE)
            .await?;
        rows.iter()
            .filter_map(|row| latest_unit(&row.units))
            .max()
            .ok_or_else(|| CollectorError::Decode {
                resource: Resource::CurrentMembers.to_string(),
                message: "no term number in UNITS".to_string(),
            })
    }

    /// `ALLBILL` lookup by bill number.
    pub async fn find_bill_by_no(&self, bill_no: &str) -> Result<Option<BillSummaryRow>, CollectorError> {
        let resource = Resource::AllBills {
            bill_no: bill_no.trim().to_string(),
        };
        let rows: Vec<BillSummaryRow> = match self.fetch_page(&resource, 1, BILL_LOOKUP_PAGE_SIZE).await {
            Ok(rows) => rows,
            Err(CollectorError::NoData) => return Ok(None),
            Err(e) => return Err(e),
        };
        let exact = rows.iter().position(|row| row.bill_no.trim() == bill_no.trim());
        Ok(rows.into_iter().nth(exact.unwrap_or(0)))
    }
}

/// One resource exposed as a [`PageSource`] for the importer's fetch tier.
pub struct ResourcePages<F, T> {
    collector: Arc<ApiCollector<F>>,
    resource: Resource,
    page_size: u32,
    _row: PhantomData<fn() -> T>,
}

impl<F, T> ResourcePages<F, T> {
    pub fn new(collector: Arc<ApiCollector<F>>, resource: Resource, page_size: u32) -> Self {
        Self {
            collector,
            resource,
            page_size,
            _row: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> PageSource for ResourcePages<F, T>
where
    F: PageFetcher + 'static,
    T: DeserializeOwned + Send + 'static,
{
    type Row = T;

    async fn fetch_page(&self, page: u32) -> Result<Vec<T>, CollectorError> {
        self.collector.fetch_page(&self.resource, page, self.page_size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::FetchResponse;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies keyed by the `pIndex` query value.
    struct CannedFetcher {
        pages: HashMap<String, String>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PageFetcher for CannedFetcher {
        async fn request(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
            self.seen.lock().unwrap().push(request.url.clone());
            let url = Url::parse(&request.url).unwrap();
            let page = url
                .query_pairs()
                .find(|(k, _)| k == "pIndex")
                .map(|(_, v)| v.into_owned())
                .unwrap();
            let body = self
                .pages
                .get(&page)
                .cloned()
                .unwrap_or_else(|| r#"{"RESULT":{"CODE":"INFO-200","MESSAGE":"none"}}"#.into());
            Ok(FetchResponse { status: 200, body: body.into_bytes() })
        }
    }

    fn members_page(units: &[&str]) -> String {
        let rows: Vec<String> = units
            .iter()
            .enumerate()
            .map(|(i, u)| format!(r#"{{"MONA_CD":"M{i}","HG_NM":"의원{i}","UNITS":"{u}"}}"#))
            .collect();
        format!(
            r#"{{"nwvrqwxyaytdsfvhu":[{{"head":[{{"list_total_count":{}}},{{"RESULT":{{"CODE":"INFO-000","MESSAGE":"ok"}}}}]}},{{"row":[{}]}}]}}"#,
            units.len(),
            rows.join(",")
        )
    }

    fn collector(pages: &[(&str, String)]) -> ApiCollector<CannedFetcher> {
        let fetcher = CannedFetcher {
            pages: pages.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect(),
            seen: Mutex::new(Vec::new()),
        };
        ApiCollector::new(fetcher, "https://open.assembly.go.kr/portal/openapi/", "KEY123")
    }

    #[test]
    fn page_url_carries_key_paging_and_filters() {
        let c = collector(&[]);
        let url = c.page_url(&Resource::HistoricalMembers { unit: 7 }, 2, 100).unwrap();
        assert_eq!(
            url.as_str(),
            "https://open.assembly.go.kr/portal/openapi/npffdutiapkzbfyvr?KEY=KEY123&Type=json&pIndex=2&pSize=100&UNIT_CD=100007"
        );
    }

    #[tokio::test]
    async fn current_unit_is_the_max_units_number() {
        let c = collector(&[("1", members_page(&["제21대", "제20대, 제21대, 제22대"]))]);
        assert_eq!(c.discover_current_unit().await.unwrap(), 22);
        assert_eq!(c.fetcher.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn api_error_code_is_surfaced() {
        let body = r#"{"nwvrqwxyaytdsfvhu":[{"head":[{"list_total_count":0},{"RESULT":{"CODE":"ERROR-300","MESSAGE":"필수 값 누락"}}]},{"row":[]}]}"#;
        let c = collector(&[("1", body.to_string())]);
        let err = c
            .fetch_page::<PoliticianRow>(&Resource::CurrentMembers, 1, 10)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CollectorError::Api {
                code: "ERROR-300".into(),
                message: "필수 값 누락".into()
            }
        );
        assert_eq!(
            c.fetch_total_pages(&Resource::CurrentMembers, 10).await.unwrap_err(),
            err
        );
    }

    #[tokio::test]
    async fn total_pages_from_list_total_count() {
        let body = r#"{"nzmimeepazxkubdpn":[{"head":[{"list_total_count":250},{"RESULT":{"CODE":"INFO-000","MESSAGE":"ok"}}]},{"row":[{"BILL_ID":"PRC_1"}]}]}"#;
        let c = collector(&[("1", body.to_string())]);
        assert_eq!(c.fetch_total_pages(&Resource::Bills { age: 22 }, 100).await.unwrap(), 3);
    }
}
