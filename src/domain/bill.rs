//! 의안(Bill) 도메인 타입
//!
//! `BillRow` is the raw record from the bill list endpoint. A `Bill` is only
//! produced once the detail page has been scraped and the committee has a
//! surrogate id.

use chrono::NaiveDate;
use serde::Deserialize;

use super::dates::parse_ymd;
use super::{DomainError, lenient_string};

/// 의안 목록 API 원본 행
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillRow {
    #[serde(rename = "BILL_ID", default, deserialize_with = "lenient_string")]
    pub bill_id: String,
    #[serde(rename = "BILL_NO", default, deserialize_with = "lenient_string")]
    pub bill_no: String,
    #[serde(rename = "BILL_NAME", default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(rename = "COMMITTEE", default, deserialize_with = "lenient_string")]
    pub committee: String,
    #[serde(rename = "PROPOSE_DT", default, deserialize_with = "lenient_string")]
    pub propose_date: String,
    #[serde(rename = "PROC_RESULT", default, deserialize_with = "lenient_string")]
    pub proc_result: String,
    #[serde(rename = "AGE", default, deserialize_with = "lenient_string")]
    pub age: String,
    #[serde(rename = "DETAIL_LINK", default, deserialize_with = "lenient_string")]
    pub detail_link: String,
    #[serde(rename = "PROPOSER", default, deserialize_with = "lenient_string")]
    pub proposer: String,
    #[serde(rename = "MEMBER_LIST", default, deserialize_with = "lenient_string")]
    pub member_list_url: String,
    #[serde(rename = "LAW_PROC_DT", default, deserialize_with = "lenient_string")]
    pub law_proc_date: String,
    #[serde(rename = "LAW_PRESENT_DT", default, deserialize_with = "lenient_string")]
    pub law_present_date: String,
    #[serde(rename = "LAW_SUBMIT_DT", default, deserialize_with = "lenient_string")]
    pub law_submit_date: String,
    #[serde(rename = "CMT_PROC_RESULT_CD", default, deserialize_with = "lenient_string")]
    pub cmt_proc_result_cd: String,
    #[serde(rename = "CMT_PROC_DT", default, deserialize_with = "lenient_string")]
    pub cmt_proc_date: String,
    #[serde(rename = "CMT_PRESENT_DT", default, deserialize_with = "lenient_string")]
    pub cmt_present_date: String,
    #[serde(rename = "COMMITTEE_DT", default, deserialize_with = "lenient_string")]
    pub committee_date: String,
    #[serde(rename = "PROC_DT", default, deserialize_with = "lenient_string")]
    pub proc_date: String,
    #[serde(rename = "LAW_PROC_RESULT_CD", default, deserialize_with = "lenient_string")]
    pub law_proc_result_cd: String,
}

/// `ALLBILL` 엔드포인트 행 (bill_no 기반 조회 fallback)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillSummaryRow {
    #[serde(rename = "BILL_ID", default, deserialize_with = "lenient_string")]
    pub bill_id: String,
    #[serde(rename = "BILL_NO", default, deserialize_with = "lenient_string")]
    pub bill_no: String,
    #[serde(rename = "BILL_NM", default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(rename = "PPSL_DT", default, deserialize_with = "lenient_string")]
    pub propose_date: String,
}

/// 상세 페이지에서 추출한 정보
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillDetail {
    /// 제안이유 및 주요내용
    pub summary: String,
    /// 심사진행 단계 (순서대로)
    pub steps: Vec<String>,
    /// `on` 클래스가 붙은 현재 단계
    pub current_step: String,
}

impl BillDetail {
    /// `"접수 > 위원회 심사 > 본회의 심의"`
    #[must_use]
    pub fn step_log(&self) -> String {
        self.steps.join(" > ")
    }

    /// Status-flow steps, 1-based in page order.
    #[must_use]
    pub fn status_flow(&self) -> Vec<(i64, String)> {
        self.steps
            .iter()
            .filter(|s| !s.trim().is_empty())
            .enumerate()
            .map(|(idx, step)| (idx as i64 + 1, step.trim().to_string()))
            .collect()
    }
}

/// 정규화된 의안
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bill {
    /// `PRC_`로 시작하는 외부 의안 ID (business key)
    pub bill_id: String,
    pub bill_no: String,
    pub title: String,
    pub committee_id: Option<i64>,
    pub age: Option<i64>,
    pub proposer: String,
    pub propose_date: Option<NaiveDate>,
    pub law_proc_date: Option<NaiveDate>,
    pub law_present_date: Option<NaiveDate>,
    pub law_submit_date: Option<NaiveDate>,
    pub cmt_proc_date: Option<NaiveDate>,
    pub cmt_present_date: Option<NaiveDate>,
    pub committee_date: Option<NaiveDate>,
    pub proc_date: Option<NaiveDate>,
    pub result: String,
    pub law_proc_result_cd: String,
    pub cmt_proc_result_cd: String,
    pub detail_link: String,
    pub summary: String,
    pub step_log: String,
    pub current_step: String,
}

impl BillRow {
    /// Raw row → `Bill`. The legislative term comes from the import request,
    /// not the row, because the `AGE` column is occasionally blank.
    pub fn to_entity(
        &self,
        detail: &BillDetail,
        committee_id: Option<i64>,
        age: u32,
    ) -> Result<Bill, DomainError> {
        let bill_id = self.bill_id.trim();
        if bill_id.is_empty() {
            return Err(DomainError::MissingBusinessKey { entity: "bill" });
        }

        Ok(Bill {
            bill_id: bill_id.to_string(),
            bill_no: self.bill_no.trim().to_string(),
            title: self.title.trim().to_string(),
            committee_id,
            age: Some(i64::from(age)),
            proposer: self.proposer.trim().to_string(),
            propose_date: parse_ymd(&self.propose_date),
            law_proc_date: parse_ymd(&self.law_proc_date),
            law_present_date: parse_ymd(&self.law_present_date),
            law_submit_date: parse_ymd(&self.law_submit_date),
            cmt_proc_date: parse_ymd(&self.cmt_proc_date),
            cmt_present_date: parse_ymd(&self.cmt_present_date),
            committee_date: parse_ymd(&self.committee_date),
            proc_date: parse_ymd(&self.proc_date),
            result: self.proc_result.trim().to_string(),
            law_proc_result_cd: self.law_proc_result_cd.trim().to_string(),
            cmt_proc_result_cd: self.cmt_proc_result_cd.trim().to_string(),
            detail_link: self.detail_link.trim().to_string(),
            summary: detail.summary.clone(),
            step_log: detail.step_log(),
            current_step: detail.current_step.clone(),
        })
    }
}

impl BillSummaryRow {
    pub fn to_entity(&self, requested_bill_no: &str) -> Result<Bill, DomainError> {
        let bill_id = self.bill_id.trim();
        if bill_id.is_empty() {
            return Err(DomainError::MissingBusinessKey { entity: "bill" });
        }
        Ok(Bill {
            bill_id: bill_id.to_string(),
            bill_no: requested_bill_no.trim().to_string(),
            title: self.title.trim().to_string(),
            propose_date: parse_ymd(&self.propose_date),
            ..Bill::default()
        })
    }
}

/// 심사 진행 단계 한 건 ({bill, step_order} 복합키)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillStep {
    pub bill_pk: i64,
    pub step_order: i64,
    pub step_name: String,
}

/// 발의 구분
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProposerRole {
    /// 대표발의
    Lead,
    /// 공동발의
    Co,
}

impl ProposerRole {
    /// The first anchor on the member list page is the lead proposer.
    #[must_use]
    pub const fn for_position(index: usize) -> Self {
        if index == 0 { Self::Lead } else { Self::Co }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "대표발의",
            Self::Co => "공동발의",
        }
    }
}

/// 의안-의원 관계 ({bill, politician, role} 복합키)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillRelation {
    pub bill_pk: i64,
    pub politician_id: i64,
    pub role: ProposerRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> BillRow {
        serde_json::from_value(serde_json::json!({
            "BILL_ID": "PRC_A1B2C3",
            "BILL_NO": "2200001",
            "BILL_NAME": "정부조직법 일부개정법률안",
            "COMMITTEE": "행정안전위원회",
            "PROPOSE_DT": "2024-06-03",
            "PROC_RESULT": null,
            "AGE": 22,
            "PROC_DT": ""
        }))
        .unwrap()
    }

    #[test]
    fn to_entity_keeps_unknown_dates_as_none() {
        let detail = BillDetail {
            summary: "요약".into(),
            steps: vec!["접수".into(), "위원회 심사".into()],
            current_step: "위원회 심사".into(),
        };
        let bill = sample_row().to_entity(&detail, Some(7), 22).unwrap();

        assert_eq!(bill.bill_id, "PRC_A1B2C3");
        assert_eq!(bill.propose_date, NaiveDate::from_ymd_opt(2024, 6, 3));
        assert_eq!(bill.proc_date, None);
        assert_eq!(bill.result, "");
        assert_eq!(bill.step_log, "접수 > 위원회 심사");
        assert_eq!(bill.committee_id, Some(7));
    }

    #[test]
    fn to_entity_rejects_blank_business_key() {
        let mut row = sample_row();
        row.bill_id = "  ".into();
        let err = row.to_entity(&BillDetail::default(), None, 22).unwrap_err();
        assert_eq!(err, DomainError::MissingBusinessKey { entity: "bill" });
    }

    #[test]
    fn status_flow_is_one_based_and_skips_blanks() {
        let detail = BillDetail {
            steps: vec!["접수".into(), " ".into(), "본회의 심의".into()],
            ..BillDetail::default()
        };
        assert_eq!(
            detail.status_flow(),
            vec![(1, "접수".to_string()), (2, "본회의 심의".to_string())]
        );
    }

    #[test]
    fn first_anchor_is_lead_proposer() {
        assert_eq!(ProposerRole::for_position(0).as_str(), "대표발의");
        assert_eq!(ProposerRole::for_position(3).as_str(), "공동발의");
    }
}
