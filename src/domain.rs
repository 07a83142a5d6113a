//! Domain module - 입법 데이터 엔티티와 정규화 규칙
//!
//! Raw rows as received from the open API and spreadsheets live next to the
//! normalized entities they turn into. Normalization is pure: no I/O happens
//! in this layer.
//!
//! Modern Rust module organization:
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

pub mod bill;
pub mod dates;
pub mod legislation;
pub mod politician;
pub mod repositories;
pub mod session;

pub use bill::{Bill, BillDetail, BillRelation, BillRow, BillStep, BillSummaryRow, ProposerRole};
pub use legislation::{
    LegislativeNotice, LegislativeOpinion, NoticeListing, NoticePage, OpinionJob,
};
pub use politician::{
    Candidate, Politician, PoliticianCareer, PoliticianContact, PoliticianRecord, PoliticianRow,
    PoliticianSns, PoliticianTerm, SnsRow,
};
pub use repositories::{LegislativeStore, StoreError, StoreResult};
pub use session::{Session, SessionCookie};

/// 정규화 실패 (data-quality 범주)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{entity} has an empty business key")]
    MissingBusinessKey { entity: &'static str },

    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Upstream JSON mixes `null`, numbers and strings for the same field.
/// Every scalar is read as its string form; `null` and missing become "".
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "lenient_string")]
        field: String,
    }

    #[test]
    fn lenient_string_accepts_null_number_and_missing() {
        let p: Probe = serde_json::from_str(r#"{"field": null}"#).unwrap();
        assert_eq!(p.field, "");
        let p: Probe = serde_json::from_str(r#"{"field": 22}"#).unwrap();
        assert_eq!(p.field, "22");
        let p: Probe = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(p.field, "");
        let p: Probe = serde_json::from_str(r#"{"field": "제22대"}"#).unwrap();
        assert_eq!(p.field, "제22대");
    }
}
