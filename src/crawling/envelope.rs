//! 열린국회정보 응답 envelope
//!
//! ```json
//! {"<resource>": [
//!     {"head": [{"list_total_count": 250}, {"RESULT": {"CODE": "INFO-000", "MESSAGE": "정상 처리되었습니다."}}]},
//!     {"row": [ ... ]}
//! ]}
//! ```
//!
//! An empty query answers with a bare `{"RESULT": {...}}` object instead.
//! Only a full two-section envelope can carry rows or an upstream error.
//! Decoding yields one of three outcomes so callers never inspect vendor
//! field names themselves.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

pub const CODE_OK: &str = "INFO-000";
pub const CODE_NO_DATA: &str = "INFO-200";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<T> {
    Rows { total_count: u64, rows: Vec<T> },
    NoData,
    Failed { code: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed envelope: {0}")]
pub struct EnvelopeError(pub String);

#[derive(Debug, Deserialize)]
struct ResultCode {
    #[serde(rename = "CODE", default)]
    code: String,
    #[serde(rename = "MESSAGE", default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct HeadEntry {
    #[serde(default)]
    list_total_count: Option<u64>,
    #[serde(rename = "RESULT", default)]
    result: Option<ResultCode>,
}

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Section<T> {
    #[serde(default)]
    head: Option<Vec<HeadEntry>>,
    #[serde(default)]
    row: Option<Vec<T>>,
}

/// Classify a response body for `resource`.
///
/// Anything shorter than a head section plus a row section is `NoData`,
/// whatever its result code says. A non-INFO code there is only logged.
pub fn decode<T: DeserializeOwned>(body: &[u8], resource: &str) -> Result<Envelope<T>, EnvelopeError> {
    let root: Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| EnvelopeError(e.to_string()))?;

    let sections: Vec<Value> = if let Some(value) = root.get(resource) {
        match value {
            Value::Array(items) => items.clone(),
            other => return Err(EnvelopeError(format!("{resource} is not an array: {other}"))),
        }
    } else if root.contains_key("head") {
        vec![Value::Object(root.clone())]
    } else if let Some(result) = root.get("RESULT") {
        let result: ResultCode =
            serde_json::from_value(result.clone()).map_err(|e| EnvelopeError(e.to_string()))?;
        log_short_envelope(resource, Some(&result));
        return Ok(Envelope::NoData);
    } else {
        return Err(EnvelopeError(format!("no `{resource}` key and no RESULT")));
    };

    let has_data_section = sections.len() >= 2;
    let mut result = None;
    let mut total_count = 0;
    let mut rows = Vec::new();
    for section in sections {
        let section: Section<T> =
            serde_json::from_value(section).map_err(|e| EnvelopeError(e.to_string()))?;
        for entry in section.head.unwrap_or_default() {
            if let Some(count) = entry.list_total_count {
                total_count = count;
            }
            if entry.result.is_some() {
                result = entry.result;
            }
        }
        if let Some(mut section_rows) = section.row {
            rows.append(&mut section_rows);
        }
    }

    if !has_data_section {
        log_short_envelope(resource, result.as_ref());
        return Ok(Envelope::NoData);
    }

    match result {
        Some(result) => Ok(classify(result, total_count, rows)),
        None => Ok(Envelope::Rows { total_count, rows }),
    }
}

fn log_short_envelope(resource: &str, result: Option<&ResultCode>) {
    if let Some(result) = result {
        if result.code != CODE_OK && result.code != CODE_NO_DATA {
            warn!(
                "⚠️ {}: short envelope treated as no data ({} {})",
                resource, result.code, result.message
            );
        }
    }
}

fn classify<T>(result: ResultCode, total_count: u64, rows: Vec<T>) -> Envelope<T> {
    match result.code.as_str() {
        CODE_OK => Envelope::Rows { total_count, rows },
        CODE_NO_DATA => Envelope::NoData,
        _ => Envelope::Failed {
            code: result.code,
            message: result.message,
        },
    }
}

/// `ceil(total_count / page_size)`; a zero page size yields zero pages.
#[must_use]
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_count.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        #[serde(rename = "BILL_ID")]
        bill_id: String,
    }

    #[test]
    fn success_envelope_returns_rows_and_total() {
        let body = br#"{"nzmimeepazxkubdpn":[
            {"head":[{"list_total_count":250},{"RESULT":{"CODE":"INFO-000","MESSAGE":"ok"}}]},
            {"row":[{"BILL_ID":"PRC_1"},{"BILL_ID":"PRC_2"}]}
        ]}"#;
        let envelope: Envelope<Row> = decode(body, "nzmimeepazxkubdpn").unwrap();
        assert_eq!(
            envelope,
            Envelope::Rows {
                total_count: 250,
                rows: vec![Row { bill_id: "PRC_1".into() }, Row { bill_id: "PRC_2".into() }],
            }
        );
    }

    #[test]
    fn head_only_no_data_is_a_sentinel() {
        let body = r#"{"head":[{"RESULT":{"CODE":"INFO-200","MESSAGE":"해당하는 데이터가 없습니다."}}]}"#.as_bytes();
        let envelope: Envelope<Row> = decode(body, "nzmimeepazxkubdpn").unwrap();
        assert_eq!(envelope, Envelope::NoData);
    }

    #[test]
    fn bare_result_object_is_no_data_whatever_the_code() {
        let body = br#"{"RESULT":{"CODE":"INFO-200","MESSAGE":"no data"}}"#;
        assert_eq!(decode::<Row>(body, "x").unwrap(), Envelope::NoData);

        let body = r#"{"RESULT":{"CODE":"ERROR-290","MESSAGE":"인증키가 유효하지 않습니다."}}"#.as_bytes();
        assert_eq!(decode::<Row>(body, "x").unwrap(), Envelope::NoData);
    }

    #[test]
    fn single_section_error_code_is_no_data() {
        let body = br#"{"x":[{"head":[{"list_total_count":0},{"RESULT":{"CODE":"ERROR-300","MESSAGE":"m"}}]}]}"#;
        assert_eq!(decode::<Row>(body, "x").unwrap(), Envelope::NoData);
    }

    #[test]
    fn full_envelope_with_error_code_fails() {
        let body = br#"{"x":[{"head":[{"list_total_count":0},{"RESULT":{"CODE":"ERROR-500","MESSAGE":"server"}}]},{"row":[]}]}"#;
        assert_eq!(
            decode::<Row>(body, "x").unwrap(),
            Envelope::Failed {
                code: "ERROR-500".into(),
                message: "server".into()
            }
        );
    }

    #[test]
    fn single_section_envelope_is_no_data() {
        let body = br#"{"x":[{"head":[{"list_total_count":0},{"RESULT":{"CODE":"INFO-000","MESSAGE":"ok"}}]}]}"#;
        assert_eq!(decode::<Row>(body, "x").unwrap(), Envelope::NoData);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(decode::<Row>(b"<html>", "x").is_err());
        assert!(decode::<Row>(br#"{"other":1}"#, "x").is_err());
    }

    #[rstest]
    #[case(250, 100, 3)]
    #[case(200, 100, 2)]
    #[case(0, 100, 0)]
    #[case(1, 100, 1)]
    #[case(10, 0, 0)]
    fn total_pages_rounds_up(#[case] total: u64, #[case] size: u32, #[case] expected: u32) {
        assert_eq!(total_pages(total, size), expected);
    }
}
