//! HTML extraction for server-rendered pages
//!
//! - 의안 상세 페이지: 제안이유 및 주요내용, 심사진행 단계
//! - 발의자 명단 페이지: 제안자 anchor 텍스트
//! - 입법예고 의견 목록 페이지: 입법예고기간, 의견 수

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::domain::dates::parse_period;
use crate::domain::{BillDetail, NoticePage};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HtmlError {
    #[error("invalid selector {selector}: {message}")]
    Selector { selector: &'static str, message: String },

    #[error("{0} not found in page")]
    Missing(&'static str),

    #[error("unparseable {field}: {value:?}")]
    Invalid { field: &'static str, value: String },
}

const SUMMARY: &str = "#summaryContentDiv";
const STEPS: &str = "div.stepType01 span";
const MEMBER_ANCHORS: &str = "div.layerInScroll a";
const NOTICE_DATES: &str = "ul.m_date li";
const COMMENT_COUNT: &str = "div.board_count";
const NOTICE_PERIOD_PREFIX: &str = "입법예고기간 :";

/// `전체 1,204건` → `1,204`
static COUNT_DIGITS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\d[\d,]*").ok());

fn selector(css: &'static str) -> Result<Selector, HtmlError> {
    Selector::parse(css).map_err(|e| HtmlError::Selector {
        selector: css,
        message: e.to_string(),
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn clean_text(raw: &str) -> String {
    raw.replace('\u{a0}', " ")
        .replace('\t', "")
        .replace("\r\n", "\n")
        .trim()
        .to_string()
}

/// 의안 상세 페이지
pub fn parse_bill_detail(html: &str) -> Result<BillDetail, HtmlError> {
    let document = Html::parse_document(html);

    let summary = document
        .select(&selector(SUMMARY)?)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .unwrap_or_default();

    let mut steps = Vec::new();
    let mut current_step = String::new();
    for span in document.select(&selector(STEPS)?) {
        let text = element_text(&span);
        if text.is_empty() {
            continue;
        }
        if span.value().classes().any(|class| class == "on") {
            current_step.clone_from(&text);
        }
        steps.push(text);
    }

    Ok(BillDetail {
        summary,
        steps,
        current_step,
    })
}

/// 발의자 명단. 첫 번째 anchor가 대표발의자.
pub fn parse_member_list(html: &str) -> Result<Vec<String>, HtmlError> {
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector(MEMBER_ANCHORS)?)
        .map(|anchor| element_text(&anchor))
        .collect())
}

/// 입법예고 의견 목록 페이지
pub fn parse_notice_page(html: &str) -> Result<NoticePage, HtmlError> {
    let document = Html::parse_document(html);

    let period = document
        .select(&selector(NOTICE_DATES)?)
        .map(|li| element_text(&li))
        .find_map(|text| text.strip_prefix(NOTICE_PERIOD_PREFIX).map(str::to_string))
        .ok_or(HtmlError::Missing("입법예고기간"))?;

    let (start_date, end_date) = parse_period(&period).ok_or_else(|| HtmlError::Invalid {
        field: "입법예고기간",
        value: period.clone(),
    })?;

    let comments_count = document
        .select(&selector(COMMENT_COUNT)?)
        .next()
        .and_then(|el| {
            let text = element_text(&el);
            let digits = COUNT_DIGITS.as_ref()?.find(&text)?;
            digits.as_str().replace(',', "").parse::<i64>().ok()
        });

    Ok(NoticePage {
        start_date,
        end_date,
        comments_count,
    })
}
