//! 입법예고 / 의견 도메인 타입
//!
//! Notices and opinions keep the upstream `PRC_` bill id as their parent
//! key: it is also the identifier every legislation-portal URL is built from.

use chrono::NaiveDate;

/// 입법예고 ({bill_id} 키)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegislativeNotice {
    pub bill_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub comments_url: String,
    pub comments_count: i64,
}

/// 진행 중 입법예고 엑셀의 한 행
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeListing {
    pub bill_no: String,
    pub comment_count: i64,
}

/// 의견 목록 페이지에서 읽은 예고 기간과 의견 수
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticePage {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub comments_count: Option<i64>,
}

/// 의견 엑셀 한 행에서 만든 작업 단위
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpinionJob {
    pub bill_id: String,
    pub opinion_no: u64,
    pub subject: String,
    pub author: String,
    pub created_at: String,
}

/// 등록 의견 ({bill_id, opinion_no} 키)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegislativeOpinion {
    pub bill_id: String,
    pub opinion_no: u64,
    pub subject: String,
    pub content: String,
    pub author: String,
    pub created_at: NaiveDate,
    pub is_anonymous: Option<bool>,
    pub agreement: Option<bool>,
}

const ANONYMOUS_MARKER: &str = "[비공개]";

/// `[비공개]` 표시가 있으면 익명 의견
#[must_use]
pub fn infer_anonymous(subject: &str, content: &str) -> Option<bool> {
    let text = format!("{subject} {content}").to_lowercase();
    Some(text.contains(ANONYMOUS_MARKER))
}

/// 찬성/반대 단어 수 비교. 동수이거나 둘 다 없으면 판단하지 않는다.
#[must_use]
pub fn infer_agreement(subject: &str, content: &str) -> Option<bool> {
    let text = format!("{subject} {content}").to_lowercase();
    let pos = text.matches("찬성").count();
    let neg = text.matches("반대").count();
    match pos.cmp(&neg) {
        std::cmp::Ordering::Greater => Some(true),
        std::cmp::Ordering::Less => Some(false),
        std::cmp::Ordering::Equal => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_counts_keywords() {
        assert_eq!(infer_agreement("이 법안에 찬성합니다", ""), Some(true));
        assert_eq!(infer_agreement("반대", "강력히 반대, 찬성 불가"), Some(false));
        assert_eq!(infer_agreement("찬성 반대", ""), None);
        assert_eq!(infer_agreement("의견 없음", ""), None);
    }

    #[test]
    fn anonymous_marker_in_subject() {
        assert_eq!(infer_anonymous("[비공개] 의견", ""), Some(true));
        assert_eq!(infer_anonymous("공개 의견", ""), Some(false));
    }
}
