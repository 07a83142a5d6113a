//! 날짜 파싱 유틸리티
//!
//! Upstream sources write dates as `YYYY-MM-DD`, `YYYYMMDD` or partially
//! unknown values such as `1960-00-00`. Unknown stays `None`.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};

/// 생년월일이 미래로 기록된 경우 대체하는 날짜
pub const FUTURE_BIRTH_PLACEHOLDER: (i32, u32, u32) = (1919, 3, 1);

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Korea Standard Time (UTC+9)
#[must_use]
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Strict `YYYY-MM-DD` parse. Blank input is "unknown", not an error.
#[must_use]
pub fn parse_ymd(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

/// 생년월일 파싱 (보정 포함)
///
/// 1. `YYYY-MM-DD` / `YYYYMMDD` 정상 포맷
/// 2. 연/월/일 분해 후 `00`, `-`, 빈 값은 `01`로 보정
/// 3. 존재하지 않는 날짜는 해당 연도 1월 1일
///
/// A date after `today` is replaced with [`FUTURE_BIRTH_PLACEHOLDER`].
#[must_use]
pub fn parse_birth_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let clamp = |date: NaiveDate| {
        if date > today {
            let (y, m, d) = FUTURE_BIRTH_PLACEHOLDER;
            NaiveDate::from_ymd_opt(y, m, d)
        } else {
            Some(date)
        }
    };

    for layout in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, layout) {
            return clamp(date);
        }
    }

    let (year, month, day) = if raw.contains('-') {
        let mut parts = raw.split('-');
        (
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
        )
    } else if raw.len() == 8 && raw.is_char_boundary(4) && raw.is_char_boundary(6) {
        (&raw[..4], &raw[4..6], &raw[6..])
    } else if raw.len() == 4 {
        (raw, "", "")
    } else {
        return None;
    };

    if year.is_empty() {
        return None;
    }
    let fill = |part: &str| {
        if part.is_empty() || part == "00" || part == "-" {
            "01".to_string()
        } else {
            part.to_string()
        }
    };

    let candidate = format!("{}-{}-{}", year, fill(month), fill(day));
    match NaiveDate::parse_from_str(&candidate, "%Y-%m-%d") {
        Ok(date) => clamp(date),
        Err(_) => year
            .parse::<i32>()
            .ok()
            .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)),
    }
}

/// `"2025-01-01 ~ 2025-01-10"` → (start, end)
#[must_use]
pub fn parse_period(raw: &str) -> Option<(NaiveDate, NaiveDate)> {
    let mut parts = raw.split('~');
    let start = parse_ymd(parts.next()?)?;
    let end = parse_ymd(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((start, end))
}

/// Timestamp fragment used in downloaded file names (`yyMMddHHmm`).
#[must_use]
pub fn file_stamp<Tz: chrono::TimeZone>(now: &chrono::DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%y%m%d%H%M").to_string()
}

/// 오늘 날짜 (KST 기준)
#[must_use]
pub fn today_kst() -> NaiveDate {
    Utc::now().with_timezone(&kst()).date_naive()
}
