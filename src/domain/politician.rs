//! 국회의원(Politician) 도메인 타입
//!
//! One raw record from the member endpoints splits into five entities keyed
//! by the politician's `mona_cd` (business key) and, for terms, the
//! legislative term number.

use chrono::NaiveDate;
use serde::Deserialize;

use super::dates::parse_birth_date;
use super::{DomainError, lenient_string};

/// 국회의원 API 원본 행 (현역/역대/통합 엔드포인트 공통)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoliticianRow {
    #[serde(rename = "MONA_CD", default, deserialize_with = "lenient_string")]
    pub mona_cd: String,
    #[serde(rename = "HG_NM", default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "HJ_NM", default, deserialize_with = "lenient_string")]
    pub hanja_name: String,
    #[serde(rename = "ENG_NM", default, deserialize_with = "lenient_string")]
    pub eng_name: String,
    #[serde(rename = "BTH_DATE", default, deserialize_with = "lenient_string")]
    pub birth_date: String,
    #[serde(rename = "SEX_GBN_NM", default, deserialize_with = "lenient_string")]
    pub gender: String,
    #[serde(rename = "POLY_NM", default, deserialize_with = "lenient_string")]
    pub party: String,
    #[serde(rename = "ORIG_NM", default, deserialize_with = "lenient_string")]
    pub constituency: String,
    #[serde(rename = "REELE_GBN_NM", default, deserialize_with = "lenient_string")]
    pub reelected: String,
    #[serde(rename = "UNITS", default, deserialize_with = "lenient_string")]
    pub units: String,
    #[serde(rename = "ELECT_GBN_NM", default, deserialize_with = "lenient_string")]
    pub election_type: String,
    #[serde(rename = "JOB_RES_NM", default, deserialize_with = "lenient_string")]
    pub job_title: String,
    #[serde(rename = "CMIT_NM", default, deserialize_with = "lenient_string")]
    pub committee_main: String,
    #[serde(rename = "CMITS", default, deserialize_with = "lenient_string")]
    pub committees: String,
    #[serde(rename = "TEL_NO", default, deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(rename = "E_MAIL", default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(rename = "HOMEPAGE", default, deserialize_with = "lenient_string")]
    pub homepage: String,
    #[serde(rename = "STAFF", default, deserialize_with = "lenient_string")]
    pub staff: String,
    #[serde(rename = "SECRETARY", default, deserialize_with = "lenient_string")]
    pub secretary: String,
    #[serde(rename = "SECRETARY2", default, deserialize_with = "lenient_string")]
    pub secretary2: String,
    #[serde(rename = "ASSEM_ADDR", default, deserialize_with = "lenient_string")]
    pub office_room: String,
    #[serde(rename = "MEM_TITLE", default, deserialize_with = "lenient_string")]
    pub career: String,
}

/// SNS API 원본 행
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnsRow {
    #[serde(rename = "HG_NM", default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "MONA_CD", default, deserialize_with = "lenient_string")]
    pub mona_cd: String,
    #[serde(rename = "T_URL", default, deserialize_with = "lenient_string")]
    pub twitter_url: String,
    #[serde(rename = "F_URL", default, deserialize_with = "lenient_string")]
    pub facebook_url: String,
    #[serde(rename = "Y_URL", default, deserialize_with = "lenient_string")]
    pub youtube_url: String,
    #[serde(rename = "B_URL", default, deserialize_with = "lenient_string")]
    pub blog_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Politician {
    /// 국회의원 고유 코드
    pub mona_cd: String,
    pub name: String,
    pub hanja_name: String,
    pub eng_name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: String,
}

/// 대수별 재임 정보 ({politician, unit} 복합키)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoliticianTerm {
    pub unit: u32,
    pub party: String,
    pub constituency: String,
    pub reelected: String,
    pub job_title: String,
    pub committee_main: String,
    pub committees: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoliticianContact {
    pub phone: String,
    pub email: String,
    pub homepage: String,
    pub office_room: String,
    pub staff: String,
    pub secretary: String,
    pub secretary2: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoliticianCareer {
    pub career: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoliticianSns {
    pub twitter_url: String,
    pub facebook_url: String,
    pub youtube_url: String,
    pub blog_url: String,
}

/// 원본 한 행에서 분리된 엔티티 묶음
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoliticianRecord {
    pub politician: Politician,
    pub term: PoliticianTerm,
    pub contact: PoliticianContact,
    pub career: PoliticianCareer,
}

/// Proposer Resolver 입력 후보 (politicians ⋈ politician_terms 투영)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub politician_id: i64,
    pub mona_cd: String,
    pub hanja_name: String,
    pub unit: u32,
    pub party: String,
}

/// Every number in a `UNITS` text such as `"제20대, 제21대, 제22대"`.
fn unit_numbers(units: &str) -> impl Iterator<Item = u32> + '_ {
    units
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
}

/// Largest term number found in a `UNITS` text.
#[must_use]
pub fn latest_unit(units: &str) -> Option<u32> {
    unit_numbers(units).max()
}

impl PoliticianRow {
    #[must_use]
    pub fn latest_unit(&self) -> Option<u32> {
        latest_unit(&self.units)
    }

    /// `ToEntities`: 원본 → Politician / Term / Contact / Career
    pub fn to_entities(&self, unit: u32, today: NaiveDate) -> Result<PoliticianRecord, DomainError> {
        let mona_cd = self.mona_cd.trim();
        if mona_cd.is_empty() {
            return Err(DomainError::MissingBusinessKey { entity: "politician" });
        }

        Ok(PoliticianRecord {
            politician: Politician {
                mona_cd: mona_cd.to_string(),
                name: self.name.trim().to_string(),
                hanja_name: self.hanja_name.trim().to_string(),
                eng_name: self.eng_name.trim().to_string(),
                birth_date: parse_birth_date(&self.birth_date, today),
                gender: self.gender.trim().to_string(),
            },
            term: PoliticianTerm {
                unit,
                party: self.party.trim().to_string(),
                constituency: self.constituency.trim().to_string(),
                reelected: self.reelected.trim().to_string(),
                job_title: self.job_title.trim().to_string(),
                committee_main: self.committee_main.trim().to_string(),
                committees: self.committees.trim().to_string(),
            },
            contact: PoliticianContact {
                phone: self.phone.trim().to_string(),
                email: self.email.trim().to_string(),
                homepage: self.homepage.trim().to_string(),
                office_room: self.office_room.trim().to_string(),
                staff: self.staff.trim().to_string(),
                secretary: self.secretary.trim().to_string(),
                secretary2: self.secretary2.trim().to_string(),
            },
            career: PoliticianCareer {
                career: self.career.trim().to_string(),
            },
        })
    }
}

impl SnsRow {
    #[must_use]
    pub fn to_entity(&self) -> PoliticianSns {
        PoliticianSns {
            twitter_url: self.twitter_url.trim().to_string(),
            facebook_url: self.facebook_url.trim().to_string(),
            youtube_url: self.youtube_url.trim().to_string(),
            blog_url: self.blog_url.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_unit_picks_the_largest_number() {
        assert_eq!(latest_unit("제20대, 제21대, 제22대"), Some(22));
        assert_eq!(latest_unit("제9대"), Some(9));
        assert_eq!(latest_unit(""), None);
    }

    #[test]
    fn to_entities_splits_row() {
        let row: PoliticianRow = serde_json::from_value(serde_json::json!({
            "MONA_CD": "ABC123",
            "HG_NM": "홍길동",
            "HJ_NM": "洪吉東",
            "BTH_DATE": "1970-00-00",
            "POLY_NM": "무소속",
            "UNITS": "제21대, 제22대",
            "TEL_NO": "02-788-0000",
            "MEM_TITLE": "前 구청장"
        }))
        .unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let record = row.to_entities(row.latest_unit().unwrap(), today).unwrap();
        assert_eq!(record.politician.mona_cd, "ABC123");
        assert_eq!(record.politician.birth_date, NaiveDate::from_ymd_opt(1970, 1, 1));
        assert_eq!(record.term.unit, 22);
        assert_eq!(record.term.party, "무소속");
        assert_eq!(record.contact.phone, "02-788-0000");
        assert_eq!(record.career.career, "前 구청장");
    }

    #[test]
    fn to_entities_requires_mona_cd() {
        let row = PoliticianRow { name: "홍길동".into(), ..PoliticianRow::default() };
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(row.to_entities(22, today).is_err());
    }
}
