//! Proposer Resolver
//!
//! 발의자 명단의 `홍길동(더불어민주당/洪吉東)` 텍스트를 국회의원 ID로 매칭한다.
//!
//! Candidates are every (politician, term) row sharing the name. The cascade
//! runs from the strongest signal to the weakest and stops at the first step
//! that narrows to a single answer:
//!
//! 1. one distinct `mona_cd` among all candidates
//! 2. alternate-script (hanja) name equality
//! 3. party equality
//! 4. party and legislative term equality
//! 5. term equality with party ignored, one distinct `mona_cd` (fallback)

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Candidate, LegislativeStore, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unparseable proposer text: {0:?}")]
    Unparseable(String),

    #[error("no match found for {name} ({party} / {unit}대)")]
    NoMatch { name: String, party: String, unit: u32 },

    #[error("multiple candidates for {name} ({party} / {unit}대): {candidates:?}")]
    Ambiguous {
        name: String,
        party: String,
        unit: u32,
        candidates: Vec<String>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parsed anchor text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposerText {
    pub name: String,
    pub party: String,
    pub hanja_name: String,
}

/// `이름(정당/漢字)` or a bare name of at least two characters. Any other
/// shape is a parse failure.
#[must_use]
pub fn parse_proposer_text(text: &str) -> Option<ProposerText> {
    let text = text.trim();

    if text.contains('(') && text.contains('/') && text.contains(')') {
        if let Some((name, rest)) = text.split_once('(') {
            let rest = rest.strip_suffix(')').unwrap_or(rest);
            let parts: Vec<&str> = rest.split('/').collect();
            if let [party, hanja] = parts.as_slice() {
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                return Some(ProposerText {
                    name: name.to_string(),
                    party: party.trim().to_string(),
                    hanja_name: hanja.trim().to_string(),
                });
            }
        }
    }

    if !text.contains(['(', ')', '/']) && text.chars().count() >= 2 {
        return Some(ProposerText {
            name: text.to_string(),
            ..ProposerText::default()
        });
    }

    None
}

/// Resolver input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposerQuery {
    pub name: String,
    pub hanja_name: String,
    pub party: String,
    pub unit: u32,
}

impl ProposerQuery {
    #[must_use]
    pub fn from_text(text: ProposerText, unit: u32) -> Self {
        Self {
            name: text.name,
            hanja_name: text.hanja_name,
            party: text.party,
            unit,
        }
    }
}

/// Cascade step that produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStep {
    UniqueCode,
    AlternateName,
    Party,
    PartyAndTerm,
    TermFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub politician_id: i64,
    pub mona_cd: String,
    pub step: ResolveStep,
}

/// How a step decides that its survivors are unique
#[derive(Debug, Clone, Copy)]
enum Uniqueness {
    OneRow,
    OneCode,
}

type Narrow = for<'a> fn(&ProposerQuery, &'a [Candidate]) -> Vec<&'a Candidate>;

fn all_candidates<'a>(_: &ProposerQuery, all: &'a [Candidate]) -> Vec<&'a Candidate> {
    all.iter().collect()
}

fn same_hanja<'a>(q: &ProposerQuery, all: &'a [Candidate]) -> Vec<&'a Candidate> {
    all.iter().filter(|c| c.hanja_name == q.hanja_name).collect()
}

fn same_party<'a>(q: &ProposerQuery, all: &'a [Candidate]) -> Vec<&'a Candidate> {
    all.iter().filter(|c| c.party == q.party).collect()
}

fn same_party_and_term<'a>(q: &ProposerQuery, all: &'a [Candidate]) -> Vec<&'a Candidate> {
    same_party(q, all).into_iter().filter(|c| c.unit == q.unit).collect()
}

fn same_term<'a>(q: &ProposerQuery, all: &'a [Candidate]) -> Vec<&'a Candidate> {
    all.iter().filter(|c| c.unit == q.unit).collect()
}

const CASCADE: [(ResolveStep, Narrow, Uniqueness); 5] = [
    (ResolveStep::UniqueCode, all_candidates, Uniqueness::OneCode),
    (ResolveStep::AlternateName, same_hanja, Uniqueness::OneRow),
    (ResolveStep::Party, same_party, Uniqueness::OneRow),
    (ResolveStep::PartyAndTerm, same_party_and_term, Uniqueness::OneRow),
    (ResolveStep::TermFallback, same_term, Uniqueness::OneCode),
];

fn unique<'a>(survivors: &[&'a Candidate], rule: Uniqueness) -> Option<&'a Candidate> {
    match rule {
        Uniqueness::OneRow => match survivors {
            [only] => Some(*only),
            _ => None,
        },
        Uniqueness::OneCode => {
            let codes: BTreeSet<&str> = survivors.iter().map(|c| c.mona_cd.as_str()).collect();
            if codes.len() == 1 { survivors.first().copied() } else { None }
        }
    }
}

/// Run the cascade over already-loaded candidates.
pub fn resolve_candidates(query: &ProposerQuery, candidates: &[Candidate]) -> Result<Resolution, ResolveError> {
    let mut last_survivors = Vec::new();
    for (step, narrow, rule) in CASCADE {
        let survivors = narrow(query, candidates);
        if let Some(found) = unique(&survivors, rule) {
            if step == ResolveStep::TermFallback {
                warn!(
                    "⚠️ fallback match used (정당 무시): {} ({} / {}대)",
                    query.name, query.party, query.unit
                );
            }
            return Ok(Resolution {
                politician_id: found.politician_id,
                mona_cd: found.mona_cd.clone(),
                step,
            });
        }
        last_survivors = survivors;
    }

    if last_survivors.len() > 1 {
        for c in &last_survivors {
            warn!(
                "🔍 ambiguous fallback candidate: mona_cd={}, unit={}, party={}",
                c.mona_cd, c.unit, c.party
            );
        }
        return Err(ResolveError::Ambiguous {
            name: query.name.clone(),
            party: query.party.clone(),
            unit: query.unit,
            candidates: last_survivors.iter().map(|c| c.mona_cd.clone()).collect(),
        });
    }

    Err(ResolveError::NoMatch {
        name: query.name.clone(),
        party: query.party.clone(),
        unit: query.unit,
    })
}

/// Loads candidates through the Persistence Gateway and runs the cascade.
#[derive(Clone)]
pub struct ProposerResolver {
    store: Arc<dyn LegislativeStore>,
}

impl ProposerResolver {
    pub fn new(store: Arc<dyn LegislativeStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, query: &ProposerQuery) -> Result<Resolution, ResolveError> {
        let candidates = self.store.find_candidates(&query.name).await?;
        let resolution = resolve_candidates(query, &candidates)?;
        debug!(
            "🔗 {} → {} ({:?})",
            query.name, resolution.mona_cd, resolution.step
        );
        Ok(resolution)
    }

    /// Parse anchor text and resolve it for legislative term `unit`.
    pub async fn resolve_text(&self, text: &str, unit: u32) -> Result<Resolution, ResolveError> {
        let parsed = parse_proposer_text(text).ok_or_else(|| ResolveError::Unparseable(text.to_string()))?;
        self.resolve(&ProposerQuery::from_text(parsed, unit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn candidate(id: i64, code: &str, party: &str, unit: u32, hanja: &str) -> Candidate {
        Candidate {
            politician_id: id,
            mona_cd: code.into(),
            hanja_name: hanja.into(),
            unit,
            party: party.into(),
        }
    }

    fn query(party: &str, unit: u32, hanja: &str) -> ProposerQuery {
        ProposerQuery {
            name: "홍길동".into(),
            hanja_name: hanja.into(),
            party: party.into(),
            unit,
        }
    }

    #[rstest]
    #[case("홍길동(더불어민주당/洪吉東)", Some(("홍길동", "더불어민주당", "洪吉東")))]
    #[case(" 김철수 ( 국민의힘 / 金哲洙 ) ", Some(("김철수", "국민의힘", "金哲洙")))]
    #[case("홍성우", Some(("홍성우", "", "")))]
    #[case("홍(길동)", None)]
    #[case("홍길동(a/b/c)", None)]
    #[case("김", None)]
    #[case("", None)]
    fn parses_proposer_text(#[case] text: &str, #[case] expected: Option<(&str, &str, &str)>) {
        let parsed = parse_proposer_text(text);
        let expected = expected.map(|(name, party, hanja)| ProposerText {
            name: name.into(),
            party: party.into(),
            hanja_name: hanja.into(),
        });
        assert_eq!(parsed, expected);
    }

    #[test]
    fn single_code_wins_regardless_of_party_and_term() {
        let candidates = vec![
            candidate(7, "A", "X", 20, "洪吉東"),
            candidate(7, "A", "Y", 21, "洪吉東"),
        ];
        let r = resolve_candidates(&query("Z", 99, "?"), &candidates).unwrap();
        assert_eq!((r.politician_id, r.step), (7, ResolveStep::UniqueCode));
    }

    #[test]
    fn party_narrows_before_term() {
        let candidates = vec![candidate(1, "A", "X", 1, ""), candidate(2, "B", "Y", 1, "")];
        let r = resolve_candidates(&query("X", 1, ""), &candidates).unwrap();
        assert_eq!(r.mona_cd, "A");
        assert_eq!(r.step, ResolveStep::Party);
    }

    #[test]
    fn hanja_narrows_before_party() {
        let candidates = vec![
            candidate(1, "A", "X", 1, "洪吉東"),
            candidate(2, "B", "X", 1, "洪吉童"),
        ];
        let r = resolve_candidates(&query("X", 1, "洪吉童"), &candidates).unwrap();
        assert_eq!((r.mona_cd.as_str(), r.step), ("B", ResolveStep::AlternateName));
    }

    #[test]
    fn party_and_term_uses_party_survivors() {
        let candidates = vec![
            candidate(1, "A", "X", 20, ""),
            candidate(2, "B", "X", 21, ""),
            candidate(3, "C", "Y", 21, ""),
        ];
        let r = resolve_candidates(&query("X", 21, ""), &candidates).unwrap();
        assert_eq!((r.mona_cd.as_str(), r.step), ("B", ResolveStep::PartyAndTerm));
    }

    #[test]
    fn fallback_ignores_party() {
        let candidates = vec![
            candidate(1, "A", "X", 20, ""),
            candidate(2, "B", "Y", 21, ""),
            candidate(2, "B", "Y", 21, ""),
        ];
        let r = resolve_candidates(&query("Q", 21, ""), &candidates).unwrap();
        assert_eq!((r.mona_cd.as_str(), r.step), ("B", ResolveStep::TermFallback));
    }

    #[test]
    fn ambiguous_and_no_match_are_distinct() {
        let candidates = vec![candidate(1, "A", "X", 21, ""), candidate(2, "B", "X", 21, "")];
        let err = resolve_candidates(&query("X", 21, ""), &candidates).unwrap_err();
        assert!(matches!(err, ResolveError::Ambiguous { ref candidates, .. } if candidates.len() == 2));

        let err = resolve_candidates(&query("X", 22, ""), &candidates).unwrap_err();
        assert!(matches!(err, ResolveError::NoMatch { unit: 22, .. }));

        let err = resolve_candidates(&query("X", 22, ""), &[]).unwrap_err();
        assert!(matches!(err, ResolveError::NoMatch { .. }));
    }
}
