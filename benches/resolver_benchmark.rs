//! 발의자 매칭 cascade 벤치마크
//!
//! - 동명이인이 없는 경우: 1단계에서 종료
//! - 동명이인 다수: 정당+대수 단계까지 진행

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use gwatch_pipeline::crawling::{ProposerQuery, parse_proposer_text, resolve_candidates};
use gwatch_pipeline::domain::Candidate;

fn candidate(id: i64, mona_cd: &str, hanja: &str, unit: u32, party: &str) -> Candidate {
    Candidate {
        politician_id: id,
        mona_cd: mona_cd.to_string(),
        hanja_name: hanja.to_string(),
        unit,
        party: party.to_string(),
    }
}

/// `homonyms` members sharing one name, each with terms 17..=22.
fn homonym_pool(homonyms: i64) -> Vec<Candidate> {
    let parties = ["더불어민주당", "국민의힘", "정의당", "무소속"];
    (0..homonyms)
        .flat_map(|id| {
            (17..=22).map(move |unit| {
                candidate(
                    id,
                    &format!("MONA{id}"),
                    "金哲洙",
                    unit,
                    parties[((id + i64::from(unit)) % 4) as usize],
                )
            })
        })
        .collect()
}

fn bench_resolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("proposer_resolver");

    let single = vec![candidate(1, "MONA1", "洪吉東", 22, "더불어민주당")];
    let query = ProposerQuery {
        name: "홍길동".into(),
        hanja_name: "洪吉東".into(),
        party: "더불어민주당".into(),
        unit: 22,
    };
    group.bench_function("unique_code", |b| {
        b.iter(|| resolve_candidates(black_box(&query), black_box(&single)));
    });

    let crowded = homonym_pool(4);
    let query = ProposerQuery {
        name: "김철수".into(),
        hanja_name: "金哲洙".into(),
        party: "국민의힘".into(),
        unit: 22,
    };
    group.bench_function("homonyms_party_and_term", |b| {
        b.iter(|| resolve_candidates(black_box(&query), black_box(&crowded)));
    });

    group.bench_function("parse_proposer_text", |b| {
        b.iter(|| parse_proposer_text(black_box("김철수(국민의힘/金哲洙)")));
    });

    group.finish();
}

criterion_group!(benches, bench_resolver);
criterion_main!(benches);
