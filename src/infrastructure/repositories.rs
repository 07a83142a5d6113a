//! SQLite implementation of the Persistence Gateway
//!
//! Text columns merge with `COALESCE(NULLIF(excluded.col, ''), table.col)`,
//! nullable columns with `COALESCE(excluded.col, table.col)`. `updated_at`
//! is refreshed on every write.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::domain::{
    Bill, BillRelation, BillStep, Candidate, LegislativeNotice, LegislativeOpinion,
    LegislativeStore, Politician, PoliticianCareer, PoliticianContact, PoliticianSns,
    PoliticianTerm, StoreError, StoreResult,
};

#[derive(Clone)]
pub struct SqliteLegislativeStore {
    pool: SqlitePool,
}

impl SqliteLegislativeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn get_or_create_by_name(
        &self,
        table: LookupTable,
        name: &str,
    ) -> StoreResult<Option<i64>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        // no-op update so RETURNING yields the existing id on conflict
        let sql = format!(
            "INSERT INTO {t} (name) VALUES (?) ON CONFLICT(name) DO UPDATE SET name = excluded.name RETURNING id",
            t = table.as_str()
        );
        let id: i64 = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::new(table.operation(), e))?;
        Ok(Some(id))
    }
}

#[derive(Clone, Copy)]
enum LookupTable {
    Parties,
    Committees,
}

impl LookupTable {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Parties => "parties",
            Self::Committees => "committees",
        }
    }

    const fn operation(self) -> &'static str {
        match self {
            Self::Parties => "get_or_create_party",
            Self::Committees => "get_or_create_committee",
        }
    }
}

fn to_i64(operation: &'static str, value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|e| StoreError::new(operation, e))
}

#[async_trait]
impl LegislativeStore for SqliteLegislativeStore {
    async fn upsert_politician(&self, p: &Politician) -> StoreResult<i64> {
        sqlx::query_scalar(
            r"
            INSERT INTO politicians (mona_cd, name, hanja_name, eng_name, birth_date, gender)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(mona_cd) DO UPDATE SET
                name = COALESCE(NULLIF(excluded.name, ''), politicians.name),
                hanja_name = COALESCE(NULLIF(excluded.hanja_name, ''), politicians.hanja_name),
                eng_name = COALESCE(NULLIF(excluded.eng_name, ''), politicians.eng_name),
                birth_date = COALESCE(excluded.birth_date, politicians.birth_date),
                gender = COALESCE(NULLIF(excluded.gender, ''), politicians.gender),
                updated_at = CURRENT_TIMESTAMP
            RETURNING id
            ",
        )
        .bind(&p.mona_cd)
        .bind(&p.name)
        .bind(&p.hanja_name)
        .bind(&p.eng_name)
        .bind(p.birth_date)
        .bind(&p.gender)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::new("upsert_politician", e))
    }

    async fn find_politician_id(&self, mona_cd: &str) -> StoreResult<Option<i64>> {
        sqlx::query_scalar("SELECT id FROM politicians WHERE mona_cd = ?")
            .bind(mona_cd)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::new("find_politician_id", e))
    }

    async fn upsert_term(
        &self,
        politician_id: i64,
        party_id: Option<i64>,
        t: &PoliticianTerm,
    ) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO politician_terms
                (politician_id, unit, party_id, constituency, reelected, job_title, committee_main, committees)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(politician_id, unit) DO UPDATE SET
                party_id = COALESCE(excluded.party_id, politician_terms.party_id),
                constituency = COALESCE(NULLIF(excluded.constituency, ''), politician_terms.constituency),
                reelected = COALESCE(NULLIF(excluded.reelected, ''), politician_terms.reelected),
                job_title = COALESCE(NULLIF(excluded.job_title, ''), politician_terms.job_title),
                committee_main = COALESCE(NULLIF(excluded.committee_main, ''), politician_terms.committee_main),
                committees = COALESCE(NULLIF(excluded.committees, ''), politician_terms.committees),
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(politician_id)
        .bind(t.unit)
        .bind(party_id)
        .bind(&t.constituency)
        .bind(&t.reelected)
        .bind(&t.job_title)
        .bind(&t.committee_main)
        .bind(&t.committees)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::new("upsert_term", e))?;
        Ok(())
    }

    async fn upsert_contact(&self, politician_id: i64, c: &PoliticianContact) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO politician_contacts
                (politician_id, phone, email, homepage, office_room, staff, secretary, secretary2)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(politician_id) DO UPDATE SET
                phone = COALESCE(NULLIF(excluded.phone, ''), politician_contacts.phone),
                email = COALESCE(NULLIF(excluded.email, ''), politician_contacts.email),
                homepage = COALESCE(NULLIF(excluded.homepage, ''), politician_contacts.homepage),
                office_room = COALESCE(NULLIF(excluded.office_room, ''), politician_contacts.office_room),
                staff = COALESCE(NULLIF(excluded.staff, ''), politician_contacts.staff),
                secretary = COALESCE(NULLIF(excluded.secretary, ''), politician_contacts.secretary),
                secretary2 = COALESCE(NULLIF(excluded.secretary2, ''), politician_contacts.secretary2),
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(politician_id)
        .bind(&c.phone)
        .bind(&c.email)
        .bind(&c.homepage)
        .bind(&c.office_room)
        .bind(&c.staff)
        .bind(&c.secretary)
        .bind(&c.secretary2)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::new("upsert_contact", e))?;
        Ok(())
    }

    async fn upsert_career(&self, politician_id: i64, c: &PoliticianCareer) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO politician_careers (politician_id, career) VALUES (?, ?)
            ON CONFLICT(politician_id) DO UPDATE SET
                career = COALESCE(NULLIF(excluded.career, ''), politician_careers.career),
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(politician_id)
        .bind(&c.career)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::new("upsert_career", e))?;
        Ok(())
    }

    async fn upsert_sns(&self, politician_id: i64, s: &PoliticianSns) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO politician_sns (politician_id, twitter_url, facebook_url, youtube_url, blog_url)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(politician_id) DO UPDATE SET
                twitter_url = COALESCE(NULLIF(excluded.twitter_url, ''), politician_sns.twitter_url),
                facebook_url = COALESCE(NULLIF(excluded.facebook_url, ''), politician_sns.facebook_url),
                youtube_url = COALESCE(NULLIF(excluded.youtube_url, ''), politician_sns.youtube_url),
                blog_url = COALESCE(NULLIF(excluded.blog_url, ''), politician_sns.blog_url),
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(politician_id)
        .bind(&s.twitter_url)
        .bind(&s.facebook_url)
        .bind(&s.youtube_url)
        .bind(&s.blog_url)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::new("upsert_sns", e))?;
        Ok(())
    }

    async fn get_or_create_party(&self, name: &str) -> StoreResult<Option<i64>> {
        self.get_or_create_by_name(LookupTable::Parties, name).await
    }

    async fn get_or_create_committee(&self, name: &str) -> StoreResult<Option<i64>> {
        self.get_or_create_by_name(LookupTable::Committees, name).await
    }

    async fn find_candidates(&self, name: &str) -> StoreResult<Vec<Candidate>> {
        let rows = sqlx::query(
            r"
            SELECT p.id, p.mona_cd, p.hanja_name, t.unit, COALESCE(pa.name, '') AS party
            FROM politicians AS p
            JOIN politician_terms AS t ON p.id = t.politician_id
            LEFT JOIN parties AS pa ON pa.id = t.party_id
            WHERE p.name = ?
            ORDER BY p.id, t.unit
            ",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::new("find_candidates", e))?;

        rows.iter()
            .map(|row| -> Result<Candidate, sqlx::Error> {
                let unit: i64 = row.try_get("unit")?;
                Ok(Candidate {
                    politician_id: row.try_get("id")?,
                    mona_cd: row.try_get("mona_cd")?,
                    hanja_name: row.try_get("hanja_name")?,
                    unit: u32::try_from(unit).unwrap_or_default(),
                    party: row.try_get("party")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::new("find_candidates", e))
    }

    async fn upsert_bill(&self, b: &Bill) -> StoreResult<i64> {
        sqlx::query_scalar(
            r"
            INSERT INTO bills (
                bill_id, bill_no, title, committee_id, age, proposer,
                propose_date, law_proc_date, law_present_date, law_submit_date,
                cmt_proc_date, cmt_present_date, committee_date, proc_date,
                result, law_proc_result_cd, cmt_proc_result_cd, detail_link,
                summary, step_log, current_step
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bill_id) DO UPDATE SET
                bill_no = COALESCE(NULLIF(excluded.bill_no, ''), bills.bill_no),
                title = COALESCE(NULLIF(excluded.title, ''), bills.title),
                committee_id = COALESCE(excluded.committee_id, bills.committee_id),
                age = COALESCE(excluded.age, bills.age),
                proposer = COALESCE(NULLIF(excluded.proposer, ''), bills.proposer),
                propose_date = COALESCE(excluded.propose_date, bills.propose_date),
                law_proc_date = COALESCE(excluded.law_proc_date, bills.law_proc_date),
                law_present_date = COALESCE(excluded.law_present_date, bills.law_present_date),
                law_submit_date = COALESCE(excluded.law_submit_date, bills.law_submit_date),
                cmt_proc_date = COALESCE(excluded.cmt_proc_date, bills.cmt_proc_date),
                cmt_present_date = COALESCE(excluded.cmt_present_date, bills.cmt_present_date),
                committee_date = COALESCE(excluded.committee_date, bills.committee_date),
                proc_date = COALESCE(excluded.proc_date, bills.proc_date),
                result = COALESCE(NULLIF(excluded.result, ''), bills.result),
                law_proc_result_cd = COALESCE(NULLIF(excluded.law_proc_result_cd, ''), bills.law_proc_result_cd),
                cmt_proc_result_cd = COALESCE(NULLIF(excluded.cmt_proc_result_cd, ''), bills.cmt_proc_result_cd),
                detail_link = COALESCE(NULLIF(excluded.detail_link, ''), bills.detail_link),
                summary = COALESCE(NULLIF(excluded.summary, ''), bills.summary),
                step_log = COALESCE(NULLIF(excluded.step_log, ''), bills.step_log),
                current_step = COALESCE(NULLIF(excluded.current_step, ''), bills.current_step),
                updated_at = CURRENT_TIMESTAMP
            RETURNING id
            ",
        )
        .bind(&b.bill_id)
        .bind(&b.bill_no)
        .bind(&b.title)
        .bind(b.committee_id)
        .bind(b.age)
        .bind(&b.proposer)
        .bind(b.propose_date)
        .bind(b.law_proc_date)
        .bind(b.law_present_date)
        .bind(b.law_submit_date)
        .bind(b.cmt_proc_date)
        .bind(b.cmt_present_date)
        .bind(b.committee_date)
        .bind(b.proc_date)
        .bind(&b.result)
        .bind(&b.law_proc_result_cd)
        .bind(&b.cmt_proc_result_cd)
        .bind(&b.detail_link)
        .bind(&b.summary)
        .bind(&b.step_log)
        .bind(&b.current_step)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::new("upsert_bill", e))
    }

    async fn find_bill_id_by_no(&self, bill_no: &str) -> StoreResult<Option<String>> {
        sqlx::query_scalar("SELECT bill_id FROM bills WHERE bill_no = ? ORDER BY id LIMIT 1")
            .bind(bill_no.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::new("find_bill_id_by_no", e))
    }

    async fn upsert_bill_step(&self, step: &BillStep) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO bill_status_flows (bill_pk, step_order, step_name) VALUES (?, ?, ?)
            ON CONFLICT(bill_pk, step_order) DO UPDATE SET
                step_name = COALESCE(NULLIF(excluded.step_name, ''), bill_status_flows.step_name),
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(step.bill_pk)
        .bind(step.step_order)
        .bind(&step.step_name)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::new("upsert_bill_step", e))?;
        Ok(())
    }

    async fn upsert_bill_relation(&self, relation: &BillRelation) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO bill_politician_relations (bill_pk, politician_id, role) VALUES (?, ?, ?)
            ON CONFLICT(bill_pk, politician_id, role) DO UPDATE SET
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(relation.bill_pk)
        .bind(relation.politician_id)
        .bind(relation.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::new("upsert_bill_relation", e))?;
        Ok(())
    }

    async fn upsert_notice(&self, n: &LegislativeNotice) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO legislative_notices (bill_id, start_date, end_date, comments_url, comments_count)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(bill_id) DO UPDATE SET
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                comments_url = COALESCE(NULLIF(excluded.comments_url, ''), legislative_notices.comments_url),
                comments_count = excluded.comments_count,
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(&n.bill_id)
        .bind(n.start_date)
        .bind(n.end_date)
        .bind(&n.comments_url)
        .bind(n.comments_count)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::new("upsert_notice", e))?;
        debug!("💾 notice upserted: {}", n.bill_id);
        Ok(())
    }

    async fn notices_ending_between(
        &self,
        from: NaiveDate,
        until: Option<NaiveDate>,
    ) -> StoreResult<Vec<LegislativeNotice>> {
        let rows = sqlx::query(
            r"
            SELECT bill_id, start_date, end_date, comments_url, comments_count
            FROM legislative_notices
            WHERE end_date >= ? AND (? IS NULL OR end_date <= ?)
            ORDER BY end_date, bill_id
            ",
        )
        .bind(from)
        .bind(until)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::new("notices_ending_between", e))?;

        rows.iter()
            .map(|row| -> Result<LegislativeNotice, sqlx::Error> {
                Ok(LegislativeNotice {
                    bill_id: row.try_get("bill_id")?,
                    start_date: row.try_get("start_date")?,
                    end_date: row.try_get("end_date")?,
                    comments_url: row.try_get("comments_url")?,
                    comments_count: row.try_get("comments_count")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::new("notices_ending_between", e))
    }

    async fn max_opinion_no(&self, bill_id: &str) -> StoreResult<u64> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(opinion_no) FROM legislative_opinions WHERE bill_id = ?")
                .bind(bill_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StoreError::new("max_opinion_no", e))?;
        Ok(max.and_then(|n| u64::try_from(n).ok()).unwrap_or(0))
    }

    async fn upsert_opinion(&self, o: &LegislativeOpinion) -> StoreResult<()> {
        let opinion_no = to_i64("upsert_opinion", o.opinion_no)?;
        sqlx::query(
            r"
            INSERT INTO legislative_opinions
                (bill_id, opinion_no, subject, content, author, registered_on, is_anonymous, agreement)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bill_id, opinion_no) DO UPDATE SET
                subject = COALESCE(NULLIF(excluded.subject, ''), legislative_opinions.subject),
                content = COALESCE(NULLIF(excluded.content, ''), legislative_opinions.content),
                author = COALESCE(NULLIF(excluded.author, ''), legislative_opinions.author),
                registered_on = COALESCE(excluded.registered_on, legislative_opinions.registered_on),
                is_anonymous = COALESCE(excluded.is_anonymous, legislative_opinions.is_anonymous),
                agreement = COALESCE(excluded.agreement, legislative_opinions.agreement),
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(&o.bill_id)
        .bind(opinion_no)
        .bind(&o.subject)
        .bind(&o.content)
        .bind(&o.author)
        .bind(o.created_at)
        .bind(o.is_anonymous)
        .bind(o.agreement)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::new("upsert_opinion", e))?;
        Ok(())
    }
}
