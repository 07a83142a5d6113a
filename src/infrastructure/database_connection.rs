// Database connection and pool management
// This module handles SQLite database connections using sqlx

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        // Create database file directory if it doesn't exist
        let db_path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);

        if !db_path.starts_with(':') {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("Failed to create database directory {:?}", parent))?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url: {database_url}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {database_url}"))?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database (tests, dry runs).
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Schema statement failed: {}", statement.trim()))?;
        }
        Ok(())
    }
}

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS parties (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    r"
    CREATE TABLE IF NOT EXISTS committees (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    r"
    CREATE TABLE IF NOT EXISTS politicians (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        mona_cd TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL DEFAULT '',
        hanja_name TEXT NOT NULL DEFAULT '',
        eng_name TEXT NOT NULL DEFAULT '',
        birth_date DATE,
        gender TEXT NOT NULL DEFAULT '',
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    r"
    CREATE TABLE IF NOT EXISTS politician_terms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        politician_id INTEGER NOT NULL REFERENCES politicians (id) ON DELETE CASCADE,
        unit INTEGER NOT NULL,
        party_id INTEGER REFERENCES parties (id),
        constituency TEXT NOT NULL DEFAULT '',
        reelected TEXT NOT NULL DEFAULT '',
        job_title TEXT NOT NULL DEFAULT '',
        committee_main TEXT NOT NULL DEFAULT '',
        committees TEXT NOT NULL DEFAULT '',
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (politician_id, unit)
    )",
    r"
    CREATE TABLE IF NOT EXISTS politician_contacts (
        politician_id INTEGER PRIMARY KEY REFERENCES politicians (id) ON DELETE CASCADE,
        phone TEXT NOT NULL DEFAULT '',
        email TEXT NOT NULL DEFAULT '',
        homepage TEXT NOT NULL DEFAULT '',
        office_room TEXT NOT NULL DEFAULT '',
        staff TEXT NOT NULL DEFAULT '',
        secretary TEXT NOT NULL DEFAULT '',
        secretary2 TEXT NOT NULL DEFAULT '',
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    r"
    CREATE TABLE IF NOT EXISTS politician_careers (
        politician_id INTEGER PRIMARY KEY REFERENCES politicians (id) ON DELETE CASCADE,
        career TEXT NOT NULL DEFAULT '',
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    r"
    CREATE TABLE IF NOT EXISTS politician_sns (
        politician_id INTEGER PRIMARY KEY REFERENCES politicians (id) ON DELETE CASCADE,
        twitter_url TEXT NOT NULL DEFAULT '',
        facebook_url TEXT NOT NULL DEFAULT '',
        youtube_url TEXT NOT NULL DEFAULT '',
        blog_url TEXT NOT NULL DEFAULT '',
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    r"
    CREATE TABLE IF NOT EXISTS bills (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bill_id TEXT NOT NULL UNIQUE,
        bill_no TEXT NOT NULL DEFAULT '',
        title TEXT NOT NULL DEFAULT '',
        committee_id INTEGER REFERENCES committees (id),
        age INTEGER,
        proposer TEXT NOT NULL DEFAULT '',
        propose_date DATE,
        law_proc_date DATE,
        law_present_date DATE,
        law_submit_date DATE,
        cmt_proc_date DATE,
        cmt_present_date DATE,
        committee_date DATE,
        proc_date DATE,
        result TEXT NOT NULL DEFAULT '',
        law_proc_result_cd TEXT NOT NULL DEFAULT '',
        cmt_proc_result_cd TEXT NOT NULL DEFAULT '',
        detail_link TEXT NOT NULL DEFAULT '',
        summary TEXT NOT NULL DEFAULT '',
        step_log TEXT NOT NULL DEFAULT '',
        current_step TEXT NOT NULL DEFAULT '',
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    r"
    CREATE TABLE IF NOT EXISTS bill_status_flows (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bill_pk INTEGER NOT NULL REFERENCES bills (id) ON DELETE CASCADE,
        step_order INTEGER NOT NULL,
        step_name TEXT NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (bill_pk, step_order)
    )",
    r"
    CREATE TABLE IF NOT EXISTS bill_politician_relations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bill_pk INTEGER NOT NULL REFERENCES bills (id) ON DELETE CASCADE,
        politician_id INTEGER NOT NULL REFERENCES politicians (id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (bill_pk, politician_id, role)
    )",
    r"
    CREATE TABLE IF NOT EXISTS legislative_notices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bill_id TEXT NOT NULL UNIQUE,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        comments_url TEXT NOT NULL DEFAULT '',
        comments_count INTEGER NOT NULL DEFAULT 0,
        view_count INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    r"
    CREATE TABLE IF NOT EXISTS legislative_opinions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bill_id TEXT NOT NULL,
        opinion_no INTEGER NOT NULL,
        subject TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        author TEXT NOT NULL DEFAULT '',
        registered_on DATE NOT NULL,
        is_anonymous BOOLEAN,
        agreement BOOLEAN,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (bill_id, opinion_no)
    )",
    "CREATE INDEX IF NOT EXISTS idx_politicians_name ON politicians (name)",
    "CREATE INDEX IF NOT EXISTS idx_bills_bill_no ON bills (bill_no)",
    "CREATE INDEX IF NOT EXISTS idx_notices_end_date ON legislative_notices (end_date)",
];
