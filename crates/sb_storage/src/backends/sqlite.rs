use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sb_core::{Error, Report, ReportStorage, Result, StoredReport, UsageRecord, UsageSink};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::{company_key, StorageBackend};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS reports (
        id TEXT PRIMARY KEY,
        company_key TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        body TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS reports_company_created
        ON reports (company_key, created_at DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS token_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source TEXT NOT NULL,
        model TEXT,
        prompt_tokens INTEGER NOT NULL,
        completion_tokens INTEGER NOT NULL,
        total_tokens INTEGER NOT NULL,
        report_id TEXT,
        article_id TEXT,
        created_at INTEGER NOT NULL
    )
    "#,
];

fn storage_err(action: &str, e: sqlx::Error) -> Error {
    Error::Storage(format!("Failed to {}: {}", action, e))
}

pub struct SQLiteStorage {
    pool: SqlitePool,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    async fn new() -> Result<Self>
    where
        Self: Sized,
    {
        Self::new_with_path(Path::new("briefings.db")).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new().filename(db_path).create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| storage_err("connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| storage_err(&format!("run migration {}", i), e))?;
        }

        Ok(Self { pool })
    }

    async fn insert(&self, id: &str, report: &Report, ignore_existing: bool) -> Result<bool> {
        let body = serde_json::to_string(report)?;
        let sql = if ignore_existing {
            "INSERT OR IGNORE INTO reports (id, company_key, created_at, body) VALUES (?, ?, ?, ?)"
        } else {
            "INSERT INTO reports (id, company_key, created_at, body) VALUES (?, ?, ?, ?)"
        };
        let result = sqlx::query(sql)
            .bind(id)
            .bind(company_key(&report.company_name))
            .bind(report.created_at.timestamp_millis())
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("store report", e))?;
        Ok(result.rows_affected() == 1)
    }
}

fn stored_from_row(row: &SqliteRow) -> Result<StoredReport> {
    let body: String = row.get("body");
    Ok(StoredReport {
        id: row.get("id"),
        report: serde_json::from_str(&body)?,
    })
}

#[async_trait]
impl ReportStorage for SQLiteStorage {
    async fn persist_report(&self, report: &Report) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.insert(&id, report, false).await?;
        Ok(id)
    }

    async fn create_if_absent(&self, key: &str, report: &Report) -> Result<Option<StoredReport>> {
        if self.insert(key, report, true).await? {
            return Ok(None);
        }
        self.get_report(key).await
    }

    async fn get_report(&self, id: &str) -> Result<Option<StoredReport>> {
        let row = sqlx::query("SELECT id, body FROM reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("load report", e))?;
        row.as_ref().map(stored_from_row).transpose()
    }

    async fn find_recent(&self, company_name: &str, since: DateTime<Utc>) -> Result<Option<StoredReport>> {
        let row = sqlx::query(
            r#"
            SELECT id, body FROM reports
            WHERE company_key = ? AND created_at >= ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(company_key(company_name))
        .bind(since.timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("query recent reports", e))?;
        row.as_ref().map(stored_from_row).transpose()
    }
}

#[async_trait]
impl UsageSink for SQLiteStorage {
    async fn record_usage(&self, record: &UsageRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO token_logs
            (source, model, prompt_tokens, completion_tokens, total_tokens, report_id, article_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.source)
        .bind(record.model.as_deref())
        .bind(record.prompt_tokens as i64)
        .bind(record.completion_tokens as i64)
        .bind(record.total_tokens as i64)
        .bind(record.report_id.as_deref())
        .bind(record.article_id.as_deref())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("record token usage", e))?;
        Ok(())
    }
}
