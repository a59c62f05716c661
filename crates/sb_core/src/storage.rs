use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{ArticleInput, Report, StoredReport, UsageRecord};
use crate::Result;

#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Returns up to `limit` candidate articles, best first
    async fn fetch_ranked_articles(&self, company_name: &str, limit: usize) -> Result<Vec<ArticleInput>>;
}

#[async_trait]
pub trait ReportStorage: Send + Sync {
    /// Store a report under a fresh id
    async fn persist_report(&self, report: &Report) -> Result<String>;

    /// Store a report under `key` only if nothing is stored there yet.
    /// Returns the existing report when the key is taken.
    async fn create_if_absent(&self, key: &str, report: &Report) -> Result<Option<StoredReport>>;

    async fn get_report(&self, id: &str) -> Result<Option<StoredReport>>;

    /// Newest report for the company created at or after `since`
    async fn find_recent(&self, company_name: &str, since: DateTime<Utc>) -> Result<Option<StoredReport>>;
}

#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record_usage(&self, record: &UsageRecord) -> Result<()>;
}
