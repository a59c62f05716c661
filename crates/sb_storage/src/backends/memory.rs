use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sb_core::{Report, ReportStorage, Result, StoredReport, UsageRecord, UsageSink};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{company_key, StorageBackend};

#[derive(Default)]
pub struct MemoryStore {
    reports: HashMap<String, Report>,
    usage: Vec<UsageRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: String, report: &Report) {
        self.reports.insert(id, report.clone());
    }

    pub fn get(&self, id: &str) -> Option<StoredReport> {
        self.reports.get(id).map(|report| StoredReport {
            id: id.to_string(),
            report: report.clone(),
        })
    }

    pub fn find_recent(&self, company_name: &str, since: DateTime<Utc>) -> Option<StoredReport> {
        let key = company_key(company_name);
        self.reports
            .iter()
            .filter(|(_, r)| company_key(&r.company_name) == key && r.created_at >= since)
            .max_by_key(|(_, r)| r.created_at)
            .map(|(id, report)| StoredReport {
                id: id.clone(),
                report: report.clone(),
            })
    }
}

/// Process-local storage; contents are lost when the process exits.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn usage_records(&self) -> Vec<UsageRecord> {
        self.store.read().await.usage.clone()
    }

    pub async fn report_count(&self) -> usize {
        self.store.read().await.reports.len()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn new() -> Result<Self>
    where
        Self: Sized,
    {
        Ok(MemoryStorage::new())
    }
}

#[async_trait]
impl ReportStorage for MemoryStorage {
    async fn persist_report(&self, report: &Report) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.store.write().await.insert(id.clone(), report);
        Ok(id)
    }

    async fn create_if_absent(&self, key: &str, report: &Report) -> Result<Option<StoredReport>> {
        // check and insert under one write lock
        let mut store = self.store.write().await;
        if let Some(existing) = store.get(key) {
            return Ok(Some(existing));
        }
        store.insert(key.to_string(), report);
        Ok(None)
    }

    async fn get_report(&self, id: &str) -> Result<Option<StoredReport>> {
        Ok(self.store.read().await.get(id))
    }

    async fn find_recent(&self, company_name: &str, since: DateTime<Utc>) -> Result<Option<StoredReport>> {
        Ok(self.store.read().await.find_recent(company_name, since))
    }
}

#[async_trait]
impl UsageSink for MemoryStorage {
    async fn record_usage(&self, record: &UsageRecord) -> Result<()> {
        self.store.write().await.usage.push(record.clone());
        Ok(())
    }
}
