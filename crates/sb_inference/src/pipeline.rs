//! One briefing run: cache lookup, map, reduce, persist, meter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sb_core::{
    ArticleSource, ArticleTokens, ChatModel, Error, Report, ReportStorage, Result, TokenUsageSummary,
    UsageRecord, UsageSink,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::merge::FinalMerger;
use crate::summarizer::ArticleSummarizer;
use crate::Config;

#[derive(Debug, Clone)]
pub struct BriefingRequest {
    pub company_name: String,
    /// Skip the cache and always store a fresh report
    pub force: bool,
    pub article_limit: Option<usize>,
    pub top_k: Option<usize>,
}

impl BriefingRequest {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            force: false,
            article_limit: None,
            top_k: None,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct BriefingOutcome {
    /// `None` when the report could not be stored
    pub report_id: Option<String>,
    pub report: Report,
    /// True when an existing report was returned instead of a new one
    pub cached: bool,
}

pub struct BriefingPipeline {
    articles: Arc<dyn ArticleSource>,
    reports: Arc<dyn ReportStorage>,
    usage: Arc<dyn UsageSink>,
    summarizer: ArticleSummarizer,
    merger: FinalMerger,
    config: Config,
}

impl BriefingPipeline {
    pub fn new(
        model: Arc<dyn ChatModel>,
        articles: Arc<dyn ArticleSource>,
        reports: Arc<dyn ReportStorage>,
        usage: Arc<dyn UsageSink>,
        config: Config,
    ) -> Self {
        Self {
            articles,
            reports,
            usage,
            summarizer: ArticleSummarizer::new(model.clone(), &config),
            merger: FinalMerger::new(model, &config),
            config,
        }
    }

    pub async fn run(&self, request: &BriefingRequest) -> Result<BriefingOutcome> {
        let company = request.company_name.trim();
        if company.is_empty() {
            return Err(Error::InvalidInput("company name must not be blank".to_string()));
        }
        let limit = request.article_limit.unwrap_or(self.config.article_limit);
        if limit == 0 {
            return Err(Error::InvalidInput("article limit must be at least 1".to_string()));
        }
        let top_k = request.top_k.unwrap_or(self.config.sales_top_k);
        if top_k == 0 {
            return Err(Error::InvalidInput("top-k must be at least 1".to_string()));
        }

        if !request.force {
            let since = Utc::now() - self.config.cache_window;
            match self.reports.find_recent(company, since).await {
                Ok(Some(stored)) => {
                    info!("Serving cached report {} for {}", stored.id, company);
                    return Ok(BriefingOutcome { report_id: Some(stored.id), report: stored.report, cached: true });
                }
                Ok(None) => debug!("No recent report for {}", company),
                Err(e) => warn!("Cache lookup failed for {}: {}", company, e),
            }
        }

        let articles = self.articles.fetch_ranked_articles(company, limit).await?;
        info!("Summarizing {} articles for {}", articles.len(), company);

        let mut summaries = Vec::with_capacity(articles.len());
        let mut map_stage = Vec::with_capacity(articles.len());
        let mut usage = Vec::new();
        for article in &articles {
            let outcome = self.summarizer.summarize(article, company).await;
            map_stage.push(ArticleTokens {
                article_id: article.id.clone(),
                title: article.title.clone(),
                tokens: total(&outcome.usage),
            });
            usage.extend(outcome.usage);
            summaries.push(outcome.summary);
        }

        let merged = self.merger.merge(company, &summaries, top_k).await;
        if merged.used_fallback {
            warn!("Briefing for {} degraded to local fallback ({:?})", company, merged.error);
        }
        let merge_stage = total(&merged.usage);
        usage.extend(merged.usage);

        let token_usage = TokenUsageSummary {
            total_tokens: map_stage.iter().map(|a| a.tokens).sum::<u64>() + merge_stage,
            map_stage,
            merge_stage,
        };
        let created_at = Utc::now();
        let report = Report {
            company_name: company.to_string(),
            articles,
            summaries,
            summary: merged.document,
            used_fallback: merged.used_fallback,
            merge_error: merged.error,
            token_usage,
            created_at,
        };

        // a storage failure must not lose a document the model calls already paid for
        let outcome = match self.store(company, report, request.force).await {
            Ok(outcome) => outcome,
            Err((e, report)) => {
                warn!("Failed to store report for {} ({}): {}", company, e.code(), e);
                BriefingOutcome { report_id: None, report, cached: false }
            }
        };

        self.emit_usage(usage, outcome.report_id.as_deref()).await;
        info!(
            "Report {:?} for {} ({} tokens)",
            outcome.report_id, company, outcome.report.token_usage.total_tokens
        );
        Ok(outcome)
    }

    async fn store(
        &self,
        company: &str,
        report: Report,
        force: bool,
    ) -> std::result::Result<BriefingOutcome, (Error, Report)> {
        if force {
            return match self.reports.persist_report(&report).await {
                Ok(id) => Ok(BriefingOutcome { report_id: Some(id), report, cached: false }),
                Err(e) => Err((e, report)),
            };
        }
        let key = idempotency_key(company, report.created_at);
        match self.reports.create_if_absent(&key, &report).await {
            Ok(Some(existing)) => {
                info!("Report {} already created this hour for {}", existing.id, company);
                Ok(BriefingOutcome { report_id: Some(existing.id), report: existing.report, cached: true })
            }
            Ok(None) => Ok(BriefingOutcome { report_id: Some(key), report, cached: false }),
            Err(e) => Err((e, report)),
        }
    }

    async fn emit_usage(&self, records: Vec<UsageRecord>, report_id: Option<&str>) {
        for mut record in records {
            record.report_id = report_id.map(str::to_string);
            if let Err(e) = self.usage.record_usage(&record).await {
                warn!("Failed to record token usage ({}): {}", record.source, e);
            }
        }
    }
}

fn total(records: &[UsageRecord]) -> u64 {
    records.iter().map(|r| r.total_tokens).sum()
}

/// Same company in the same UTC hour maps to the same key.
pub fn idempotency_key(company_name: &str, at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(company_name.trim().to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(at.format("%Y-%m-%dT%H").to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_idempotency_key_buckets_by_hour() {
        let a = Utc.with_ymd_and_hms(2026, 10, 19, 9, 5, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 10, 19, 9, 55, 0).unwrap();
        let c = Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap();

        assert_eq!(idempotency_key("Acme", a), idempotency_key(" acme ", b));
        assert_ne!(idempotency_key("Acme", a), idempotency_key("Acme", c));
        assert_ne!(idempotency_key("Acme", a), idempotency_key("Globex", a));
        assert_eq!(idempotency_key("Acme", a).len(), 64);
    }

    #[test]
    fn test_request_builder() {
        let request = BriefingRequest::new("Acme").forced();
        assert!(request.force);
        assert!(request.top_k.is_none());
    }
}
