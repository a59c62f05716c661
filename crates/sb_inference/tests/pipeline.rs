use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sb_core::{
    ArticleInput, ArticleSource, Error, Report, ReportStorage, Result, StoredReport, UsageRecord, UsageSink,
};
use sb_inference::merge::local_fallback;
use sb_inference::models::{ScriptedModel, ScriptedReply};
use sb_inference::pipeline::{idempotency_key, BriefingPipeline, BriefingRequest};
use sb_inference::schema::validate_document;
use sb_inference::Config;
use serde_json::json;

struct FixedArticles(Vec<ArticleInput>);

#[async_trait]
impl ArticleSource for FixedArticles {
    async fn fetch_ranked_articles(&self, _company_name: &str, limit: usize) -> Result<Vec<ArticleInput>> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }
}

struct FailingArticles;

#[async_trait]
impl ArticleSource for FailingArticles {
    async fn fetch_ranked_articles(&self, _company_name: &str, _limit: usize) -> Result<Vec<ArticleInput>> {
        Err(Error::External(anyhow::anyhow!("news index offline")))
    }
}

#[derive(Default)]
struct Reports {
    rows: Mutex<HashMap<String, Report>>,
    next_id: Mutex<u32>,
}

#[async_trait]
impl ReportStorage for Reports {
    async fn persist_report(&self, report: &Report) -> Result<String> {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = format!("r{}", next);
        self.rows.lock().unwrap().insert(id.clone(), report.clone());
        Ok(id)
    }

    async fn create_if_absent(&self, key: &str, report: &Report) -> Result<Option<StoredReport>> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.get(key) {
            return Ok(Some(StoredReport { id: key.to_string(), report: existing.clone() }));
        }
        rows.insert(key.to_string(), report.clone());
        Ok(None)
    }

    async fn get_report(&self, id: &str) -> Result<Option<StoredReport>> {
        Ok(self.rows.lock().unwrap().get(id).map(|r| StoredReport { id: id.to_string(), report: r.clone() }))
    }

    async fn find_recent(&self, company_name: &str, since: DateTime<Utc>) -> Result<Option<StoredReport>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.company_name == company_name && r.created_at >= since)
            .max_by_key(|(_, r)| r.created_at)
            .map(|(id, r)| StoredReport { id: id.clone(), report: r.clone() }))
    }
}

struct BrokenReports;

#[async_trait]
impl ReportStorage for BrokenReports {
    async fn persist_report(&self, _report: &Report) -> Result<String> {
        Err(Error::Storage("disk full".to_string()))
    }

    async fn create_if_absent(&self, _key: &str, _report: &Report) -> Result<Option<StoredReport>> {
        Err(Error::Storage("disk full".to_string()))
    }

    async fn get_report(&self, _id: &str) -> Result<Option<StoredReport>> {
        Err(Error::Storage("disk full".to_string()))
    }

    async fn find_recent(&self, _company_name: &str, _since: DateTime<Utc>) -> Result<Option<StoredReport>> {
        Err(Error::Storage("disk full".to_string()))
    }
}

#[derive(Default)]
struct Usage {
    records: Mutex<Vec<UsageRecord>>,
    fail: bool,
}

#[async_trait]
impl UsageSink for Usage {
    async fn record_usage(&self, record: &UsageRecord) -> Result<()> {
        if self.fail {
            return Err(Error::Storage("token log unavailable".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn articles() -> Vec<ArticleInput> {
    (1..=3)
        .map(|i| ArticleInput {
            id: Some(format!("a{i}")),
            ..ArticleInput::new(format!("Acme news {i}"), format!("https://news.test/{i}"))
                .with_description(format!("Acme announced product launch {i}. More details later."))
        })
        .collect()
}

fn summary_reply(i: usize) -> String {
    json!({
        "id": format!("a{i}"),
        "title": format!("Acme news {i}"),
        "url": format!("https://news.test/{i}"),
        "one_line_summary": format!("Acme launched product {i}."),
        "short_summary": format!("Acme launched product {i} to enterprise buyers."),
        "sales_bullet": format!("Launch {i} opens integration budget"),
        "suggested_question": format!("Who owns rollout of product {i}?")
    })
    .to_string()
}

fn merge_reply() -> String {
    json!({
        "company": "Acme",
        "company_overview": "Acme ships enterprise products.",
        "highlights": (1..=3).map(|i| json!({
            "title": format!("Acme news {i}"),
            "url": format!("https://news.test/{i}"),
            "one_line_summary": format!("Acme launched product {i}."),
            "sales_bullet": format!("Launch {i} opens integration budget"),
            "suggested_question": format!("Who owns rollout of product {i}?")
        })).collect::<Vec<_>>(),
        "slides": [
            {"slide_number": 1, "slide_title": "Key Facts & Summary", "bullet_points": ["f1", "f2", "f3"]},
            {"slide_number": 2, "slide_title": "Sales Opportunities & Risks", "bullet_points": ["o1", "o2", "o3"]},
            {"slide_number": 3, "slide_title": "Questions & Next Steps", "bullet_points": ["q1", "q2", "q3"]}
        ]
    })
    .to_string()
}

struct Harness {
    model: Arc<ScriptedModel>,
    reports: Arc<Reports>,
    usage: Arc<Usage>,
    pipeline: BriefingPipeline,
}

fn harness(model: ScriptedModel, source: Arc<dyn ArticleSource>, usage: Usage) -> Harness {
    let model = Arc::new(model);
    let reports = Arc::new(Reports::default());
    let usage = Arc::new(usage);
    let pipeline = BriefingPipeline::new(model.clone(), source, reports.clone(), usage.clone(), Config::default());
    Harness { model, reports, usage, pipeline }
}

#[tokio::test]
async fn test_happy_path() {
    let model = ScriptedModel::new()
        .then_content(summary_reply(1))
        .then_content(summary_reply(2))
        .then_content(summary_reply(3))
        .then_content(merge_reply());
    let h = harness(model, Arc::new(FixedArticles(articles())), Usage::default());

    let outcome = h.pipeline.run(&BriefingRequest::new("Acme")).await.unwrap();

    assert_eq!(h.model.call_count(), 4);
    assert!(!outcome.cached);
    assert!(!outcome.report.used_fallback);
    assert!(outcome.report.merge_error.is_none());
    assert_eq!(outcome.report.summaries.len(), 3);
    assert_eq!(outcome.report.summary.slides[0].bullet_points, vec!["f1", "f2", "f3"]);
    assert!(validate_document(&outcome.report.summary).valid);
    assert_eq!(outcome.report_id.as_deref(), Some(idempotency_key("Acme", outcome.report.created_at).as_str()));

    assert_eq!(outcome.report.token_usage.map_stage.len(), 3);
    assert_eq!(outcome.report.token_usage.merge_stage, 15);
    assert_eq!(outcome.report.token_usage.total_tokens, 60);

    let records = h.usage.records.lock().unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.report_id == outcome.report_id));
    assert_eq!(records[0].article_id.as_deref(), Some("a1"));
    assert_eq!(records[3].source, "merge:initial");
}

#[tokio::test]
async fn test_merge_repair_path() {
    let model = ScriptedModel::new()
        .then_content(summary_reply(1))
        .then_content(summary_reply(2))
        .then_content(summary_reply(3))
        .then_content("Sorry, here is some prose instead")
        .then_content(merge_reply());
    let h = harness(model, Arc::new(FixedArticles(articles())), Usage::default());

    let outcome = h.pipeline.run(&BriefingRequest::new("Acme")).await.unwrap();

    assert_eq!(h.model.call_count(), 5);
    assert!(!outcome.report.used_fallback);
    assert_eq!(outcome.report.token_usage.merge_stage, 30);
}

#[tokio::test]
async fn test_total_outage_degrades_to_local_synthesis() {
    let model = ScriptedModel::always(ScriptedReply::Fail("timeout".to_string()));
    let h = harness(model, Arc::new(FixedArticles(articles())), Usage::default());

    let outcome = h.pipeline.run(&BriefingRequest::new("Acme")).await.unwrap();

    // one call per article (no repair after a call error) plus two merge calls
    assert_eq!(h.model.call_count(), 5);
    assert!(outcome.report.used_fallback);
    assert_eq!(outcome.report.merge_error.as_deref(), Some("inference_error"));
    assert!(outcome.report.summaries.iter().all(|s| s.is_complete()));
    assert_eq!(outcome.report.summary, local_fallback("Acme", &outcome.report.summaries, 3));
    assert!(validate_document(&outcome.report.summary).valid);
    assert_eq!(outcome.report.token_usage.total_tokens, 0);
    assert_eq!(h.usage.records.lock().unwrap().len(), 5);
}

#[tokio::test]
async fn test_second_run_served_from_cache() {
    let model = ScriptedModel::always(ScriptedReply::Fail("down".to_string()));
    let h = harness(model, Arc::new(FixedArticles(articles())), Usage::default());

    let first = h.pipeline.run(&BriefingRequest::new("Acme")).await.unwrap();
    let calls = h.model.call_count();
    let second = h.pipeline.run(&BriefingRequest::new("Acme")).await.unwrap();

    assert!(second.cached);
    assert_eq!(second.report_id, first.report_id);
    assert_eq!(h.model.call_count(), calls);
}

#[tokio::test]
async fn test_forced_run_bypasses_cache() {
    let model = ScriptedModel::always(ScriptedReply::Fail("down".to_string()));
    let h = harness(model, Arc::new(FixedArticles(articles())), Usage::default());

    let first = h.pipeline.run(&BriefingRequest::new("Acme")).await.unwrap();
    let forced = h.pipeline.run(&BriefingRequest::new("Acme").forced()).await.unwrap();

    assert!(!forced.cached);
    assert_ne!(forced.report_id, first.report_id);
    assert_eq!(h.reports.rows.lock().unwrap().len(), 2);
    let forced_id = forced.report_id.unwrap();
    assert!(h.reports.get_report(&forced_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_limits_and_top_k_are_honoured() {
    let model = ScriptedModel::always(ScriptedReply::Fail("down".to_string()));
    let h = harness(model, Arc::new(FixedArticles(articles())), Usage::default());
    let request = BriefingRequest { article_limit: Some(2), top_k: Some(1), ..BriefingRequest::new("Acme") };

    let outcome = h.pipeline.run(&request).await.unwrap();

    assert_eq!(outcome.report.articles.len(), 2);
    assert_eq!(outcome.report.summary.highlights.len(), 1);
}

#[tokio::test]
async fn test_invalid_input_rejected_before_any_call() {
    let h = harness(ScriptedModel::new(), Arc::new(FixedArticles(articles())), Usage::default());

    let blank = h.pipeline.run(&BriefingRequest::new("   ")).await;
    assert!(matches!(blank, Err(Error::InvalidInput(_))));

    let zero = BriefingRequest { article_limit: Some(0), ..BriefingRequest::new("Acme") };
    assert!(matches!(h.pipeline.run(&zero).await, Err(Error::InvalidInput(_))));

    let zero_top_k = BriefingRequest { top_k: Some(0), ..BriefingRequest::new("Acme") };
    assert!(matches!(h.pipeline.run(&zero_top_k).await, Err(Error::InvalidInput(_))));
    assert_eq!(h.model.call_count(), 0);
}

#[tokio::test]
async fn test_usage_sink_failure_is_swallowed() {
    let usage = Usage { fail: true, ..Usage::default() };
    let h = harness(ScriptedModel::new(), Arc::new(FixedArticles(articles())), usage);

    let outcome = h.pipeline.run(&BriefingRequest::new("Acme")).await;
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn test_storage_failure_keeps_report_and_usage() {
    for request in [BriefingRequest::new("Acme"), BriefingRequest::new("Acme").forced()] {
        let model = Arc::new(ScriptedModel::always(ScriptedReply::Fail("down".to_string())));
        let usage = Arc::new(Usage::default());
        let pipeline = BriefingPipeline::new(
            model.clone(),
            Arc::new(FixedArticles(articles().into_iter().take(1).collect())),
            Arc::new(BrokenReports),
            usage.clone(),
            Config::default(),
        );

        let outcome = pipeline.run(&request).await.unwrap();

        assert_eq!(model.call_count(), 3);
        assert!(outcome.report_id.is_none());
        assert!(!outcome.cached);
        assert!(outcome.report.used_fallback);
        assert!(validate_document(&outcome.report.summary).valid);

        let records = usage.records.lock().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.report_id.is_none()));
    }
}

#[tokio::test]
async fn test_article_source_failure_propagates() {
    let h = harness(ScriptedModel::new(), Arc::new(FailingArticles), Usage::default());
    let outcome = h.pipeline.run(&BriefingRequest::new("Acme")).await;
    assert!(matches!(outcome, Err(Error::External(_))));
    assert_eq!(h.model.call_count(), 0);
}

#[tokio::test]
async fn test_no_articles_still_yields_valid_document() {
    let h = harness(ScriptedModel::new(), Arc::new(FixedArticles(Vec::new())), Usage::default());
    let outcome = h.pipeline.run(&BriefingRequest::new("Acme")).await.unwrap();
    assert!(outcome.report.summaries.is_empty());
    assert!(validate_document(&outcome.report.summary).valid);
}
