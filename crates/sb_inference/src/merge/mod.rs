//! Reduce stage: the per-article summaries become one briefing document.

use std::sync::Arc;
use std::time::Duration;

use sb_core::{ArticleSummary, ChatMessage, ChatModel, Error, FinalDocument, UsageRecord};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::attempt::call_for_content;
use crate::json::parse_model_json;
use crate::prompts;
use crate::schema;
use crate::text::clip;
use crate::Config;

pub mod fallback;
pub mod sanitize;

pub use fallback::local_fallback;
pub use sanitize::{sanitize_document, PLACEHOLDER_BULLET};

pub const SOURCE_INITIAL: &str = "merge:initial";
pub const SOURCE_REPAIR: &str = "merge:repair";

const TITLE_CAP: usize = 220;
const ONE_LINE_CAP: usize = 260;
const SHORT_CAP: usize = 520;
const SALES_CAP: usize = 120;
const QUESTION_CAP: usize = 140;

/// Summary fields as sent to the model, clipped to keep the prompt bounded.
#[derive(Debug, Clone, Serialize)]
pub struct CompactSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub url: String,
    pub one_line_summary: String,
    pub short_summary: String,
    pub sales_bullet: String,
    pub suggested_question: String,
}

impl From<&ArticleSummary> for CompactSummary {
    fn from(s: &ArticleSummary) -> Self {
        Self {
            id: s.id.clone(),
            title: clip(&s.title, TITLE_CAP),
            url: s.url.trim().to_string(),
            one_line_summary: clip(&s.one_line_summary, ONE_LINE_CAP),
            short_summary: clip(&s.short_summary, SHORT_CAP),
            sales_bullet: clip(&s.sales_bullet, SALES_CAP),
            suggested_question: clip(&s.suggested_question, QUESTION_CAP),
        }
    }
}

/// Why a merge attempt produced nothing usable.
#[derive(Debug)]
pub enum MergeFailure {
    EmptyContent,
    JsonParseFailed,
    SchemaInvalid(Vec<String>),
    Call(Error),
}

impl MergeFailure {
    pub fn code(&self) -> &'static str {
        match self {
            MergeFailure::EmptyContent => "empty_content",
            MergeFailure::JsonParseFailed => "json_parse_failed",
            MergeFailure::SchemaInvalid(_) => "schema_invalid",
            MergeFailure::Call(e) => e.code(),
        }
    }
}

impl std::fmt::Display for MergeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeFailure::SchemaInvalid(errors) => write!(f, "schema_invalid: {}", errors.join("; ")),
            MergeFailure::Call(e) => write!(f, "{}: {}", e.code(), e),
            other => f.write_str(other.code()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub document: FinalDocument,
    pub used_fallback: bool,
    /// Code of the last failed attempt when the local fallback was used
    pub error: Option<String>,
    pub usage: Vec<UsageRecord>,
}

pub struct FinalMerger {
    model: Arc<dyn ChatModel>,
    max_tokens: u32,
    retry_tokens: u32,
    timeout: Duration,
}

impl FinalMerger {
    pub fn new(model: Arc<dyn ChatModel>, config: &Config) -> Self {
        Self {
            model,
            max_tokens: config.budgets.final_max.clamp(600, 2200),
            retry_tokens: config.budgets.final_retry.clamp(400, 1200),
            timeout: config.merge_timeout,
        }
    }

    /// Always yields a schema-valid document; the model is called at most twice.
    pub async fn merge(&self, company_name: &str, summaries: &[ArticleSummary], top_k: usize) -> MergeOutcome {
        let top = &summaries[..summaries.len().min(top_k)];
        let compact: Vec<CompactSummary> = top.iter().map(CompactSummary::from).collect();
        let articles = serde_json::to_value(&compact).unwrap_or(Value::Array(Vec::new()));
        let mut usage = Vec::new();

        let initial = prompts::merge_messages(company_name, top_k, &articles);
        debug!("Merge prompt for {}: {} chars", company_name, prompt_chars(&initial));
        match self
            .attempt(company_name, initial, self.max_tokens, top_k, SOURCE_INITIAL, &mut usage)
            .await
        {
            Ok(document) => {
                info!("Merged {} summaries for {}", top.len(), company_name);
                return MergeOutcome { document, used_fallback: false, error: None, usage };
            }
            Err(failure) => warn!("Merge attempt failed for {}: {}", company_name, failure),
        }

        let repair = prompts::merge_repair_messages(&articles);
        let failure = match self
            .attempt(company_name, repair, self.retry_tokens, top_k, SOURCE_REPAIR, &mut usage)
            .await
        {
            Ok(document) => {
                info!("Merged {} summaries for {} after repair", top.len(), company_name);
                return MergeOutcome { document, used_fallback: false, error: None, usage };
            }
            Err(failure) => failure,
        };

        warn!("Merge repair failed for {}: {}; using local fallback", company_name, failure);
        MergeOutcome {
            document: local_fallback(company_name, summaries, top_k),
            used_fallback: true,
            error: Some(failure.code().to_string()),
            usage,
        }
    }

    async fn attempt(
        &self,
        company_name: &str,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        top_k: usize,
        source: &str,
        usage: &mut Vec<UsageRecord>,
    ) -> Result<FinalDocument, MergeFailure> {
        let content = call_for_content(self.model.as_ref(), messages, max_tokens, self.timeout, source, usage)
            .await
            .map_err(MergeFailure::Call)?;
        if content.trim().is_empty() {
            return Err(MergeFailure::EmptyContent);
        }
        let parsed = parse_model_json(&content).ok_or(MergeFailure::JsonParseFailed)?;
        if !parsed.is_object() {
            return Err(MergeFailure::SchemaInvalid(vec!["root is not an object".to_string()]));
        }

        let document = sanitize_document(company_name, &parsed, top_k.max(1));
        let report = schema::validate_document(&document);
        if report.valid {
            Ok(document)
        } else {
            Err(MergeFailure::SchemaInvalid(report.errors))
        }
    }
}

fn prompt_chars(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|m| m.content.chars().count()).sum()
}
