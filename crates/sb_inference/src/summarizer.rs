//! Map stage: one article in, one fully populated sales summary out.

use std::sync::Arc;
use std::time::Duration;

use sb_core::{ArticleInput, ArticleSummary, ChatModel, UsageRecord};
use serde_json::Value;
use tracing::{debug, warn};

use crate::attempt::call_for_content;
use crate::json::parse_model_json;
use crate::prompts;
use crate::text::{first_filled, first_sentence, is_blank, value_text};
use crate::Config;

pub const SOURCE_INITIAL: &str = "map:initial";
pub const SOURCE_REPAIR: &str = "map:repair";

/// Keyword groups mapped to a canned sales angle, checked in order.
const SALES_ANGLES: &[(&[&str], &str)] = &[
    (
        &["partnership", "deal", "contract", "agreement", "acquire", "acquisition"],
        "New partnership or contract: time a solution pitch",
    ),
    (
        &["funding", "investment", "raise", "earnings", "revenue", "profit", "guidance"],
        "Financial momentum: budget window to engage",
    ),
    (
        &["launch", "product", "platform", "feature", "service", "rollout"],
        "New launch: attach integration or value add",
    ),
    (
        &["regulation", "compliance", "security", "risk", "breach"],
        "Compliance or security driver: solution fit",
    ),
];

const GENERIC_SALES_ANGLE: &str = "Potential opportunity: explore fit and timing";

/// Whatever the model managed to produce for one article, coerced to text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialSummary {
    pub id: String,
    pub title: String,
    pub url: String,
    pub one_line_summary: String,
    pub short_summary: String,
    pub sales_bullet: String,
    pub suggested_question: String,
}

impl PartialSummary {
    pub fn from_value(value: &Value) -> Self {
        // Some models wrap the object in a one-element array.
        let obj = match value {
            Value::Array(items) => items.first().unwrap_or(&Value::Null),
            other => other,
        };
        Self {
            id: value_text(obj.get("id")),
            title: value_text(obj.get("title")),
            url: value_text(obj.get("url")),
            one_line_summary: value_text(obj.get("one_line_summary")),
            short_summary: value_text(obj.get("short_summary")),
            sales_bullet: value_text(obj.get("sales_bullet")),
            suggested_question: value_text(obj.get("suggested_question")),
        }
    }

    /// Free-text fields that are still blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("one_line_summary", &self.one_line_summary),
            ("short_summary", &self.short_summary),
            ("sales_bullet", &self.sales_bullet),
            ("suggested_question", &self.suggested_question),
        ]
        .into_iter()
        .filter(|(_, value)| is_blank(value))
        .map(|(name, _)| name)
        .collect()
    }

    /// Fills blank fields from `other`; fields already present are kept.
    pub fn fill_from(mut self, other: &PartialSummary) -> Self {
        for (mine, theirs) in [
            (&mut self.id, &other.id),
            (&mut self.title, &other.title),
            (&mut self.url, &other.url),
            (&mut self.one_line_summary, &other.one_line_summary),
            (&mut self.short_summary, &other.short_summary),
            (&mut self.sales_bullet, &other.sales_bullet),
            (&mut self.suggested_question, &other.suggested_question),
        ] {
            if is_blank(mine) && !is_blank(theirs) {
                *mine = theirs.clone();
            }
        }
        self
    }
}

/// Synthesizes every still-blank field from the article's own title and
/// description. Pure and total: the result always has all free-text fields set.
pub fn force_fill(article: &ArticleInput, company_name: &str, partial: &PartialSummary) -> ArticleSummary {
    let title = article.title.trim();
    let description = article.description.as_deref().unwrap_or("").trim();
    let base = first_filled([description, title]);

    let one_line_summary = first_filled([partial.one_line_summary.as_str()]).unwrap_or_else(|| match &base {
        Some(base) => first_sentence(base),
        None => format!("Update relevant to {}", company_name),
    });

    let short_summary = first_filled([partial.short_summary.as_str()]).unwrap_or_else(|| match &base {
        Some(base) => format!("{} This may influence {}'s roadmap or procurement timing.", base, company_name),
        None => format!("Recent development potentially relevant to {}'s commercial plans.", company_name),
    });

    let sales_bullet = first_filled([partial.sales_bullet.as_str()])
        .unwrap_or_else(|| sales_angle(&format!("{} {}", title, description)).to_string());

    let suggested_question = first_filled([partial.suggested_question.as_str()]).unwrap_or_else(|| {
        format!("What impact does this have on {}'s priorities and timelines?", company_name)
    });

    ArticleSummary {
        id: first_filled([article.id.as_deref().unwrap_or(""), partial.id.as_str()]),
        title: first_filled([title, partial.title.as_str()]).unwrap_or_default(),
        url: first_filled([article.url.as_str(), partial.url.as_str()]).unwrap_or_default(),
        one_line_summary,
        short_summary,
        sales_bullet,
        suggested_question,
    }
}

/// Canned sales angle for the first keyword group found in `text`.
pub fn sales_angle(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    SALES_ANGLES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(_, angle)| *angle)
        .unwrap_or(GENERIC_SALES_ANGLE)
}

#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub summary: ArticleSummary,
    /// One record per model call attempted for this article
    pub usage: Vec<UsageRecord>,
    pub repaired: bool,
    /// Code of the last failed call, if any
    pub error: Option<String>,
}

pub struct ArticleSummarizer {
    model: Arc<dyn ChatModel>,
    max_tokens: u32,
    retry_tokens: u32,
    timeout: Duration,
}

impl ArticleSummarizer {
    pub fn new(model: Arc<dyn ChatModel>, config: &Config) -> Self {
        Self {
            model,
            max_tokens: config.budgets.per_article,
            retry_tokens: config.budgets.per_article_retry,
            timeout: config.article_timeout,
        }
    }

    /// Never fails: every failure path ends in `force_fill`.
    pub async fn summarize(&self, article: &ArticleInput, company_name: &str) -> SummaryOutcome {
        let mut usage = Vec::new();
        let article_id = article.id.clone();

        let content = match call_for_content(
            self.model.as_ref(),
            prompts::summary_messages(article, company_name),
            self.max_tokens,
            self.timeout,
            SOURCE_INITIAL,
            &mut usage,
        )
        .await
        {
            Ok(content) => content,
            Err(e) => {
                warn!("Summary call failed for {:?} ({}): {}", article.title, e.code(), e);
                return SummaryOutcome {
                    summary: force_fill(article, company_name, &PartialSummary::default()),
                    usage: tag(usage, &article_id),
                    repaired: false,
                    error: Some(e.code().to_string()),
                };
            }
        };

        let parsed = parse_model_json(&content).map(|v| PartialSummary::from_value(&v));
        if parsed.is_none() {
            debug!("Summary output for {:?} was not JSON", article.title);
        }
        let mut partial = parsed.unwrap_or_default();
        let missing = partial.missing_fields();
        if missing.is_empty() {
            return SummaryOutcome {
                summary: force_fill(article, company_name, &partial),
                usage: tag(usage, &article_id),
                repaired: false,
                error: None,
            };
        }

        debug!("Repairing summary for {:?}, missing {:?}", article.title, missing);
        let mut error = None;
        match call_for_content(
            self.model.as_ref(),
            prompts::summary_repair_messages(article, company_name, &missing),
            self.retry_tokens,
            self.timeout,
            SOURCE_REPAIR,
            &mut usage,
        )
        .await
        {
            Ok(content) => {
                if let Some(value) = parse_model_json(&content) {
                    partial = partial.fill_from(&PartialSummary::from_value(&value));
                }
            }
            Err(e) => {
                warn!("Summary repair failed for {:?} ({}): {}", article.title, e.code(), e);
                error = Some(e.code().to_string());
            }
        }

        SummaryOutcome {
            summary: force_fill(article, company_name, &partial),
            usage: tag(usage, &article_id),
            repaired: true,
            error,
        }
    }
}

fn tag(usage: Vec<UsageRecord>, article_id: &Option<String>) -> Vec<UsageRecord> {
    usage
        .into_iter()
        .map(|record| record.with_article(article_id.clone()))
        .collect()
}
