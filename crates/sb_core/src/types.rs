use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical slide titles, in deck order. Slide titles never come from model output.
pub const SLIDE_TITLES: [&str; 3] = [
    "Key Facts & Summary",
    "Sales Opportunities & Risks",
    "Questions & Next Steps",
];

pub const SLIDE_COUNT: usize = 3;
pub const BULLETS_PER_SLIDE: usize = 3;

/// A ranked news article as supplied by the article source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "publishedAt", alias = "published_at")]
    pub published_at: Option<String>,
}

impl ArticleInput {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Sales-oriented digest of a single article, produced by the map stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub one_line_summary: String,
    #[serde(default)]
    pub short_summary: String,
    #[serde(default)]
    pub sales_bullet: String,
    #[serde(default)]
    pub suggested_question: String,
}

impl ArticleSummary {
    /// True when every free-text field carries content.
    pub fn is_complete(&self) -> bool {
        [
            &self.one_line_summary,
            &self.short_summary,
            &self.sales_bullet,
            &self.suggested_question,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleHighlight {
    pub title: String,
    pub url: String,
    pub one_line_summary: String,
    pub sales_bullet: String,
    pub suggested_question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub slide_number: u8,
    pub slide_title: String,
    pub bullet_points: Vec<String>,
}

/// The briefing handed to consumers: overview, highlights and a three-slide outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalDocument {
    pub company: String,
    pub company_overview: String,
    pub highlights: Vec<ArticleHighlight>,
    pub slides: Vec<Slide>,
}

/// Token metering as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, alias = "promptTokens")]
    pub prompt_tokens: u64,
    #[serde(default, alias = "completionTokens")]
    pub completion_tokens: u64,
    #[serde(default, alias = "totalTokens")]
    pub total_tokens: u64,
}

/// One record per attempted model call, whether or not its output was used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub source: String,
    pub model: Option<String>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
}

impl UsageRecord {
    pub fn new(source: impl Into<String>, model: Option<String>, usage: Option<TokenUsage>) -> Self {
        let usage = usage.unwrap_or_default();
        Self {
            source: source.into(),
            model,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            report_id: None,
            article_id: None,
        }
    }

    pub fn with_article(mut self, article_id: Option<String>) -> Self {
        self.article_id = article_id;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleTokens {
    pub article_id: Option<String>,
    pub title: String,
    pub tokens: u64,
}

/// Token totals embedded in a persisted report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsageSummary {
    pub map_stage: Vec<ArticleTokens>,
    pub merge_stage: u64,
    pub total_tokens: u64,
}

/// Everything one pipeline run produced, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub company_name: String,
    pub articles: Vec<ArticleInput>,
    pub summaries: Vec<ArticleSummary>,
    pub summary: FinalDocument,
    pub used_fallback: bool,
    pub merge_error: Option<String>,
    pub token_usage: TokenUsageSummary,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    pub id: String,
    pub report: Report,
}
