use std::env;
use std::str::FromStr;
use std::time::Duration;

mod attempt;
pub mod extract;
pub mod json;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod summarizer;
mod text;

/// Where chat completions are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelKind {
    /// Azure OpenAI deployment, authenticated with an `api-key` header
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
    /// OpenAI-compatible endpoint, authenticated with a bearer token
    OpenAi { base_url: String, model: String },
    /// No remote model; every call fails and the pipeline degrades to local synthesis
    Dummy,
}

/// Output-token ceilings for each kind of call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudgets {
    pub per_article: u32,
    pub per_article_retry: u32,
    pub final_max: u32,
    pub final_retry: u32,
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            per_article: 300,
            per_article_retry: 120,
            final_max: 3000,
            final_retry: 400,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: ModelKind,
    pub budgets: TokenBudgets,
    pub article_timeout: Duration,
    pub merge_timeout: Duration,
    pub sales_top_k: usize,
    pub article_limit: usize,
    pub cache_window: chrono::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: ModelKind::Dummy,
            budgets: TokenBudgets::default(),
            article_timeout: Duration::from_secs(30),
            merge_timeout: Duration::from_secs(90),
            sales_top_k: 3,
            article_limit: 3,
            cache_window: chrono::Duration::days(7),
        }
    }
}

impl Config {
    /// Reads provider credentials and pipeline knobs from the environment.
    /// Azure settings win over OpenAI settings; with neither, the dummy model is used.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let azure_endpoint = non_empty_var("AZURE_ENDPOINT");
        let openai_key = non_empty_var("OPENAI_API_KEY");

        let (model, api_key) = if let Some(endpoint) = azure_endpoint {
            let model = ModelKind::Azure {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                deployment: non_empty_var("AZURE_DEPLOYMENT_NAME").unwrap_or_else(|| "gpt-5-mini".to_string()),
                api_version: non_empty_var("AZURE_API_VERSION")
                    .unwrap_or_else(|| "2025-04-01-preview".to_string()),
            };
            (model, non_empty_var("AZURE_KEY"))
        } else if openai_key.is_some() {
            let model = ModelKind::OpenAi {
                base_url: non_empty_var("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                model: non_empty_var("OPENAI_MODEL").unwrap_or_else(|| "gpt-5-mini".to_string()),
            };
            (model, openai_key)
        } else {
            (ModelKind::Dummy, None)
        };

        let sales_top_k = parse_var("SALES_TOP_K", defaults.sales_top_k);
        Self {
            api_key,
            model,
            budgets: TokenBudgets {
                per_article: parse_var("PER_ARTICLE_MAX_TOKENS", defaults.budgets.per_article),
                per_article_retry: parse_var("PER_ARTICLE_RETRY_TOKENS", defaults.budgets.per_article_retry),
                final_max: parse_var("FINAL_MAX_COMPLETION_TOKENS", defaults.budgets.final_max),
                final_retry: parse_var("FINAL_RETRY_TOKENS", defaults.budgets.final_retry),
            },
            sales_top_k,
            article_limit: sales_top_k,
            ..defaults
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match non_empty_var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

pub mod prelude {
    pub use super::{Config, ModelKind, TokenBudgets};
    pub use super::merge::{FinalMerger, MergeOutcome};
    pub use super::models::create_model;
    pub use super::pipeline::{BriefingOutcome, BriefingPipeline, BriefingRequest};
    pub use super::summarizer::{ArticleSummarizer, SummaryOutcome};
    pub use sb_core::{ArticleInput, ArticleSummary, Error, FinalDocument, Result};
}

pub use models::create_model;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model, ModelKind::Dummy);
        assert_eq!(config.sales_top_k, 3);
        assert_eq!(config.budgets.per_article, 300);
        assert_eq!(config.budgets.per_article_retry, 120);
        assert_eq!(config.merge_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_parse_var_falls_back_on_garbage() {
        assert_eq!(parse_var("SB_TEST_UNSET_VARIABLE", 42u32), 42);
    }
}
