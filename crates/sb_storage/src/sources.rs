use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sb_core::{ArticleInput, ArticleSource, Error, Result};
use serde::Deserialize;
use tracing::debug;

use crate::company_key;

#[derive(Deserialize)]
#[serde(untagged)]
enum ArticleFile {
    /// Already ranked, used for any company
    List(Vec<ArticleInput>),
    /// Ranked lists keyed by company name
    ByCompany(std::collections::HashMap<String, Vec<ArticleInput>>),
}

/// Reads pre-ranked articles from a JSON file, for offline runs.
#[derive(Debug, Clone)]
pub struct JsonFileArticleSource {
    path: PathBuf,
}

impl JsonFileArticleSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ArticleSource for JsonFileArticleSource {
    async fn fetch_ranked_articles(&self, company_name: &str, limit: usize) -> Result<Vec<ArticleInput>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let articles = match serde_json::from_str::<ArticleFile>(&raw)? {
            ArticleFile::List(articles) => articles,
            ArticleFile::ByCompany(by_company) => {
                let key = company_key(company_name);
                by_company
                    .into_iter()
                    .find(|(name, _)| company_key(name) == key)
                    .map(|(_, articles)| articles)
                    .ok_or_else(|| {
                        Error::InvalidInput(format!("No articles for {} in {}", company_name, self.path.display()))
                    })?
            }
        };
        debug!("Loaded {} articles from {}", articles.len(), self.path.display());
        Ok(articles.into_iter().take(limit).collect())
    }
}
