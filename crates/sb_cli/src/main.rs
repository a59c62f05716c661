use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use sb_core::{ArticleSummary, Error, Result};
use sb_inference::merge::local_fallback;
use sb_inference::pipeline::{BriefingPipeline, BriefingRequest};
use sb_inference::{create_model, schema, Config, ModelKind};
use sb_storage::{create_storage, JsonFileArticleSource};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                match c {
                    's' => total_seconds += num,
                    'm' => total_seconds += num * 60,
                    'h' => total_seconds += num * 3600,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                }
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // bare number means seconds
        if !current_number.is_empty() {
            total_seconds += current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModelChoice {
    /// Azure if AZURE_ENDPOINT is set, then OpenAI, then the stub
    Auto,
    Azure,
    Openai,
    /// No remote calls; briefings come from local synthesis
    Stub,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Sales briefings from ranked news articles", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Summarize a company's articles and print the stored report
    Run {
        #[arg(long)]
        company: String,
        /// JSON file with ranked articles (a list, or lists keyed by company)
        #[arg(long)]
        articles: PathBuf,
        #[arg(long, env = "SALES_TOP_K")]
        top_k: Option<usize>,
        /// Articles to summarize
        #[arg(long)]
        limit: Option<usize>,
        /// Ignore cached reports
        #[arg(long)]
        force: bool,
        /// Abort the whole run after this long (e.g. 90s, 2m)
        #[arg(long)]
        timeout: Option<HumanDuration>,
        #[arg(long, default_value = "memory")]
        storage: String,
        /// SQLite database path
        #[arg(long)]
        db: Option<String>,
        #[arg(long, value_enum, default_value_t = ModelChoice::Auto)]
        model: ModelChoice,
    },
    /// Check a briefing document against the schema
    Validate { file: PathBuf },
    /// Build the local fallback document from saved summaries
    Fallback {
        #[arg(long)]
        company: String,
        #[arg(long)]
        summaries: PathBuf,
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the JSON output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn select_model(mut config: Config, choice: ModelChoice) -> Result<Config> {
    match (choice, &config.model) {
        (ModelChoice::Auto, _)
        | (ModelChoice::Azure, ModelKind::Azure { .. })
        | (ModelChoice::Openai, ModelKind::OpenAi { .. }) => {}
        (ModelChoice::Stub, _) => config.model = ModelKind::Dummy,
        (ModelChoice::Azure, _) => return Err(Error::InvalidInput("AZURE_ENDPOINT is not set".to_string())),
        (ModelChoice::Openai, _) => {
            // from_env prefers Azure when both are configured
            let api_key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| Error::InvalidInput("OPENAI_API_KEY is not set".to_string()))?;
            config.model = ModelKind::OpenAi {
                base_url: std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-5-mini".to_string()),
            };
            config.api_key = Some(api_key);
        }
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { company, articles, top_k, limit, force, timeout, storage, db, model } => {
            let config = select_model(Config::from_env(), model)?;
            let chat_model = create_model(&config)?;

            let handles = create_storage(&storage, db.as_deref()).await?;
            let pipeline = BriefingPipeline::new(
                chat_model,
                std::sync::Arc::new(JsonFileArticleSource::new(articles)),
                handles.reports,
                handles.usage,
                config,
            );
            let request = BriefingRequest { company_name: company, force, article_limit: limit, top_k };

            let outcome = match timeout {
                Some(HumanDuration(limit)) => tokio::time::timeout(limit, pipeline.run(&request))
                    .await
                    .map_err(|_| Error::Timeout(limit.as_secs()))??,
                None => pipeline.run(&request).await?,
            };
            match &outcome.report_id {
                Some(id) => info!(
                    "✨ Report {} ready (cached: {}, fallback: {})",
                    id, outcome.cached, outcome.report.used_fallback
                ),
                None => warn!("Report was not stored (fallback: {})", outcome.report.used_fallback),
            }
            print_json(&serde_json::json!({
                "reportId": outcome.report_id,
                "cached": outcome.cached,
                "report": outcome.report,
            }))
        }
        Commands::Validate { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let document: serde_json::Value = serde_json::from_str(&raw)?;
            let report = schema::validate(&document);
            if report.valid {
                println!("valid");
                Ok(())
            } else {
                for error in &report.errors {
                    println!("{}", error);
                }
                Err(Error::InvalidInput(format!(
                    "{} failed validation with {} error(s)",
                    file.display(),
                    report.errors.len()
                )))
            }
        }
        Commands::Fallback { company, summaries, top_k } => {
            let raw = std::fs::read_to_string(&summaries)?;
            let summaries: Vec<ArticleSummary> = serde_json::from_str(&raw)?;
            print_json(&local_fallback(&company, &summaries, top_k))
        }
    }
}
