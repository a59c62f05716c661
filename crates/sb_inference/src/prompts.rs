use sb_core::{ArticleInput, ChatMessage, SLIDE_TITLES};
use serde_json::{json, Value};

pub const SUMMARY_SYSTEM: &str = "You are a concise sales research assistant. Respond ONLY with valid JSON.";

pub const SUMMARY_REPAIR_SYSTEM: &str =
    "You must output ONLY JSON with the required keys. Fill missing text tersely.";

pub const MERGE_SYSTEM: &str = r#"You are an expert business research and sales analysis assistant. Turn per-article news summaries into a structured, accurate and concise package for a sales team. Return ONLY valid JSON, no extra text or commentary.

Produce:
1. A brief COMPANY OVERVIEW (who they are, what they do, 2-3 sentences max).
2. Clear, factual NEWS HIGHLIGHTS for each article, free of fluff or repetition.
3. A 3-SLIDE SUMMARY DECK ready for presentation.

Rules:
- Each one_line_summary is a single factual sentence grounded in the article.
- Each sales_bullet is 5-12 words and directly useful to a salesperson.
- Each suggested_question is a short, specific question a rep can ask the prospect.
- Ground every highlight and slide bullet in the supplied articles."#;

pub const MERGE_REPAIR_SYSTEM: &str =
    "You MUST output valid JSON that conforms to the schema. No commentary, no backticks.";

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn article_context(article: &ArticleInput) -> Value {
    json!({
        "id": article.id,
        "title": article.title,
        "url": article.url,
        "description": article.description.as_deref().unwrap_or(""),
        "source": article.source.as_deref().unwrap_or(""),
        "publishedAt": article.published_at.as_deref().unwrap_or(""),
    })
}

pub fn summary_messages(article: &ArticleInput, company_name: &str) -> Vec<ChatMessage> {
    let user = format!(
        r#"Company: {company}

Article:
{article}

Task:
Return a JSON object with exactly these keys:
{{
  "id": "<string or number>",
  "title": "<string>",
  "url": "<string>",
  "one_line_summary": "<one sentence, crisp>",
  "short_summary": "<2-3 sentences, factual, no fluff>",
  "sales_bullet": "<5-12 words, sales angle>",
  "suggested_question": "<one question a sales rep should ask>"
}}
No extra commentary. JSON only."#,
        company = company_name,
        article = pretty(&article_context(article)),
    );
    vec![ChatMessage::system(SUMMARY_SYSTEM), ChatMessage::user(user)]
}

pub fn summary_repair_messages(article: &ArticleInput, company_name: &str, missing: &[&str]) -> Vec<ChatMessage> {
    let user = format!(
        r#"Fill these EMPTY fields using the title/description context: {missing}. JSON only.

Required keys:
id, title, url, one_line_summary, short_summary, sales_bullet, suggested_question.

Context:
Company: {company}
Title: {title}
Description: {description}
URL: {url}"#,
        missing = missing.join(", "),
        company = company_name,
        title = article.title,
        description = article.description.as_deref().unwrap_or(""),
        url = article.url,
    );
    vec![ChatMessage::system(SUMMARY_REPAIR_SYSTEM), ChatMessage::user(user)]
}

fn slide_skeleton() -> String {
    SLIDE_TITLES
        .iter()
        .enumerate()
        .map(|(i, title)| {
            format!(
                r#"    {{ "slide_number": {}, "slide_title": "{}", "bullet_points": ["...", "...", "..."] }}"#,
                i + 1,
                title
            )
        })
        .collect::<Vec<_>>()
        .join(",\n")
}

pub fn merge_messages(company_name: &str, top_k: usize, articles: &Value) -> Vec<ChatMessage> {
    let user = format!(
        r#"COMPANY: {company}

ARTICLES (Top {top_k}):
{articles}

Return a single JSON object with EXACTLY these keys:
{{
  "company": "<string>",
  "company_overview": "<concise paragraph>",
  "highlights": [
    {{ "title": "", "url": "", "one_line_summary": "", "sales_bullet": "", "suggested_question": "" }}
  ],
  "slides": [
{slides}
  ]
}}
- Return ONLY JSON (no prose, no backticks).
- Each slide must have EXACTLY 3 short, punchy bullet points."#,
        company = company_name,
        top_k = top_k,
        articles = pretty(articles),
        slides = slide_skeleton(),
    );
    vec![ChatMessage::system(MERGE_SYSTEM), ChatMessage::user(user)]
}

pub fn merge_repair_messages(articles: &Value) -> Vec<ChatMessage> {
    let titles = SLIDE_TITLES
        .iter()
        .enumerate()
        .map(|(i, title)| format!("  {}) {}", i + 1, title))
        .collect::<Vec<_>>()
        .join("\n");
    let user = format!(
        r#"The previous output failed validation.

REQUIREMENTS:
- Object with keys: company (string), company_overview (string),
  highlights (array of objects with title, url, one_line_summary, sales_bullet, suggested_question),
  slides (array of exactly 3 slides with slide_number, slide_title, bullet_points[3]).
- Slide titles must be:
{titles}
- Each slide must have EXACTLY 3 bullet points (short, punchy).
- Return ONLY JSON.

Rebuild based on these articles:
{articles}"#,
        titles = titles,
        articles = pretty(articles),
    );
    vec![ChatMessage::system(MERGE_REPAIR_SYSTEM), ChatMessage::user(user)]
}
