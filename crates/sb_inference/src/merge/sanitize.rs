//! Coerces arbitrary model JSON into the fixed briefing shape.

use sb_core::{ArticleHighlight, FinalDocument, Slide, BULLETS_PER_SLIDE, SLIDE_COUNT, SLIDE_TITLES};
use serde_json::Value;

use crate::text::{first_filled, value_text};

pub const PLACEHOLDER_BULLET: &str = "•";

/// Pads with placeholders or truncates so exactly three non-blank bullets remain.
pub fn to_three_bullets<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut bullets: Vec<String> = items
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .take(BULLETS_PER_SLIDE)
        .collect();
    bullets.resize(BULLETS_PER_SLIDE, PLACEHOLDER_BULLET.to_string());
    bullets
}

fn is_placeholder_only(bullets: &[String]) -> bool {
    bullets.iter().all(|b| b == PLACEHOLDER_BULLET)
}

pub(crate) fn generic_highlight(company: &str) -> ArticleHighlight {
    ArticleHighlight {
        title: if company.trim().is_empty() { "Company".to_string() } else { company.to_string() },
        url: String::new(),
        one_line_summary: "Recent development relevant to sales engagement.".to_string(),
        sales_bullet: "Potential opportunity: align solution and timing".to_string(),
        suggested_question: format!("Any impact on {}'s priorities?", company),
    }
}

/// `"{company}: {first two one-liners}"`, or a generic sentence when there are none.
pub(crate) fn overview_from<'a>(company: &str, one_liners: impl IntoIterator<Item = &'a str>) -> String {
    let seed = one_liners
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join(" ");
    if seed.is_empty() {
        format!("{}: recent developments with potential commercial impact.", company)
    } else {
        format!("{}: {}", company, seed)
    }
}

/// Bullets derived from highlights: slide 1 from one-line summaries, slide 2
/// from sales bullets, slide 3 from suggested questions. Missing highlight
/// slots get generic text.
pub(crate) fn derived_bullets(company: &str, overview: &str, highlights: &[ArticleHighlight]) -> [Vec<String>; SLIDE_COUNT] {
    let slot = |i: usize| highlights.get(i);
    let fact = |i: usize, fallback: String| -> String {
        slot(i)
            .and_then(|h| first_filled([h.one_line_summary.as_str(), h.title.as_str()]))
            .unwrap_or(fallback)
    };

    let facts = vec![
        fact(0, overview.to_string()),
        fact(1, "Key development noted".to_string()),
        fact(2, format!("{} highlight(s) extracted", highlights.len())),
    ];
    let opportunities = vec![
        only(slot(0).map(|h| h.sales_bullet.as_str()), "Potential opportunity: align solution and timing"),
        only(slot(1).map(|h| h.sales_bullet.as_str()), "Assess budget and timeline window"),
        only(slot(2).map(|h| h.sales_bullet.as_str()), "Check risk and compliance drivers"),
    ];
    let questions = vec![
        only(
            slot(0).map(|h| h.suggested_question.as_str()),
            &format!("What impact on {}'s roadmap?", company),
        ),
        only(
            slot(1).map(|h| h.suggested_question.as_str()),
            "Who are the stakeholders and what is the decision timeline?",
        ),
        only(slot(2).map(|h| h.suggested_question.as_str()), "Any integration or compliance constraints?"),
    ];

    [
        to_three_bullets(facts),
        to_three_bullets(opportunities),
        to_three_bullets(questions),
    ]
}

fn only(value: Option<&str>, fallback: &str) -> String {
    value
        .and_then(|v| first_filled([v]))
        .unwrap_or_else(|| fallback.to_string())
}

fn coerce_highlight(value: &Value) -> ArticleHighlight {
    let one_line = value_text(value.get("one_line_summary"));
    ArticleHighlight {
        title: value_text(value.get("title")),
        url: value_text(value.get("url")),
        one_line_summary: if one_line.is_empty() { value_text(value.get("short_summary")) } else { one_line },
        sales_bullet: value_text(value.get("sales_bullet")),
        suggested_question: value_text(value.get("suggested_question")),
    }
}

fn coerce_bullets(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(|item| value_text(Some(item))).collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Builds a shape-correct document from parsed model output.
///
/// Titles and slide numbers are always the canonical ones for each position;
/// only bullet text is taken from the model.
pub fn sanitize_document(company_name: &str, raw: &Value, top_k: usize) -> FinalDocument {
    let mut highlights: Vec<ArticleHighlight> = raw
        .get("highlights")
        .and_then(Value::as_array)
        .map(|items| items.iter().take(top_k).map(coerce_highlight).collect())
        .unwrap_or_default();
    if highlights.is_empty() {
        highlights.push(generic_highlight(company_name));
    }

    let company = first_filled([value_text(raw.get("company")).as_str(), company_name.trim()]).unwrap_or_default();

    let company_overview = first_filled([value_text(raw.get("company_overview")).as_str()])
        .unwrap_or_else(|| overview_from(&company, highlights.iter().map(|h| h.one_line_summary.as_str())));

    let model_slides: Vec<&Value> = raw
        .get("slides")
        .and_then(Value::as_array)
        .map(|items| items.iter().take(SLIDE_COUNT).collect())
        .unwrap_or_default();

    let derived = derived_bullets(&company, &company_overview, &highlights);
    let slides = derived
        .into_iter()
        .enumerate()
        .map(|(i, derived)| {
            let bullets = to_three_bullets(coerce_bullets(model_slides.get(i).and_then(|s| s.get("bullet_points"))));
            Slide {
                slide_number: (i + 1) as u8,
                slide_title: SLIDE_TITLES[i].to_string(),
                bullet_points: if is_placeholder_only(&bullets) { derived } else { bullets },
            }
        })
        .collect();

    FinalDocument { company, company_overview, highlights, slides }
}
