use sb_core::{ArticleHighlight, ArticleSummary, FinalDocument, Slide, SLIDE_TITLES};

use super::sanitize::{derived_bullets, generic_highlight, overview_from};
use crate::text::first_filled;

/// Builds a briefing straight from the map-stage summaries, without any model call.
///
/// Same derivation as the sanitize step, so a degraded document looks like a
/// sparse model document rather than a different format.
pub fn local_fallback(company_name: &str, summaries: &[ArticleSummary], top_k: usize) -> FinalDocument {
    let top = &summaries[..summaries.len().min(top_k.max(1))];

    let mut highlights: Vec<ArticleHighlight> = top
        .iter()
        .map(|s| ArticleHighlight {
            title: s.title.trim().to_string(),
            url: s.url.trim().to_string(),
            one_line_summary: first_filled([s.one_line_summary.as_str(), s.short_summary.as_str()])
                .unwrap_or_default(),
            sales_bullet: first_filled([s.sales_bullet.as_str()])
                .unwrap_or_else(|| "Potential opportunity: align solution and timing".to_string()),
            suggested_question: first_filled([s.suggested_question.as_str()])
                .unwrap_or_else(|| format!("Any impact on {}'s plans?", company_name)),
        })
        .collect();
    if highlights.is_empty() {
        highlights.push(generic_highlight(company_name));
    }

    let company_overview = overview_from(
        company_name,
        top.iter().map(|s| {
            if s.one_line_summary.trim().is_empty() {
                s.short_summary.as_str()
            } else {
                s.one_line_summary.as_str()
            }
        }),
    );

    let slides = derived_bullets(company_name, &company_overview, &highlights)
        .into_iter()
        .enumerate()
        .map(|(i, bullet_points)| Slide {
            slide_number: (i + 1) as u8,
            slide_title: SLIDE_TITLES[i].to_string(),
            bullet_points,
        })
        .collect();

    FinalDocument {
        company: company_name.to_string(),
        company_overview,
        highlights,
        slides,
    }
}
