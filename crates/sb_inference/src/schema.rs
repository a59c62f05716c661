//! Structural contract for the final briefing document.

use jsonschema::Validator;
use lazy_static::lazy_static;
use sb_core::FinalDocument;
use serde_json::{json, Value};

lazy_static! {
    /// Unknown properties are tolerated everywhere.
    pub static ref FINAL_DOCUMENT_SCHEMA: Value = json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Sales briefing",
        "type": "object",
        "required": ["company", "company_overview", "highlights", "slides"],
        "properties": {
            "company": { "type": "string" },
            "company_overview": { "type": "string" },
            "highlights": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["title", "url", "one_line_summary", "sales_bullet", "suggested_question"],
                    "properties": {
                        "title": { "type": "string" },
                        "url": { "type": "string" },
                        "one_line_summary": { "type": "string" },
                        "sales_bullet": { "type": "string" },
                        "suggested_question": { "type": "string" }
                    }
                }
            },
            "slides": {
                "type": "array",
                "minItems": 3,
                "maxItems": 3,
                "items": {
                    "type": "object",
                    "required": ["slide_number", "slide_title", "bullet_points"],
                    "properties": {
                        "slide_number": { "type": "integer" },
                        "slide_title": { "type": "string" },
                        "bullet_points": {
                            "type": "array",
                            "minItems": 3,
                            "maxItems": 3,
                            "items": { "type": "string" }
                        }
                    }
                }
            }
        }
    });

    static ref VALIDATOR: std::result::Result<Validator, String> =
        jsonschema::validator_for(&FINAL_DOCUMENT_SCHEMA).map_err(|e| e.to_string());
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn valid() -> Self {
        Self { valid: true, errors: Vec::new() }
    }

    fn invalid(errors: Vec<String>) -> Self {
        Self { valid: false, errors }
    }
}

/// Validates any JSON value against the briefing contract.
pub fn validate(instance: &Value) -> ValidationReport {
    match &*VALIDATOR {
        Ok(validator) => {
            let errors: Vec<String> = validator.iter_errors(instance).map(|e| e.to_string()).collect();
            if errors.is_empty() {
                ValidationReport::valid()
            } else {
                ValidationReport::invalid(errors)
            }
        }
        Err(e) => ValidationReport::invalid(vec![format!("Schema compilation error: {}", e)]),
    }
}

pub fn validate_document(doc: &FinalDocument) -> ValidationReport {
    match serde_json::to_value(doc) {
        Ok(value) => validate(&value),
        Err(e) => ValidationReport::invalid(vec![format!("Serialization error: {}", e)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_doc() -> Value {
        json!({
            "company": "Acme",
            "company_overview": "Acme builds rockets.",
            "highlights": [{
                "title": "t", "url": "u", "one_line_summary": "o",
                "sales_bullet": "s", "suggested_question": "q"
            }],
            "slides": [
                {"slide_number": 1, "slide_title": "Key Facts & Summary", "bullet_points": ["a", "b", "c"]},
                {"slide_number": 2, "slide_title": "Sales Opportunities & Risks", "bullet_points": ["a", "b", "c"]},
                {"slide_number": 3, "slide_title": "Questions & Next Steps", "bullet_points": ["a", "b", "c"]}
            ]
        })
    }

    #[test]
    fn test_accepts_valid_document() {
        let report = validate(&valid_doc());
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_tolerates_extra_fields() {
        let mut doc = valid_doc();
        doc["generated_by"] = json!("model-x");
        doc["highlights"][0]["id"] = json!("a1");
        doc["slides"][0]["notes"] = json!("speaker notes");
        assert!(validate(&doc).valid);
    }

    #[test]
    fn test_rejects_wrong_slide_count() {
        let mut doc = valid_doc();
        doc["slides"].as_array_mut().unwrap().pop();
        let report = validate(&doc);
        assert!(!report.valid);
        assert!(!report.errors.is_empty());
    }

    #[test]
    fn test_rejects_wrong_bullet_count() {
        let mut doc = valid_doc();
        doc["slides"][1]["bullet_points"] = json!(["a", "b"]);
        assert!(!validate(&doc).valid);
    }

    #[test]
    fn test_rejects_empty_highlights_and_missing_fields() {
        let mut doc = valid_doc();
        doc["highlights"] = json!([]);
        assert!(!validate(&doc).valid);

        let mut doc = valid_doc();
        doc["highlights"][0].as_object_mut().unwrap().remove("sales_bullet");
        assert!(!validate(&doc).valid);
    }

    #[test]
    fn test_rejects_non_integer_slide_number() {
        let mut doc = valid_doc();
        doc["slides"][2]["slide_number"] = json!("3");
        assert!(!validate(&doc).valid);

        let mut doc = valid_doc();
        doc["slides"][2]["slide_number"] = json!(2.5);
        assert!(!validate(&doc).valid);
    }

    #[test]
    fn test_rejects_non_string_company() {
        let mut doc = valid_doc();
        doc["company"] = json!(7);
        assert!(!validate(&doc).valid);
    }
}
