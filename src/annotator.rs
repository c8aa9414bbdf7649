//! Boundary to the generative model that proposes annotations.
//!
//! The model itself is an external collaborator: it gets the lesson text plus
//! a few options and answers with `{"additions": [...]}`. This module owns the
//! request shape, the response decoding and the [`Annotator`] trait the
//! processor is generic over.

use crate::config::{IntegrationLevel, ProcessorConfig};
use crate::Addition;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Supplementary subject document whose text is given to the model as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Appendix {
    pub id: String,
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationRequest {
    /// Extracted lesson text, cut to the document budget.
    pub document_text: String,
    /// Combined appendix blocks, cut to the appendix budget. `None` without
    /// appendices.
    pub appendix_context: Option<String>,
    pub appendix_count: usize,
    pub level: IntegrationLevel,
    pub include_activities: bool,
    pub custom_request: Option<String>,
}

impl AnnotationRequest {
    pub fn build(document_text: &str, appendices: &[Appendix], config: &ProcessorConfig) -> Self {
        let appendix_context = if appendices.is_empty() {
            None
        } else {
            let combined = combine_appendices(appendices);
            Some(truncate_chars(&combined, config.appendix_char_budget).to_string())
        };

        Self {
            document_text: truncate_chars(document_text, config.document_char_budget).to_string(),
            appendix_context,
            appendix_count: appendices.len(),
            level: config.level,
            include_activities: config.include_activities,
            custom_request: config
                .custom_request
                .as_deref()
                .map(str::trim)
                .filter(|request| !request.is_empty())
                .map(str::to_string),
        }
    }
}

/// One `--- PHỤ LỤC: <name> ---` block per appendix, blank line between.
pub fn combine_appendices(appendices: &[Appendix]) -> String {
    appendices
        .iter()
        .map(|appendix| format!("--- PHỤ LỤC: {} ---\n{}", appendix.name, appendix.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// At most `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

pub trait Annotator {
    /// Propose additions for the request. An empty list is a valid answer.
    fn propose(&self, request: &AnnotationRequest) -> Result<Vec<Addition>>;
}

/// Wire shape of the model's answer. Records are kept as raw values so one
/// bad record does not take the rest of the batch with it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationResponse {
    #[serde(default)]
    pub additions: Option<Vec<serde_json::Value>>,
}

/// Decode a model answer. Blank input and a missing or null `additions`
/// field both mean "no additions". Records without a string `searchText`
/// and `nlsContent` are dropped with a warning.
pub fn parse_response(json: &str) -> Result<Vec<Addition>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let response: AnnotationResponse =
        serde_json::from_str(json).context("annotation response is not valid JSON")?;

    let mut additions = Vec::new();
    for (index, record) in response.additions.unwrap_or_default().into_iter().enumerate() {
        match serde_json::from_value::<Addition>(record) {
            Ok(addition) => additions.push(addition),
            Err(err) => warn!("Dropping annotation record {}: {}", index, err),
        }
    }
    Ok(additions)
}

/// Replays a response captured earlier, e.g. saved from the model service.
#[derive(Debug, Clone, Default)]
pub struct RecordedAnnotator {
    additions: Vec<Addition>,
}

impl RecordedAnnotator {
    pub fn new(additions: Vec<Addition>) -> Self {
        Self { additions }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(parse_response(json)?))
    }
}

impl Annotator for RecordedAnnotator {
    fn propose(&self, request: &AnnotationRequest) -> Result<Vec<Addition>> {
        debug!(
            "Replaying {} recorded additions for {} chars of lesson text",
            self.additions.len(),
            request.document_text.chars().count()
        );
        Ok(self.additions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn appendix(name: &str, text: &str) -> Appendix {
        Appendix {
            id: name.to_lowercase(),
            name: name.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn response_with_additions_is_decoded() {
        let additions = parse_response(
            r#"{"additions": [{"searchText": "understand X", "nlsContent": "NLS1: (TC1a)"}, {"searchText": "B", "nlsContent": "C", "location": "after"}]}"#,
        )
        .unwrap();
        assert_eq!(
            additions,
            vec![
                Addition::new("understand X", "NLS1: (TC1a)"),
                Addition {
                    location: Some("after".into()),
                    ..Addition::new("B", "C")
                },
            ]
        );
    }

    #[test]
    fn missing_or_null_additions_are_empty() {
        for json in ["", "   ", "{}", r#"{"additions": null}"#, r#"{"additions": []}"#] {
            assert!(parse_response(json).unwrap().is_empty(), "for {:?}", json);
        }
    }

    #[test]
    fn malformed_response_is_an_error() {
        assert!(parse_response("{additions:").is_err());
        assert!(parse_response(r#"{"additions": "none"}"#).is_err());
    }

    #[test]
    fn incomplete_records_are_dropped_and_the_rest_kept() {
        let additions = parse_response(
            r#"{"additions": [{"searchText": "A", "nlsContent": "ok"}, {"searchText": "B"}, "text", {"searchText": 3, "nlsContent": "x"}, {"searchText": "C", "nlsContent": "also ok"}]}"#,
        )
        .unwrap();
        assert_eq!(
            additions,
            vec![Addition::new("A", "ok"), Addition::new("C", "also ok")]
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("Tiếng Việt", 5), "Tiếng");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn request_applies_budgets_and_options() {
        let header = "--- PHỤ LỤC: Toán ---";
        let config = ProcessorConfig {
            document_char_budget: 4,
            appendix_char_budget: header.chars().count(),
            include_activities: false,
            custom_request: Some("  ".into()),
            ..ProcessorConfig::default()
        };
        let request = AnnotationRequest::build(
            "Giáo án",
            &[appendix("Toán", "Phụ lục một"), appendix("Tin", "hai")],
            &config,
        );

        assert_eq!(request.document_text, "Giáo");
        assert_eq!(request.appendix_count, 2);
        assert_eq!(request.appendix_context.as_deref(), Some(header));
        assert!(!request.include_activities);
        assert_eq!(request.custom_request, None);
        assert_eq!(request.level, IntegrationLevel::Standard);
    }

    #[test]
    fn appendix_blocks_are_separated_by_a_blank_line() {
        let combined = combine_appendices(&[appendix("A", "one"), appendix("B", "two")]);
        assert_eq!(combined, "--- PHỤ LỤC: A ---\none\n\n--- PHỤ LỤC: B ---\ntwo");
        assert_eq!(combine_appendices(&[]), "");
    }

    #[test]
    fn no_appendices_means_no_context() {
        let request = AnnotationRequest::build("text", &[], &ProcessorConfig::default());
        assert_eq!(request.appendix_context, None);
        assert_eq!(request.document_text, "text");
    }

    #[test]
    fn recorded_annotator_replays_its_additions() {
        let annotator =
            RecordedAnnotator::from_json(r#"{"additions": [{"searchText": "a", "nlsContent": "b"}]}"#)
                .unwrap();
        let request = AnnotationRequest::build("a", &[], &ProcessorConfig::default());
        assert_eq!(annotator.propose(&request).unwrap(), vec![Addition::new("a", "b")]);
    }
}
