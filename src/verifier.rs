//! Evidence verifier - LLM-based validation of results against criteria.
//!
//! For each [`ResultItem`] the verifier produces a [`ValidationResult`] with
//! one [`CriterionAssessment`] per criterion, in declaration order. Batch
//! verification fans out with bounded concurrency; a failure on one item
//! degrades that item to a fallback validation and never cancels siblings.

use std::sync::Arc;

use chrono::Local;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::Result;
use crate::llm::LlmClient;
use crate::models::{
    AssessmentType, CriterionAssessment, Criterion, Evidence, ResultItem, ValidationResult,
};
use crate::prompts::validation::{
    build_paper_prompt, build_result_prompt, format_criteria_xml,
    PAPER_VALIDATION_SYSTEM_PROMPT, VALIDATION_SYSTEM_PROMPT,
};

/// Verifies search results against screening criteria via the LLM.
pub struct EvidenceVerifier {
    llm: Option<Arc<LlmClient>>,
    model: String,
}

impl EvidenceVerifier {
    /// Create a verifier sharing the given LLM client (None = fallback only).
    pub fn new(llm: Option<Arc<LlmClient>>, model: String) -> Self {
        if llm.is_none() {
            warn!("Verifier LLM client not configured, all results will be insufficient_information");
        } else {
            info!(model = %model, "Verifier LLM client initialized");
        }
        Self { llm, model }
    }

    /// Verify a single result item against the criteria.
    ///
    /// Returns the fallback validation when no LLM client is configured.
    pub async fn verify(
        &self,
        item: &ResultItem,
        criteria: &[Criterion],
        query: &str,
        question_lang: &str,
    ) -> Result<ValidationResult> {
        let Some(llm) = &self.llm else {
            return Ok(fallback_validation(criteria));
        };

        let time = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let descriptions: Vec<String> = criteria.iter().map(|c| c.description.clone()).collect();
        let criteria_xml = format_criteria_xml(&descriptions);

        let (system, user) = if item.result_type == "paper" {
            let paper_xml = paper_prompt_xml(item);
            (
                PAPER_VALIDATION_SYSTEM_PROMPT,
                build_paper_prompt(&time, query, &criteria_xml, &paper_xml, question_lang),
            )
        } else {
            (
                VALIDATION_SYSTEM_PROMPT,
                build_result_prompt(&time, query, &criteria_xml, &item.to_prompt_xml(), question_lang),
            )
        };

        let raw = llm
            .chat_json(system, &user, Some(&self.model), None, None, 1)
            .await?;

        Ok(parse_validation_response(&raw, criteria))
    }

    /// Verify a batch of items with bounded concurrency.
    ///
    /// Returns one validation per item, in item order. Per-item failures
    /// degrade to [`fallback_validation`].
    pub async fn verify_batch(
        &self,
        items: &[ResultItem],
        criteria: &[Criterion],
        query: &str,
        question_lang: &str,
        max_concurrent: usize,
    ) -> Vec<ValidationResult> {
        if items.is_empty() {
            return Vec::new();
        }
        let max_concurrent = max_concurrent.max(1);

        info!(
            count = items.len(),
            max_concurrent = max_concurrent,
            "Starting batch verification"
        );

        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        let futures = items
            .iter()
            .enumerate()
            .map(|(idx, item)| self.verify_one(idx, item, criteria, query, question_lang, Arc::clone(&semaphore)));
        let mut indexed: Vec<(usize, ValidationResult)> = join_all(futures).await;

        indexed.sort_by_key(|(idx, _)| *idx);
        info!(verified = indexed.len(), "Batch verification complete");
        indexed.into_iter().map(|(_, v)| v).collect()
    }

    /// Verify a single item for [`Self::verify_batch`], tagging the result with its index.
    async fn verify_one(
        &self,
        idx: usize,
        item: &ResultItem,
        criteria: &[Criterion],
        query: &str,
        question_lang: &str,
        semaphore: Arc<Semaphore>,
    ) -> (usize, ValidationResult) {
        let _permit = semaphore.acquire().await;
        let validation = match self.verify(item, criteria, query, question_lang).await {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    idx = idx,
                    title = %item.title.chars().take(50).collect::<String>(),
                    error = %e,
                    "Verification failed, using fallback"
                );
                fallback_validation(criteria)
            }
        };
        (idx, validation)
    }
}

/// Render the fixed `<paper_info>` XML fragment from a paper result item.
fn paper_prompt_xml(item: &ResultItem) -> String {
    let field = |key: &str| item.fields.get(key).map(String::as_str).unwrap_or("N/A");
    [
        "<paper_info>".to_string(),
        format!("    <title>{}</title>", item.title),
        format!("    <authors>{}</authors>", field("authors")),
        format!("    <affiliations>{}</affiliations>", field("affiliations")),
        format!(
            "    <conference_journal>{}</conference_journal>",
            field("conference_journal")
        ),
        format!(
            "    <conference_journal_type>{}</conference_journal_type>",
            field("conference_journal_type")
        ),
        format!("    <research_field>{}</research_field>", field("research_field")),
        format!("    <doi>{}</doi>", field("doi")),
        format!(
            "    <publication_date>{}</publication_date>",
            field("publication_date")
        ),
        format!("    <abstract>{}</abstract>", item.content),
        format!("    <citation_count>{}</citation_count>", field("citation_count")),
        format!("    <source_url>{}</source_url>", item.source_url),
        "</paper_info>".to_string(),
    ]
    .join("\n")
}

/// Parse and normalize the raw LLM validation response.
///
/// - Assessment strings outside the enum coerce to `insufficient_information`.
/// - Criteria with no entry are filled with `insufficient_information`.
/// - Entries for unknown criterion ids are discarded.
/// - Output order follows criteria declaration order.
pub fn parse_validation_response(
    raw: &serde_json::Value,
    criteria: &[Criterion],
) -> ValidationResult {
    let entries = raw
        .get("criteria_assessment")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let mut by_id: std::collections::HashMap<&str, &serde_json::Value> =
        std::collections::HashMap::new();
    for entry in &entries {
        if let Some(id) = entry.get("criterion_id").and_then(|v| v.as_str()) {
            by_id.insert(id, entry);
        }
    }

    let mut assessments = Vec::with_capacity(criteria.len());
    for criterion in criteria {
        match by_id.get(criterion.criterion_id.as_str()) {
            Some(entry) => {
                let raw_assessment = entry
                    .get("assessment")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let assessment = AssessmentType::parse(raw_assessment).unwrap_or_else(|| {
                    warn!(
                        criterion_id = %criterion.criterion_id,
                        value = raw_assessment,
                        "Unknown assessment value, coercing to insufficient_information"
                    );
                    AssessmentType::InsufficientInformation
                });
                let evidence = entry
                    .get("evidence")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|e| {
                                Some(Evidence {
                                    source: e.get("source")?.as_str()?.to_string(),
                                    text: e.get("text")?.as_str()?.to_string(),
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                assessments.push(CriterionAssessment {
                    criterion_id: criterion.criterion_id.clone(),
                    assessment,
                    explanation: entry
                        .get("explanation")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    evidence,
                });
            }
            None => {
                warn!(
                    criterion_id = %criterion.criterion_id,
                    "Criterion missing from LLM response, filling with insufficient_information"
                );
                assessments.push(CriterionAssessment {
                    criterion_id: criterion.criterion_id.clone(),
                    assessment: AssessmentType::InsufficientInformation,
                    explanation: String::new(),
                    evidence: Vec::new(),
                });
            }
        }
    }

    ValidationResult {
        criteria_assessment: assessments,
        summary: raw
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    }
}

/// Validation used when verification is skipped or fails: every criterion is
/// `insufficient_information` with no evidence.
pub fn fallback_validation(criteria: &[Criterion]) -> ValidationResult {
    ValidationResult {
        criteria_assessment: criteria
            .iter()
            .map(|c| CriterionAssessment {
                criterion_id: c.criterion_id.clone(),
                assessment: AssessmentType::InsufficientInformation,
                explanation: String::new(),
                evidence: Vec::new(),
            })
            .collect(),
        summary: "Verification failed.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_criteria() -> Vec<Criterion> {
        vec![
            Criterion {
                criterion_id: "criterion_1".into(),
                criterion_type: "topic".into(),
                name: "Turbulence".into(),
                description: "About turbulence modeling".into(),
                weight: 0.6,
            },
            Criterion {
                criterion_id: "criterion_2".into(),
                criterion_type: "method".into(),
                name: "LLM".into(),
                description: "Uses large language models".into(),
                weight: 0.4,
            },
        ]
    }

    #[test]
    fn test_parse_validation_response_typical() {
        let raw = serde_json::json!({
            "criteria_assessment": [
                {
                    "criterion_id": "criterion_1",
                    "assessment": "support",
                    "explanation": "Addresses turbulence modeling.",
                    "evidence": [{"source": "title", "text": "DDES Model for Turbulent Flow"}],
                },
                {
                    "criterion_id": "criterion_2",
                    "assessment": "reject",
                    "explanation": "Not about LLMs.",
                    "evidence": [{"source": "research_field", "text": "Fluid Dynamics"}],
                },
            ],
            "summary": "Discusses turbulence modeling, not LLMs.",
        });
        let result = parse_validation_response(&raw, &sample_criteria());
        assert_eq!(result.criteria_assessment.len(), 2);
        assert_eq!(result.criteria_assessment[0].assessment, AssessmentType::Support);
        assert_eq!(result.criteria_assessment[1].assessment, AssessmentType::Reject);
        assert_eq!(result.criteria_assessment[0].evidence[0].source, "title");
        assert_eq!(result.summary, "Discusses turbulence modeling, not LLMs.");
    }

    #[test]
    fn test_parse_validation_response_unknown_assessment() {
        let raw = serde_json::json!({
            "criteria_assessment": [
                {"criterion_id": "criterion_1", "assessment": "kind_of", "explanation": "eh"},
            ],
            "summary": "s",
        });
        let result = parse_validation_response(&raw, &sample_criteria()[..1]);
        assert_eq!(
            result.criteria_assessment[0].assessment,
            AssessmentType::InsufficientInformation
        );
    }

    #[test]
    fn test_parse_validation_response_fills_missing_and_discards_extra() {
        let raw = serde_json::json!({
            "criteria_assessment": [
                {"criterion_id": "criterion_2", "assessment": "support", "explanation": "yes"},
                {"criterion_id": "criterion_99", "assessment": "support", "explanation": "ghost"},
            ],
            "summary": "s",
        });
        let result = parse_validation_response(&raw, &sample_criteria());
        assert_eq!(result.criteria_assessment.len(), 2);
        // Declaration order restored; missing entry filled
        assert_eq!(result.criteria_assessment[0].criterion_id, "criterion_1");
        assert_eq!(
            result.criteria_assessment[0].assessment,
            AssessmentType::InsufficientInformation
        );
        assert_eq!(result.criteria_assessment[1].criterion_id, "criterion_2");
        assert_eq!(result.criteria_assessment[1].assessment, AssessmentType::Support);
    }

    #[test]
    fn test_fallback_validation() {
        let criteria = sample_criteria();
        let result = fallback_validation(&criteria);
        assert_eq!(result.criteria_assessment.len(), 2);
        for a in &result.criteria_assessment {
            assert_eq!(a.assessment, AssessmentType::InsufficientInformation);
            assert!(a.evidence.is_empty());
        }
        assert_eq!(result.summary, "Verification failed.");
    }

    #[test]
    fn test_paper_prompt_xml_renders_fixed_fields() {
        let mut item = ResultItem {
            result_type: "paper".into(),
            title: "DDES Model".into(),
            content: "An abstract.".into(),
            source_url: "https://doi.org/10.1/x".into(),
            ..Default::default()
        };
        item.fields.insert("authors".into(), "A. Author".into());
        item.fields.insert("citation_count".into(), "7".into());

        let xml = paper_prompt_xml(&item);
        assert!(xml.contains("<title>DDES Model</title>"));
        assert!(xml.contains("<authors>A. Author</authors>"));
        assert!(xml.contains("<affiliations>N/A</affiliations>"));
        assert!(xml.contains("<abstract>An abstract.</abstract>"));
        assert!(xml.contains("<citation_count>7</citation_count>"));
    }

    #[tokio::test]
    async fn test_verify_without_llm_falls_back() {
        let verifier = EvidenceVerifier::new(None, "verifier-model".into());
        let criteria = sample_criteria();
        let item = ResultItem::default();
        let result = verifier
            .verify(&item, &criteria, "test query", "English")
            .await
            .expect("verify");
        assert_eq!(result.criteria_assessment.len(), 2);
        for a in &result.criteria_assessment {
            assert_eq!(a.assessment, AssessmentType::InsufficientInformation);
        }
    }

    #[tokio::test]
    async fn test_verify_batch_returns_one_per_item_in_order() {
        let verifier = EvidenceVerifier::new(None, "verifier-model".into());
        let criteria = sample_criteria();
        let items = vec![
            ResultItem {
                title: "first".into(),
                ..Default::default()
            },
            ResultItem {
                title: "second".into(),
                ..Default::default()
            },
            ResultItem {
                title: "third".into(),
                ..Default::default()
            },
        ];
        let results = verifier
            .verify_batch(&items, &criteria, "test query", "English", 2)
            .await;
        assert_eq!(results.len(), 3);
        for r in &results {
            assert_eq!(r.criteria_assessment.len(), criteria.len());
        }
    }

    #[tokio::test]
    async fn test_verify_batch_empty() {
        let verifier = EvidenceVerifier::new(None, "verifier-model".into());
        let results = verifier
            .verify_batch(&[], &sample_criteria(), "q", "English", 10)
            .await;
        assert!(results.is_empty());
    }
}
