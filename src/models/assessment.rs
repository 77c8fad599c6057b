//! LLM-based validation results for search results.

use serde::{Deserialize, Serialize};

use crate::models::result::ResultItem;

/// Assessment result for a single criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentType {
    /// Clear, direct evidence that fully satisfies the criterion
    Support,
    /// Evidence contradicts the criterion, or the result is foundationally irrelevant
    Reject,
    /// Related, but the evidence is indirect or requires inference
    SomewhatSupport,
    /// In the right domain but no evidence either way
    InsufficientInformation,
}

impl AssessmentType {
    /// Parse an assessment string as emitted by the model.
    ///
    /// Returns `None` for anything outside the closed enum; callers coerce
    /// unknown values to `InsufficientInformation`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "support" => Some(Self::Support),
            "reject" => Some(Self::Reject),
            "somewhat_support" => Some(Self::SomewhatSupport),
            "insufficient_information" => Some(Self::InsufficientInformation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Reject => "reject",
            Self::SomewhatSupport => "somewhat_support",
            Self::InsufficientInformation => "insufficient_information",
        }
    }
}

/// A piece of evidence extracted from the search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    /// Field the evidence was extracted from (title, content, etc.)
    pub source: String,
    /// Verbatim text from the result
    pub text: String,
}

/// Assessment of a single criterion against a search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionAssessment {
    /// ID of the criterion being assessed
    pub criterion_id: String,
    /// Assessment result
    pub assessment: AssessmentType,
    /// Why the criterion is/isn't met
    pub explanation: String,
    /// Supporting evidence from the result
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

/// Complete validation result for a search result against all criteria.
///
/// Produced by the verifier for each result item. `criteria_assessment`
/// holds exactly one entry per criterion, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Per-criterion assessment results
    pub criteria_assessment: Vec<CriterionAssessment>,
    /// Overall summary: result content + alignment with the user query
    pub summary: String,
}

/// Final classification of a search result after verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultClassification {
    /// All criteria fully supported
    Perfect,
    /// At least one non-time criterion supported/somewhat supported
    Partial,
    /// Does not meet minimum criteria; not shown to the caller
    Reject,
}

impl ResultClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Perfect => "perfect",
            Self::Partial => "partial",
            Self::Reject => "reject",
        }
    }
}

/// A search result with its validation and final classification.
///
/// Output of the full filtering funnel for one result item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    /// Original result item
    pub result: ResultItem,
    /// LLM validation result
    pub validation: ValidationResult,
    /// Final classification
    pub classification: ResultClassification,
    /// Weighted score in [0, 1] based on criteria weights and assessments
    pub weighted_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assessment_parse_roundtrip() {
        for s in [
            "support",
            "reject",
            "somewhat_support",
            "insufficient_information",
        ] {
            let a = AssessmentType::parse(s).expect("known value");
            assert_eq!(a.as_str(), s);
        }
        assert!(AssessmentType::parse("maybe").is_none());
        assert!(AssessmentType::parse("").is_none());
    }

    #[test]
    fn test_assessment_serde_snake_case() {
        let json = serde_json::to_string(&AssessmentType::SomewhatSupport).expect("serialize");
        assert_eq!(json, "\"somewhat_support\"");
        let back: AssessmentType =
            serde_json::from_str("\"insufficient_information\"").expect("deserialize");
        assert_eq!(back, AssessmentType::InsufficientInformation);
    }

    #[test]
    fn test_classification_serde() {
        let json = serde_json::to_string(&ResultClassification::Perfect).expect("serialize");
        assert_eq!(json, "\"perfect\"");
    }
}
