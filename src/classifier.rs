//! Result classifier - final perfect/partial/reject label and weighted score.
//!
//! Classification rules:
//!   - One criterion:
//!       support -> perfect, somewhat_support -> partial, anything else -> reject
//!   - Multiple criteria:
//!       all support -> perfect;
//!       at least one support/somewhat_support on a non-"time" criterion -> partial;
//!       everything else -> reject

use std::collections::HashMap;

use crate::models::{
    AssessmentType, Criterion, ResultClassification, ResultItem, ScoredResult, ValidationResult,
};

/// Classify a single result based on its validation.
///
/// Pure: for fixed criteria and assessments the output is fully determined.
pub fn classify(
    item: ResultItem,
    validation: ValidationResult,
    criteria: &[Criterion],
) -> ScoredResult {
    let criteria_map: HashMap<&str, &Criterion> = criteria
        .iter()
        .map(|c| (c.criterion_id.as_str(), c))
        .collect();

    let classification = if criteria.len() == 1 {
        classify_single(&validation)
    } else {
        classify_multiple(&validation, &criteria_map)
    };

    let weighted_score = weighted_score(&validation, &criteria_map);

    ScoredResult {
        result: item,
        validation,
        classification,
        weighted_score,
    }
}

/// Classify a batch of results.
///
/// `validations` must align with `items` by index. The output is sorted by
/// classification priority (perfect, partial, reject) and, within each
/// group, by descending weighted score; the sort is stable so ties keep
/// item order.
pub fn classify_batch(
    items: Vec<ResultItem>,
    validations: Vec<ValidationResult>,
    criteria: &[Criterion],
) -> Vec<ScoredResult> {
    let mut scored: Vec<ScoredResult> = items
        .into_iter()
        .zip(validations)
        .map(|(item, validation)| classify(item, validation, criteria))
        .collect();

    scored.sort_by(|a, b| {
        priority(a.classification)
            .cmp(&priority(b.classification))
            .then_with(|| b.weighted_score.total_cmp(&a.weighted_score))
    });

    scored
}

fn priority(c: ResultClassification) -> u8 {
    match c {
        ResultClassification::Perfect => 0,
        ResultClassification::Partial => 1,
        ResultClassification::Reject => 2,
    }
}

fn classify_single(validation: &ValidationResult) -> ResultClassification {
    match validation.criteria_assessment.first().map(|a| a.assessment) {
        Some(AssessmentType::Support) => ResultClassification::Perfect,
        Some(AssessmentType::SomewhatSupport) => ResultClassification::Partial,
        _ => ResultClassification::Reject,
    }
}

fn classify_multiple(
    validation: &ValidationResult,
    criteria_map: &HashMap<&str, &Criterion>,
) -> ResultClassification {
    let assessments = &validation.criteria_assessment;
    if assessments.is_empty() {
        return ResultClassification::Reject;
    }

    if assessments
        .iter()
        .all(|a| a.assessment == AssessmentType::Support)
    {
        return ResultClassification::Perfect;
    }

    // A time-only match is not enough to keep a result
    for a in assessments {
        if matches!(
            a.assessment,
            AssessmentType::Support | AssessmentType::SomewhatSupport
        ) {
            if let Some(criterion) = criteria_map.get(a.criterion_id.as_str()) {
                if criterion.criterion_type != "time" {
                    return ResultClassification::Partial;
                }
            }
        }
    }

    ResultClassification::Reject
}

/// Weighted score: support=1.0, somewhat_support=0.5, everything else 0.0,
/// each multiplied by its criterion weight, clamped to 1.0, 4 decimals.
fn weighted_score(
    validation: &ValidationResult,
    criteria_map: &HashMap<&str, &Criterion>,
) -> f64 {
    let total: f64 = validation
        .criteria_assessment
        .iter()
        .map(|a| {
            let weight = criteria_map
                .get(a.criterion_id.as_str())
                .map(|c| c.weight)
                .unwrap_or(0.0);
            let value = match a.assessment {
                AssessmentType::Support => 1.0,
                AssessmentType::SomewhatSupport => 0.5,
                AssessmentType::InsufficientInformation | AssessmentType::Reject => 0.0,
            };
            value * weight
        })
        .sum();

    (total.min(1.0) * 10_000.0).round() / 10_000.0
}
