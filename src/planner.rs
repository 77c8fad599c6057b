//! Query planner - generates search queries and screening criteria.
//!
//! The planner is the first stage of the filtering funnel. It asks the LLM
//! to analyze the user's natural language query and produce:
//!   1. `search_queries`: 2-4 queries for result retrieval
//!   2. `criteria`: 1-4 screening criteria for result validation
//!
//! Falls back to heuristic decomposition when the LLM is unavailable or
//! fails. The planner never returns an error; every path yields a usable
//! [`CriteriaResult`].

use std::sync::Arc;

use chrono::Local;
use tracing::{info, warn};

use crate::error::{Result, SiftError};
use crate::llm::LlmClient;
use crate::models::{CriteriaResult, Criterion, SearchRequest};
use crate::prompts::criteria::{build_user_prompt, CRITERIA_SYSTEM_PROMPT};

/// Planner sampling temperature; higher than verification to encourage
/// query diversity.
const PLAN_TEMPERATURE: f64 = 0.6;

/// Tolerance on the criteria weight sum before normalization kicks in
const WEIGHT_TOLERANCE: f64 = 0.05;

/// Generates search queries and screening criteria from user queries.
pub struct QueryPlanner {
    llm: Option<Arc<LlmClient>>,
    model: String,
}

impl QueryPlanner {
    /// Create a planner sharing the given LLM client (None = heuristics only).
    pub fn new(llm: Option<Arc<LlmClient>>, model: String) -> Self {
        if llm.is_none() {
            warn!("Planner LLM client not configured, using heuristic fallback");
        } else {
            info!(model = %model, "Planner LLM client initialized");
        }
        Self { llm, model }
    }

    /// Generate search queries and criteria for the given request.
    pub async fn plan(&self, request: &SearchRequest) -> CriteriaResult {
        // Skip the LLM entirely when decomposition is disabled
        if !request.options.decompose {
            return heuristic_plan(&request.query);
        }

        if let Some(llm) = &self.llm {
            let start = std::time::Instant::now();
            match self.generate_with_llm(llm, &request.query).await {
                Ok(result) => {
                    info!(
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        search_queries = result.search_queries.len(),
                        criteria = result.criteria.len(),
                        "Criteria generated via LLM"
                    );
                    return result;
                }
                Err(e) => {
                    warn!(
                        model = %self.model,
                        error = %e,
                        "LLM criteria generation failed, falling back to heuristic"
                    );
                }
            }
        }

        heuristic_plan(&request.query)
    }

    async fn generate_with_llm(&self, llm: &LlmClient, query: &str) -> Result<CriteriaResult> {
        let current_time = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let user_prompt = build_user_prompt(&current_time, query);

        let raw = llm
            .chat_json(
                CRITERIA_SYSTEM_PROMPT,
                &user_prompt,
                Some(&self.model),
                Some(PLAN_TEMPERATURE),
                None,
                1,
            )
            .await?;

        parse_criteria_response(&raw)
    }
}

/// Parse and validate the raw LLM response into a [`CriteriaResult`].
///
/// Missing criterion ids are assigned deterministically as `criterion_<i>`;
/// missing type/name/description get neutral defaults; weights are
/// normalized to sum to exactly 1.0 when they drift beyond tolerance.
pub fn parse_criteria_response(raw: &serde_json::Value) -> Result<CriteriaResult> {
    let search_queries: Vec<String> = raw
        .get("search_queries")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|q| q.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if search_queries.is_empty() {
        return Err(SiftError::Validation(
            "LLM response missing or invalid 'search_queries'".into(),
        ));
    }

    let criteria_raw = raw
        .get("criteria")
        .and_then(|v| v.as_array())
        .filter(|arr| !arr.is_empty())
        .ok_or_else(|| SiftError::Validation("LLM response missing or invalid 'criteria'".into()))?;

    let mut criteria: Vec<Criterion> = Vec::with_capacity(criteria_raw.len());
    for (i, c) in criteria_raw.iter().enumerate() {
        let n = i + 1;
        criteria.push(Criterion {
            criterion_id: c
                .get("criterion_id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("criterion_{n}")),
            criterion_type: c
                .get("type")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| "topic".to_string()),
            name: c
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Criterion {n}")),
            description: c
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            weight: c.get("weight").and_then(|v| v.as_f64()).unwrap_or(0.0),
        });
    }

    normalize_weights(&mut criteria);

    Ok(CriteriaResult {
        search_queries,
        criteria,
    })
}

/// Normalize criteria weights to sum to exactly 1.0.
///
/// Each weight is divided by the total and rounded to 2 decimals, then the
/// last criterion absorbs the rounding residual.
fn normalize_weights(criteria: &mut [Criterion]) {
    let total: f64 = criteria.iter().map(|c| c.weight).sum();
    if (total - 1.0).abs() <= WEIGHT_TOLERANCE || total <= 0.0 {
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            warn!(total = total, "Criteria weights sum invalid and not normalizable");
        }
        return;
    }

    warn!(total = total, "Criteria weights out of tolerance, normalizing");
    for c in criteria.iter_mut() {
        c.weight = round2(c.weight / total);
    }
    let sum: f64 = criteria.iter().map(|c| c.weight).sum();
    if let Some(last) = criteria.last_mut() {
        last.weight = round2(last.weight + (1.0 - sum));
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Create a heuristic fallback plan from the original query.
///
/// Used when the LLM is unavailable or decomposition is disabled. Generates
/// query variations to improve recall: split halves for long queries,
/// token reversal for short ones, an "overview" suffix for single tokens.
pub fn heuristic_plan(query: &str) -> CriteriaResult {
    let mut queries = vec![query.to_string()];

    let tokens: Vec<&str> = query.split_whitespace().collect();
    if tokens.len() >= 4 {
        let mid = tokens.len() / 2;
        queries.push(tokens[..mid].join(" "));
        queries.push(tokens[mid..].join(" "));
    } else if tokens.len() >= 2 {
        let reversed: Vec<&str> = tokens.iter().rev().copied().collect();
        queries.push(reversed.join(" "));
    } else {
        queries.push(format!("{query} overview"));
    }

    // Case-insensitive dedup, preserving first occurrence
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for q in queries {
        let key = q.trim().to_lowercase();
        if !key.is_empty() && seen.insert(key) {
            unique.push(q.trim().to_string());
        }
    }
    if unique.is_empty() {
        unique.push(query.to_string());
    }

    CriteriaResult {
        search_queries: unique,
        criteria: vec![Criterion {
            criterion_id: "criterion_1".to_string(),
            criterion_type: "topic".to_string(),
            name: "Query relevance".to_string(),
            description: format!("The result is directly relevant to: {query}"),
            weight: 1.0,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_plan_long_query_splits() {
        let plan = heuristic_plan("deep learning solar irradiance nowcasting");
        assert_eq!(plan.search_queries.len(), 3);
        assert_eq!(plan.search_queries[0], "deep learning solar irradiance nowcasting");
        assert_eq!(plan.search_queries[1], "deep learning");
        assert_eq!(plan.search_queries[2], "solar irradiance nowcasting");
        assert_eq!(plan.criteria.len(), 1);
        assert_eq!(plan.criteria[0].criterion_id, "criterion_1");
        assert_eq!(plan.criteria[0].weight, 1.0);
    }

    #[test]
    fn test_heuristic_plan_short_query_reverses() {
        let plan = heuristic_plan("solar nowcasting");
        assert_eq!(plan.search_queries, vec!["solar nowcasting", "nowcasting solar"]);
    }

    #[test]
    fn test_heuristic_plan_single_token() {
        let plan = heuristic_plan("turbulence");
        assert_eq!(plan.search_queries, vec!["turbulence", "turbulence overview"]);
    }

    #[test]
    fn test_heuristic_plan_dedups_case_insensitively() {
        // Reversal of a palindromic-token query collapses into the original
        let plan = heuristic_plan("solar Solar");
        assert_eq!(plan.search_queries, vec!["solar Solar"]);
    }

    #[test]
    fn test_heuristic_criterion_description() {
        let plan = heuristic_plan("graph neural networks");
        assert_eq!(
            plan.criteria[0].description,
            "The result is directly relevant to: graph neural networks"
        );
        assert_eq!(plan.criteria[0].criterion_type, "topic");
    }

    #[test]
    fn test_parse_criteria_response_full() {
        let raw = serde_json::json!({
            "search_queries": ["\"solar nowcasting\" AND transformer", "solar forecasting"],
            "criteria": [
                {"type": "topic", "name": "Solar", "description": "About solar nowcasting", "weight": 0.7},
                {"type": "method", "name": "Transformer", "description": "Uses transformers", "weight": 0.3},
            ],
        });
        let result = parse_criteria_response(&raw).expect("parse");
        assert_eq!(result.search_queries.len(), 2);
        assert_eq!(result.criteria.len(), 2);
        assert_eq!(result.criteria[0].criterion_id, "criterion_1");
        assert_eq!(result.criteria[1].criterion_id, "criterion_2");
        let total: f64 = result.criteria.iter().map(|c| c.weight).sum();
        assert!((total - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_parse_criteria_response_fills_missing_fields() {
        let raw = serde_json::json!({
            "search_queries": ["q"],
            "criteria": [{"weight": 1.0}],
        });
        let result = parse_criteria_response(&raw).expect("parse");
        let c = &result.criteria[0];
        assert_eq!(c.criterion_id, "criterion_1");
        assert_eq!(c.criterion_type, "topic");
        assert_eq!(c.name, "Criterion 1");
        assert_eq!(c.description, "");
    }

    #[test]
    fn test_parse_criteria_response_normalizes_weights() {
        let raw = serde_json::json!({
            "search_queries": ["q"],
            "criteria": [
                {"description": "a", "weight": 0.9},
                {"description": "b", "weight": 0.9},
                {"description": "c", "weight": 0.9},
            ],
        });
        let result = parse_criteria_response(&raw).expect("parse");
        let total: f64 = result.criteria.iter().map(|c| c.weight).sum();
        assert!((total - 1.0).abs() < 1e-3, "total was {total}");
    }

    #[test]
    fn test_parse_criteria_response_within_tolerance_untouched() {
        let raw = serde_json::json!({
            "search_queries": ["q"],
            "criteria": [
                {"description": "a", "weight": 0.52},
                {"description": "b", "weight": 0.51},
            ],
        });
        let result = parse_criteria_response(&raw).expect("parse");
        assert_eq!(result.criteria[0].weight, 0.52);
        assert_eq!(result.criteria[1].weight, 0.51);
    }

    #[test]
    fn test_parse_criteria_response_missing_queries() {
        let raw = serde_json::json!({"criteria": [{"weight": 1.0}]});
        assert!(parse_criteria_response(&raw).is_err());
        let raw = serde_json::json!({"search_queries": [], "criteria": [{"weight": 1.0}]});
        assert!(parse_criteria_response(&raw).is_err());
    }

    #[test]
    fn test_parse_criteria_response_missing_criteria() {
        let raw = serde_json::json!({"search_queries": ["q"]});
        assert!(parse_criteria_response(&raw).is_err());
        let raw = serde_json::json!({"search_queries": ["q"], "criteria": []});
        assert!(parse_criteria_response(&raw).is_err());
    }

    #[tokio::test]
    async fn test_plan_without_llm_uses_heuristic() {
        let planner = QueryPlanner::new(None, "planner-model".into());
        let request = SearchRequest {
            query: "quantum error correction".into(),
            options: Default::default(),
            context: Default::default(),
        };
        let plan = planner.plan(&request).await;
        assert!(!plan.search_queries.is_empty());
        assert_eq!(plan.criteria.len(), 1);
        assert_eq!(plan.criteria[0].weight, 1.0);
    }

    #[tokio::test]
    async fn test_plan_decompose_disabled_skips_llm() {
        let planner = QueryPlanner::new(None, "planner-model".into());
        let request = SearchRequest {
            query: "token ring".into(),
            options: crate::models::SearchOptions {
                decompose: false,
                ..Default::default()
            },
            context: Default::default(),
        };
        let plan = planner.plan(&request).await;
        assert_eq!(plan.search_queries[0], "token ring");
    }
}
