//! Screening criteria generated from user queries.

use serde::{Deserialize, Serialize};

/// A single screening criterion for filtering search results.
///
/// Each criterion is an independent, actionable rule that can be checked
/// against a result's title/content/metadata on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    /// Unique criterion identifier within a request (e.g. `criterion_1`)
    pub criterion_id: String,
    /// Criterion type. Common types: task, method, topic, time, population, ...
    /// The planner may produce new types; any string is accepted.
    #[serde(rename = "type")]
    pub criterion_type: String,
    /// Concise label summarizing the criterion
    pub name: String,
    /// One-sentence rule defining the criterion
    pub description: String,
    /// Weight of this criterion in [0, 1]; all weights sum to 1.0
    #[serde(default)]
    pub weight: f64,
}

/// Result of the criteria generation stage (query decomposition).
///
/// Produced by the planner from a user's natural language query. Contains
/// search queries for retrieval and criteria for filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaResult {
    /// 2-4 search queries for result retrieval
    pub search_queries: Vec<String>,
    /// 1-4 screening criteria for result validation
    pub criteria: Vec<Criterion>,
}

impl CriteriaResult {
    /// Empty placeholder used for error-status responses.
    pub fn empty() -> Self {
        Self {
            search_queries: Vec::new(),
            criteria: Vec::new(),
        }
    }
}
