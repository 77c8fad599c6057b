//! Structured output of the opensift filtering funnel.
//!
//! Two output modes:
//!
//! 1. **Complete mode** (`stream=false`) - a single [`SearchResponse`] JSON
//!    body after all results are verified and classified.
//! 2. **Streaming mode** (`stream=true`) - a sequence of SSE events, each
//!    carrying a [`StreamEvent`] payload, emitted as verification completes.

use serde::{Deserialize, Serialize};

use crate::models::assessment::{ScoredResult, ValidationResult};
use crate::models::criteria::CriteriaResult;
use crate::models::result::ResultItem;

/// A search result with its raw verification but without classification.
///
/// Returned when `classify=false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVerifiedResult {
    /// Original result item
    pub result: ResultItem,
    /// LLM validation result
    pub validation: ValidationResult,
}

/// Complete search response returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Unique request identifier
    pub request_id: String,
    /// Processing status: "completed", "no_results", "error"
    pub status: String,
    /// Total processing time in ms
    pub processing_time_ms: u64,
    /// Original user query
    pub query: String,
    /// Generated search queries and criteria
    pub criteria_result: CriteriaResult,
    /// Results that fully match all criteria (classify=true)
    #[serde(default)]
    pub perfect_results: Vec<ScoredResult>,
    /// Results with partial matches (classify=true)
    #[serde(default)]
    pub partial_results: Vec<ScoredResult>,
    /// Number of results that did not meet criteria (classify=true)
    #[serde(default)]
    pub rejected_count: usize,
    /// All verified results without classification (classify=false)
    #[serde(default)]
    pub raw_results: Vec<RawVerifiedResult>,
    /// Total results retrieved from search
    #[serde(default)]
    pub total_scanned: usize,
}

impl SearchResponse {
    /// Skeleton response with empty result sets.
    pub fn empty(request_id: String, status: &str, query: String, criteria: CriteriaResult) -> Self {
        Self {
            request_id,
            status: status.to_string(),
            processing_time_ms: 0,
            query,
            criteria_result: criteria,
            perfect_results: Vec::new(),
            partial_results: Vec::new(),
            rejected_count: 0,
            raw_results: Vec::new(),
            total_scanned: 0,
        }
    }
}

/// Response for a plan-only request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResponse {
    /// Unique request identifier
    pub request_id: String,
    /// Original user query
    pub query: String,
    /// Generated search queries and criteria
    pub criteria_result: CriteriaResult,
    /// Planning processing time in ms
    pub processing_time_ms: u64,
}

/// A single server-sent event payload for streaming mode.
///
/// Event types:
/// - `criteria` - planning complete, emitted once
/// - `search_complete` - retrieval finished, emitted once
/// - `result` - one result verified (+ classified), emitted per result
/// - `done` - final summary, emitted once
/// - `error` - unrecoverable error; terminates the stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Event type: criteria | search_complete | result | done | error
    pub event: String,
    /// Event payload
    pub data: serde_json::Value,
}

impl StreamEvent {
    pub fn new(event: &str, data: serde_json::Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }
}

/// Response for a batch search request (multiple queries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSearchResponse {
    /// Overall batch status
    pub status: String,
    /// Total processing time in ms
    pub processing_time_ms: u64,
    /// Number of queries in the batch
    pub total_queries: usize,
    /// Per-query search responses
    pub results: Vec<SearchResponse>,
    /// Export format (csv, json) if requested
    #[serde(default)]
    pub export_format: Option<String>,
    /// Exported data as a string (CSV text or JSON string)
    #[serde(default)]
    pub export_data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_response_shape() {
        let resp = SearchResponse::empty(
            "req_abc".into(),
            "no_results",
            "q".into(),
            CriteriaResult::empty(),
        );
        assert_eq!(resp.status, "no_results");
        assert_eq!(resp.total_scanned, 0);
        assert!(resp.perfect_results.is_empty());
        assert!(resp.raw_results.is_empty());
    }

    #[test]
    fn test_stream_event_roundtrip() {
        let ev = StreamEvent::new("done", serde_json::json!({"total_scanned": 2}));
        let json = serde_json::to_string(&ev).expect("serialize");
        let back: StreamEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.event, "done");
        assert_eq!(back.data["total_scanned"], 2);
    }
}
