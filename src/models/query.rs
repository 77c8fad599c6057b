//! Query and search request models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Options controlling search behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Enable query decomposition into search queries and criteria
    #[serde(default = "default_true")]
    pub decompose: bool,
    /// Enable LLM-based result verification against criteria
    #[serde(default = "default_true")]
    pub verify: bool,
    /// Enable classification (perfect/partial/reject). When false, raw
    /// verification results are returned without classification
    #[serde(default = "default_true")]
    pub classify: bool,
    /// Enable streaming mode; each result is emitted via SSE as it is verified
    #[serde(default)]
    pub stream: bool,
    /// Maximum number of results per query per adapter (1..=100)
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// Recency filter (e.g. "1y", "6m", "30d"); interpreted by adapters
    #[serde(default)]
    pub recency_filter: Option<String>,
    /// Specific adapters to use (None = all enabled)
    #[serde(default)]
    pub adapters: Option<Vec<String>>,
    /// Maximum end-to-end request processing time in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
}

fn default_true() -> bool {
    true
}

fn default_max_results() -> u32 {
    10
}

fn default_timeout() -> f64 {
    30.0
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            decompose: true,
            verify: true,
            classify: true,
            stream: false,
            max_results: default_max_results(),
            recency_filter: None,
            adapters: None,
            timeout_seconds: default_timeout(),
        }
    }
}

impl SearchOptions {
    /// Clamp out-of-range values to their documented bounds.
    pub fn normalized(mut self) -> Self {
        self.max_results = self.max_results.clamp(1, 100);
        if self.timeout_seconds <= 0.0 {
            self.timeout_seconds = default_timeout();
        }
        self
    }
}

/// Contextual information to refine search behavior. Opaque to the engine;
/// carried for adapters and downstream tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchContext {
    /// Caller's domain (e.g. "energy", "biomedical")
    #[serde(default)]
    pub user_domain: Option<String>,
    /// Preferred source domains
    #[serde(default)]
    pub preferred_sources: Vec<String>,
    /// Sources to exclude
    #[serde(default)]
    pub excluded_sources: Vec<String>,
    /// Preferred response language
    #[serde(default = "default_language")]
    pub language: String,
    /// Additional context parameters
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_language() -> String {
    "en".to_string()
}

/// Incoming search request from the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Natural language search query
    pub query: String,
    /// Search behavior options
    #[serde(default)]
    pub options: SearchOptions,
    /// Search context
    #[serde(default)]
    pub context: SearchContext,
}

/// Batch search request; multiple queries in one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSearchRequest {
    /// 1..=20 natural language search queries
    pub queries: Vec<String>,
    /// Shared search options applied to all queries
    #[serde(default)]
    pub options: SearchOptions,
    /// Shared search context
    #[serde(default)]
    pub context: SearchContext,
    /// Export format: "csv" or "json". When set, the response includes
    /// exported data for all perfect and partial results
    #[serde(default)]
    pub export_format: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let opts: SearchOptions = serde_json::from_str("{}").expect("deserialize");
        assert!(opts.decompose);
        assert!(opts.verify);
        assert!(opts.classify);
        assert!(!opts.stream);
        assert_eq!(opts.max_results, 10);
        assert_eq!(opts.timeout_seconds, 30.0);
        assert!(opts.adapters.is_none());
    }

    #[test]
    fn test_options_normalized_clamps() {
        let opts = SearchOptions {
            max_results: 500,
            timeout_seconds: -1.0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(opts.max_results, 100);
        assert_eq!(opts.timeout_seconds, 30.0);

        let opts = SearchOptions {
            max_results: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(opts.max_results, 1);
    }

    #[test]
    fn test_request_minimal_body() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"query": "solar nowcasting"}"#).expect("deserialize");
        assert_eq!(req.query, "solar nowcasting");
        assert_eq!(req.context.language, "en");
    }
}
