//! Search backend adapters.
//!
//! Every backend implements [`SearchAdapter`], the normalized connector
//! interface. Adapters are process-scoped: constructed from configuration at
//! startup, initialized once, health-checked on demand, and shut down at
//! process exit. They must be safe under concurrent invocation; connection
//! pooling is each adapter's own responsibility (in practice, a shared
//! `reqwest::Client`).

pub mod meilisearch;
pub mod openalex;
pub mod opensearch;
pub mod registry;
pub mod wikipedia;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AdapterConfig;
use crate::error::Result;
use crate::models::{PaperInfo, SearchOptions, StandardDocument};

pub use registry::AdapterRegistry;

/// Health status of a search adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterHealth {
    /// "healthy", "degraded", or "unhealthy"
    pub status: String,
    /// Latency of the last health probe in ms
    #[serde(default)]
    pub latency_ms: u64,
    /// ISO timestamp of the last health check
    #[serde(default)]
    pub last_check: Option<String>,
    /// Additional health message
    #[serde(default)]
    pub message: Option<String>,
}

impl AdapterHealth {
    pub fn healthy(latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            latency_ms,
            last_check: Some(chrono::Utc::now().to_rfc3339()),
            message: Some(message.into()),
        }
    }

    pub fn degraded(latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            latency_ms,
            last_check: Some(chrono::Utc::now().to_rfc3339()),
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            latency_ms: 0,
            last_check: Some(chrono::Utc::now().to_rfc3339()),
            message: Some(message.into()),
        }
    }
}

/// Raw search results from a backend before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResults {
    /// Total number of matching documents on the backend
    pub total_hits: u64,
    /// Raw document values
    pub documents: Vec<serde_json::Value>,
    /// Backend-specific metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Backend query execution time in ms
    #[serde(default)]
    pub took_ms: u64,
}

/// Normalized interface every search backend implements.
///
/// Required methods cover the generic path: `search` + `map_to_standard_schema`.
/// Backends with a native academic shape additionally override
/// [`search_papers`](SearchAdapter::search_papers); the default
/// implementation returns `Ok(None)`, which the engine reads as
/// "capability absent, use the generic path".
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    /// Stable adapter identifier (e.g. "wikipedia").
    fn name(&self) -> &'static str;

    /// Verify reachability and acquire any resources. Called once at startup.
    async fn initialize(&self) -> Result<()>;

    /// Release resources. Must be idempotent.
    async fn shutdown(&self);

    /// Execute a search query against the backend.
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<RawResults>;

    /// Retrieve a single raw document by its ID.
    async fn fetch_document(&self, doc_id: &str) -> Result<serde_json::Value>;

    /// Map a raw backend result to the standard document format. Pure.
    fn map_to_standard_schema(&self, raw: &serde_json::Value) -> StandardDocument;

    /// Probe backend health.
    async fn health_check(&self) -> AdapterHealth;

    /// Optional paper capability: search returning full academic metadata.
    ///
    /// `Ok(None)` means the capability is not implemented and the engine
    /// should use [`search_and_normalize`](SearchAdapter::search_and_normalize).
    async fn search_papers(
        &self,
        _query: &str,
        _options: &SearchOptions,
    ) -> Result<Option<Vec<PaperInfo>>> {
        Ok(None)
    }

    /// Search and normalize results in one step.
    async fn search_and_normalize(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<StandardDocument>> {
        let raw = self.search(query, options).await?;
        Ok(raw
            .documents
            .iter()
            .map(|doc| self.map_to_standard_schema(doc))
            .collect())
    }
}

/// Construct a built-in adapter by name from its configuration.
///
/// Returns `None` for unknown adapter names (the caller logs and skips).
pub fn build_adapter(name: &str, config: &AdapterConfig) -> Option<Result<Arc<dyn SearchAdapter>>> {
    match name {
        "openalex" => Some(
            openalex::OpenAlexAdapter::from_config(config)
                .map(|a| Arc::new(a) as Arc<dyn SearchAdapter>),
        ),
        "wikipedia" => Some(
            wikipedia::WikipediaAdapter::from_config(config)
                .map(|a| Arc::new(a) as Arc<dyn SearchAdapter>),
        ),
        "meilisearch" => Some(
            meilisearch::MeiliSearchAdapter::from_config(config)
                .map(|a| Arc::new(a) as Arc<dyn SearchAdapter>),
        ),
        "opensearch" => Some(
            opensearch::OpenSearchAdapter::from_config(config)
                .map(|a| Arc::new(a) as Arc<dyn SearchAdapter>),
        ),
        _ => {
            warn!(adapter = name, "Unknown adapter name, no built-in implementation");
            None
        }
    }
}

/// Compute a `from`-date string for an opaque recency filter like
/// "1y", "6m" or "30d". Unknown syntax yields `None`.
pub(crate) fn recency_to_from_date(filter: &str) -> Option<String> {
    let filter = filter.trim();
    let mut chars = filter.chars();
    let unit = chars.next_back()?;
    let amount: i64 = chars.as_str().parse().ok()?;
    let days = match unit {
        'd' => amount,
        'm' => amount * 30,
        'y' => amount * 365,
        _ => return None,
    };
    let from = chrono::Utc::now() - chrono::Duration::days(days);
    Some(from.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recency_to_from_date() {
        assert!(recency_to_from_date("30d").is_some());
        assert!(recency_to_from_date("6m").is_some());
        assert!(recency_to_from_date("1y").is_some());
        assert!(recency_to_from_date("").is_none());
        assert!(recency_to_from_date("soonish").is_none());
        assert!(recency_to_from_date("y").is_none());
    }

    #[test]
    fn test_recency_year_is_before_month() {
        let y = recency_to_from_date("1y").expect("1y");
        let m = recency_to_from_date("1m").expect("1m");
        assert!(y < m);
    }

    #[test]
    fn test_health_constructors() {
        let h = AdapterHealth::healthy(12, "ok");
        assert_eq!(h.status, "healthy");
        assert_eq!(h.latency_ms, 12);
        assert!(h.last_check.is_some());
        let u = AdapterHealth::unhealthy("down");
        assert_eq!(u.status, "unhealthy");
        assert_eq!(u.message.as_deref(), Some("down"));
    }

    #[test]
    fn test_build_adapter_unknown_name() {
        assert!(build_adapter("gopher", &AdapterConfig::default()).is_none());
    }
}
