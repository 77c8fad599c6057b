//! OpenSearch adapter - REST connector for an OpenSearch/Elasticsearch-style
//! cluster.
//!
//! Uses the `_search` endpoint with a `multi_match` query over title and
//! content fields. Basic auth is supported for secured clusters.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::adapters::{AdapterHealth, RawResults, SearchAdapter};
use crate::config::AdapterConfig;
use crate::error::{Result, SiftError};
use crate::models::{DocumentMetadata, SearchOptions, StandardDocument};

/// Search adapter for OpenSearch.
pub struct OpenSearchAdapter {
    base_url: String,
    index_pattern: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    took: u64,
    hits: Option<HitsBlock>,
}

#[derive(Debug, Deserialize)]
struct HitsBlock {
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TotalHits {
    #[serde(default)]
    value: u64,
}

#[derive(Debug, Deserialize)]
struct ClusterHealth {
    #[serde(default)]
    status: String,
}

impl OpenSearchAdapter {
    pub fn new(
        base_url: String,
        index_pattern: String,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SiftError::AdapterConfig(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            index_pattern: if index_pattern.is_empty() {
                "*".to_string()
            } else {
                index_pattern
            },
            username,
            password,
            client,
        })
    }

    pub fn from_config(config: &AdapterConfig) -> Result<Self> {
        let base_url = config.hosts.first().cloned().ok_or_else(|| {
            SiftError::AdapterConfig(
                "OpenSearch requires at least one host URL (search.adapters.opensearch.hosts)"
                    .into(),
            )
        })?;
        Self::new(
            base_url,
            config.index_pattern.clone(),
            config.username.clone(),
            config.password.clone(),
        )
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_deref());
        }
        builder
    }
}

#[async_trait]
impl SearchAdapter for OpenSearchAdapter {
    fn name(&self) -> &'static str {
        "opensearch"
    }

    async fn initialize(&self) -> Result<()> {
        let response = self
            .request(reqwest::Method::GET, "/_cluster/health")
            .send()
            .await
            .map_err(|e| SiftError::AdapterConnect(format!("OpenSearch unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(SiftError::AdapterConnect(format!(
                "OpenSearch health probe failed ({})",
                response.status()
            )));
        }
        info!(base_url = %self.base_url, index_pattern = %self.index_pattern, "OpenSearch adapter initialized");
        Ok(())
    }

    async fn shutdown(&self) {}

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<RawResults> {
        debug!(query = query, index_pattern = %self.index_pattern, "OpenSearch search");
        let body = serde_json::json!({
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": ["title^2", "content", "body", "description"],
                }
            },
            "size": options.max_results,
        });

        let start = Instant::now();
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/{}/_search", self.index_pattern),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| SiftError::AdapterConnect(format!("OpenSearch request failed: {e}")))?;
        let took_ms = start.elapsed().as_millis() as u64;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SiftError::AdapterQuery(format!(
                "OpenSearch query error ({status}): {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: SearchBody = response
            .json()
            .await
            .map_err(|e| SiftError::AdapterQuery(format!("Bad OpenSearch response: {e}")))?;
        let hits = parsed.hits.map(|h| (h.total, h.hits)).unwrap_or_default();

        Ok(RawResults {
            total_hits: hits.0.map(|t| t.value).unwrap_or(hits.1.len() as u64),
            documents: hits.1,
            metadata: [("backend_took_ms".to_string(), serde_json::json!(parsed.took))]
                .into_iter()
                .collect(),
            took_ms,
        })
    }

    async fn fetch_document(&self, doc_id: &str) -> Result<serde_json::Value> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/{}/_doc/{}", self.index_pattern, doc_id),
            )
            .send()
            .await
            .map_err(|e| SiftError::AdapterConnect(format!("OpenSearch request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SiftError::DocumentNotFound(doc_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(SiftError::AdapterQuery(format!(
                "OpenSearch document error ({})",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| SiftError::AdapterQuery(format!("Bad OpenSearch document: {e}")))
    }

    fn map_to_standard_schema(&self, raw: &serde_json::Value) -> StandardDocument {
        let source = raw.get("_source").cloned().unwrap_or_default();
        let get_str = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| source.get(*k).and_then(|v| v.as_str()))
                .map(str::to_string)
        };

        let title = get_str(&["title", "name"]).unwrap_or_else(|| "Untitled".to_string());
        let content = get_str(&["content", "body", "description", "text"]).unwrap_or_default();

        let published_date = source
            .get("published_date")
            .or_else(|| source.get("date"))
            .and_then(|v| v.as_str())
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&chrono::Utc));

        let mut metadata = DocumentMetadata {
            source: raw
                .get("_index")
                .and_then(|v| v.as_str())
                .unwrap_or(&self.index_pattern)
                .to_string(),
            url: get_str(&["url", "link"]),
            published_date,
            author: get_str(&["author"]),
            language: get_str(&["language"]),
            ..Default::default()
        };
        if let Some(tags) = source.get("tags").and_then(|v| v.as_array()) {
            metadata.tags = tags
                .iter()
                .filter_map(|t| t.as_str())
                .map(str::to_string)
                .collect();
        }

        StandardDocument {
            id: raw
                .get("_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            title,
            content: content.clone(),
            snippet: (!content.is_empty()).then(|| content.chars().take(200).collect()),
            score: raw.get("_score").and_then(|v| v.as_f64()).unwrap_or(0.0),
            metadata,
            retrieved_at: chrono::Utc::now(),
        }
    }

    async fn health_check(&self) -> AdapterHealth {
        let start = Instant::now();
        match self
            .request(reqwest::Method::GET, "/_cluster/health")
            .send()
            .await
        {
            Ok(response) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                match response.json::<ClusterHealth>().await {
                    Ok(h) if h.status == "green" || h.status == "yellow" => {
                        AdapterHealth::healthy(latency_ms, format!("cluster: {}", h.status))
                    }
                    Ok(h) => AdapterHealth::degraded(latency_ms, format!("cluster: {}", h.status)),
                    Err(e) => AdapterHealth::degraded(latency_ms, e.to_string()),
                }
            }
            Err(e) => AdapterHealth::unhealthy(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> OpenSearchAdapter {
        OpenSearchAdapter::new(
            "http://localhost:9200".to_string(),
            "docs-*".to_string(),
            None,
            None,
        )
        .expect("adapter")
    }

    #[test]
    fn test_from_config_requires_host() {
        assert!(OpenSearchAdapter::from_config(&AdapterConfig::default()).is_err());
        let config = AdapterConfig {
            hosts: vec!["http://localhost:9200".into()],
            ..Default::default()
        };
        assert!(OpenSearchAdapter::from_config(&config).is_ok());
    }

    #[test]
    fn test_map_to_standard_schema_hit() {
        let raw = serde_json::json!({
            "_id": "a1",
            "_index": "docs-2024",
            "_score": 3.2,
            "_source": {
                "title": "Offshore wind",
                "content": "Turbine siting in the North Sea",
                "url": "https://example.com/wind",
                "author": "N. Vestas",
                "tags": ["wind", "offshore"],
                "published_date": "2024-01-15T00:00:00Z",
            },
        });
        let doc = adapter().map_to_standard_schema(&raw);
        assert_eq!(doc.id, "a1");
        assert_eq!(doc.title, "Offshore wind");
        assert_eq!(doc.score, 3.2);
        assert_eq!(doc.metadata.source, "docs-2024");
        assert_eq!(doc.metadata.author.as_deref(), Some("N. Vestas"));
        assert_eq!(doc.metadata.tags.len(), 2);
        assert!(doc.metadata.published_date.is_some());
    }

    #[test]
    fn test_map_to_standard_schema_empty_hit() {
        let doc = adapter().map_to_standard_schema(&serde_json::json!({}));
        assert_eq!(doc.title, "Untitled");
        assert_eq!(doc.id, "");
        assert_eq!(doc.metadata.source, "docs-*");
    }
}
