//! MeiliSearch adapter - REST connector for a MeiliSearch instance.
//!
//! Talks to the `/indexes/{index}/search` endpoint over HTTP. Documents in
//! the index are free-form; common field names (title, content, description,
//! body) are used for the normalized projection and everything else lands in
//! metadata extra.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::adapters::{AdapterHealth, RawResults, SearchAdapter};
use crate::config::AdapterConfig;
use crate::error::{Result, SiftError};
use crate::models::{DocumentMetadata, SearchOptions, StandardDocument};

/// Search adapter for MeiliSearch.
pub struct MeiliSearchAdapter {
    base_url: String,
    index: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MeiliSearchResponse {
    #[serde(default)]
    hits: Vec<serde_json::Value>,
    #[serde(default, rename = "estimatedTotalHits")]
    estimated_total_hits: Option<u64>,
    #[serde(default, rename = "processingTimeMs")]
    processing_time_ms: u64,
}

#[derive(Debug, Deserialize)]
struct MeiliHealth {
    #[serde(default)]
    status: String,
}

impl MeiliSearchAdapter {
    pub fn new(base_url: String, index: String, api_key: Option<String>) -> Result<Self> {
        if index.is_empty() {
            return Err(SiftError::AdapterConfig(
                "MeiliSearch index name must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SiftError::AdapterConfig(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            index,
            api_key,
            client,
        })
    }

    pub fn from_config(config: &AdapterConfig) -> Result<Self> {
        let base_url = config
            .hosts
            .first()
            .cloned()
            .unwrap_or_else(|| "http://localhost:7700".to_string());
        let index = if config.index_pattern.is_empty() || config.index_pattern == "*" {
            "documents".to_string()
        } else {
            config.index_pattern.clone()
        };
        Self::new(base_url, index, config.api_key.clone())
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }
}

#[async_trait]
impl SearchAdapter for MeiliSearchAdapter {
    fn name(&self) -> &'static str {
        "meilisearch"
    }

    async fn initialize(&self) -> Result<()> {
        let response = self
            .request(reqwest::Method::GET, "/health")
            .send()
            .await
            .map_err(|e| SiftError::AdapterConnect(format!("MeiliSearch unreachable: {e}")))?;
        let health: MeiliHealth = response
            .json()
            .await
            .map_err(|e| SiftError::AdapterConnect(format!("Bad MeiliSearch health body: {e}")))?;
        if health.status != "available" {
            return Err(SiftError::AdapterConnect(format!(
                "MeiliSearch not available: {}",
                health.status
            )));
        }
        info!(base_url = %self.base_url, index = %self.index, "MeiliSearch adapter initialized");
        Ok(())
    }

    async fn shutdown(&self) {}

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<RawResults> {
        debug!(query = query, index = %self.index, "MeiliSearch search");
        let body = serde_json::json!({
            "q": query,
            "limit": options.max_results,
        });

        let start = Instant::now();
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/indexes/{}/search", self.index),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| SiftError::AdapterConnect(format!("MeiliSearch request failed: {e}")))?;
        let took_ms = start.elapsed().as_millis() as u64;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SiftError::AdapterQuery(format!(
                "MeiliSearch search error ({status}): {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: MeiliSearchResponse = response
            .json()
            .await
            .map_err(|e| SiftError::AdapterQuery(format!("Bad MeiliSearch response: {e}")))?;

        Ok(RawResults {
            total_hits: parsed
                .estimated_total_hits
                .unwrap_or(parsed.hits.len() as u64),
            documents: parsed.hits,
            metadata: [(
                "processing_time_ms".to_string(),
                serde_json::json!(parsed.processing_time_ms),
            )]
            .into_iter()
            .collect(),
            took_ms,
        })
    }

    async fn fetch_document(&self, doc_id: &str) -> Result<serde_json::Value> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/indexes/{}/documents/{}", self.index, doc_id),
            )
            .send()
            .await
            .map_err(|e| SiftError::AdapterConnect(format!("MeiliSearch request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SiftError::DocumentNotFound(doc_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(SiftError::AdapterQuery(format!(
                "MeiliSearch document error ({})",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| SiftError::AdapterQuery(format!("Bad MeiliSearch document: {e}")))
    }

    fn map_to_standard_schema(&self, raw: &serde_json::Value) -> StandardDocument {
        let get_str = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| raw.get(*k).and_then(|v| v.as_str()))
                .map(str::to_string)
        };

        let title = get_str(&["title", "name", "heading"]).unwrap_or_else(|| "Untitled".to_string());
        let content =
            get_str(&["content", "description", "body", "text"]).unwrap_or_default();

        let mut metadata = DocumentMetadata {
            source: format!("meilisearch/{}", self.index),
            url: get_str(&["url", "link"]),
            author: get_str(&["author"]),
            ..Default::default()
        };
        if let Some(tags) = raw.get("tags").and_then(|v| v.as_array()) {
            metadata.tags = tags
                .iter()
                .filter_map(|t| t.as_str())
                .map(str::to_string)
                .collect();
        }
        // Everything not already projected is preserved as extra metadata
        if let Some(obj) = raw.as_object() {
            let known = [
                "id", "title", "name", "heading", "content", "description", "body", "text",
                "url", "link", "author", "tags",
            ];
            for (k, v) in obj {
                if !known.contains(&k.as_str()) {
                    metadata.extra.insert(k.clone(), v.clone());
                }
            }
        }

        StandardDocument {
            id: raw
                .get("id")
                .map(|v| match v.as_str() {
                    Some(s) => s.to_string(),
                    None => v.to_string(),
                })
                .unwrap_or_default(),
            title,
            content: content.clone(),
            snippet: (!content.is_empty()).then(|| content.chars().take(200).collect()),
            score: raw
                .get("_rankingScore")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            metadata,
            retrieved_at: chrono::Utc::now(),
        }
    }

    async fn health_check(&self) -> AdapterHealth {
        let start = Instant::now();
        match self.request(reqwest::Method::GET, "/health").send().await {
            Ok(response) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                match response.json::<MeiliHealth>().await {
                    Ok(h) if h.status == "available" => {
                        AdapterHealth::healthy(latency_ms, format!("index: {}", self.index))
                    }
                    Ok(h) => AdapterHealth::degraded(latency_ms, format!("status: {}", h.status)),
                    Err(e) => AdapterHealth::degraded(latency_ms, e.to_string()),
                }
            }
            Err(e) => AdapterHealth::unhealthy(e.to_string()),
        }
    }
}
