//! OpenAlex adapter - academic paper search via the OpenAlex works API.
//!
//! OpenAlex returns DOIs and full bibliographic metadata directly, so this
//! adapter implements the paper capability (`search_papers`) and bypasses
//! the lossy generic schema in the engine pipeline.
//!
//! API notes (per OpenAlex docs):
//! - Use the `mailto` parameter for polite-pool rates (10 req/s vs 1 req/s)
//! - Abstracts are delivered as an inverted index and must be reconstructed

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::adapters::{recency_to_from_date, AdapterHealth, RawResults, SearchAdapter};
use crate::config::AdapterConfig;
use crate::error::{Result, SiftError};
use crate::models::{DocumentMetadata, PaperInfo, SearchOptions, StandardDocument};

/// Public OpenAlex API base URL
const DEFAULT_BASE_URL: &str = "https://api.openalex.org";

/// Email for polite pool access
const DEFAULT_MAILTO: &str = "opensift@example.com";

/// Search adapter for the OpenAlex scholarly works API.
pub struct OpenAlexAdapter {
    base_url: String,
    mailto: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    meta: Option<WorksMeta>,
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WorksMeta {
    #[serde(default)]
    count: u64,
}

impl OpenAlexAdapter {
    pub fn new(base_url: String, mailto: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("opensift/0.1 (mailto:{mailto})"))
            .build()
            .map_err(|e| SiftError::AdapterConfig(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            mailto,
            client,
        })
    }

    pub fn from_config(config: &AdapterConfig) -> Result<Self> {
        let base_url = config
            .hosts
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mailto = config
            .extra
            .get("mailto")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_MAILTO)
            .to_string();
        Self::new(base_url, mailto, Duration::from_secs(30))
    }

    fn works_url(&self, query: &str, options: &SearchOptions) -> String {
        let mut url = format!(
            "{}/works?search={}&per-page={}&mailto={}",
            self.base_url,
            urlencoding::encode(query),
            options.max_results,
            self.mailto
        );

        if let Some(filter) = options
            .recency_filter
            .as_deref()
            .and_then(recency_to_from_date)
        {
            url.push_str(&format!("&filter=from_publication_date:{filter}"));
        }

        url
    }

    async fn fetch_works(&self, url: &str) -> Result<WorksResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SiftError::AdapterConnect(format!("OpenAlex request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SiftError::AdapterQuery(format!(
                "OpenAlex API error ({status}): {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SiftError::AdapterQuery(format!("Failed to parse OpenAlex response: {e}")))
    }
}

#[async_trait]
impl SearchAdapter for OpenAlexAdapter {
    fn name(&self) -> &'static str {
        "openalex"
    }

    async fn initialize(&self) -> Result<()> {
        // Lightweight reachability probe
        let url = format!("{}/works?per-page=1&mailto={}", self.base_url, self.mailto);
        self.fetch_works(&url)
            .await
            .map_err(|e| SiftError::AdapterConnect(format!("OpenAlex unreachable: {e}")))?;
        info!(base_url = %self.base_url, "OpenAlex adapter initialized");
        Ok(())
    }

    async fn shutdown(&self) {
        // No persistent connections beyond the client pool
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<RawResults> {
        let url = self.works_url(query, options);
        debug!(url = %url, "OpenAlex search");

        let start = Instant::now();
        let response = self.fetch_works(&url).await?;
        let took_ms = start.elapsed().as_millis() as u64;

        Ok(RawResults {
            total_hits: response.meta.map(|m| m.count).unwrap_or(response.results.len() as u64),
            documents: response.results,
            metadata: Default::default(),
            took_ms,
        })
    }

    async fn fetch_document(&self, doc_id: &str) -> Result<serde_json::Value> {
        let url = format!(
            "{}/works/{}?mailto={}",
            self.base_url,
            urlencoding::encode(doc_id),
            self.mailto
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SiftError::AdapterConnect(format!("OpenAlex request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SiftError::DocumentNotFound(doc_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(SiftError::AdapterQuery(format!(
                "OpenAlex API error ({})",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| SiftError::AdapterQuery(format!("Failed to parse work: {e}")))
    }

    fn map_to_standard_schema(&self, raw: &serde_json::Value) -> StandardDocument {
        let title = raw
            .get("display_name")
            .or_else(|| raw.get("title"))
            .and_then(|v| v.as_str())
            .unwrap_or("Untitled")
            .to_string();
        let abstract_text = raw
            .get("abstract_inverted_index")
            .map(reconstruct_abstract)
            .unwrap_or_default();
        let snippet = (!abstract_text.is_empty())
            .then(|| abstract_text.chars().take(200).collect::<String>());

        let mut metadata = DocumentMetadata {
            source: "openalex".to_string(),
            url: landing_page_url(raw),
            author: Some(author_list(raw)).filter(|a| !a.is_empty()),
            language: raw
                .get("language")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            ..Default::default()
        };
        if let Some(doi) = raw.get("doi").and_then(|v| v.as_str()) {
            metadata
                .extra
                .insert("doi".to_string(), serde_json::Value::String(doi.to_string()));
        }
        if let Some(count) = raw.get("cited_by_count").and_then(|v| v.as_i64()) {
            metadata
                .extra
                .insert("citation_count".to_string(), serde_json::json!(count));
        }

        StandardDocument {
            id: raw
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            title,
            content: abstract_text,
            snippet,
            score: raw
                .get("relevance_score")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            metadata,
            retrieved_at: chrono::Utc::now(),
        }
    }

    async fn search_papers(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Option<Vec<PaperInfo>>> {
        let raw = self.search(query, options).await?;
        let papers = raw.documents.iter().map(work_to_paper).collect();
        Ok(Some(papers))
    }

    async fn health_check(&self) -> AdapterHealth {
        let url = format!("{}/works?per-page=1&mailto={}", self.base_url, self.mailto);
        let start = Instant::now();
        match self.client.get(&url).send().await {
            Ok(response) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                if response.status().is_success() {
                    AdapterHealth::healthy(latency_ms, self.base_url.clone())
                } else {
                    AdapterHealth::degraded(latency_ms, format!("HTTP {}", response.status()))
                }
            }
            Err(e) => AdapterHealth::unhealthy(e.to_string()),
        }
    }
}

/// Map an OpenAlex work to the zero-loss academic schema.
fn work_to_paper(raw: &serde_json::Value) -> PaperInfo {
    let str_or_na = |v: Option<&serde_json::Value>| {
        v.and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("N/A")
            .to_string()
    };

    let venue = raw
        .pointer("/primary_location/source/display_name")
        .and_then(|v| v.as_str())
        .unwrap_or("N/A")
        .to_string();
    let venue_type = raw
        .pointer("/primary_location/source/type")
        .and_then(|v| v.as_str())
        .unwrap_or("N/A")
        .to_string();

    let research_field = raw
        .pointer("/primary_topic/display_name")
        .and_then(|v| v.as_str())
        .unwrap_or("N/A")
        .to_string();

    let abstract_text = raw
        .get("abstract_inverted_index")
        .map(reconstruct_abstract)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "N/A".to_string());

    let authors = author_list(raw);

    PaperInfo {
        title: str_or_na(raw.get("display_name").or_else(|| raw.get("title"))),
        authors: if authors.is_empty() {
            "N/A".to_string()
        } else {
            authors
        },
        affiliations: "N/A".to_string(),
        conference_journal: venue,
        conference_journal_type: venue_type,
        research_field,
        doi: str_or_na(raw.get("doi")),
        publication_date: str_or_na(raw.get("publication_date")),
        abstract_text,
        citation_count: raw.get("cited_by_count").and_then(|v| v.as_i64()).unwrap_or(0),
        source_url: landing_page_url(raw).unwrap_or_else(|| "N/A".to_string()),
    }
}

/// First three author display names, "..."-suffixed when more exist.
fn author_list(raw: &serde_json::Value) -> String {
    let Some(authorships) = raw.get("authorships").and_then(|v| v.as_array()) else {
        return String::new();
    };
    let names: Vec<&str> = authorships
        .iter()
        .filter_map(|a| a.pointer("/author/display_name").and_then(|v| v.as_str()))
        .take(3)
        .collect();
    let mut joined = names.join(", ");
    if authorships.len() > 3 && !joined.is_empty() {
        joined.push_str(" ...");
    }
    joined
}

fn landing_page_url(raw: &serde_json::Value) -> Option<String> {
    raw.pointer("/primary_location/landing_page_url")
        .or_else(|| raw.pointer("/best_oa_location/landing_page_url"))
        .or_else(|| raw.pointer("/open_access/oa_url"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Reconstruct abstract text from the inverted index OpenAlex delivers.
fn reconstruct_abstract(inverted_index: &serde_json::Value) -> String {
    let Some(obj) = inverted_index.as_object() else {
        return String::new();
    };

    let mut words: Vec<(i64, &str)> = Vec::new();
    for (word, positions) in obj {
        if let Some(pos_array) = positions.as_array() {
            for pos in pos_array {
                if let Some(p) = pos.as_i64() {
                    words.push((p, word.as_str()));
                }
            }
        }
    }

    words.sort_by_key(|(pos, _)| *pos);
    words
        .iter()
        .map(|(_, w)| *w)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_work() -> serde_json::Value {
        serde_json::json!({
            "id": "https://openalex.org/W123",
            "display_name": "Deep Learning for Solar Nowcasting",
            "doi": "https://doi.org/10.1016/x",
            "publication_date": "2024-03-01",
            "cited_by_count": 42,
            "language": "en",
            "abstract_inverted_index": {
                "We": [0], "propose": [1], "a": [2], "framework": [3]
            },
            "authorships": [
                {"author": {"display_name": "Jane Doe"}},
                {"author": {"display_name": "John Smith"}},
                {"author": {"display_name": "Ada Lovelace"}},
                {"author": {"display_name": "Alan Turing"}},
            ],
            "primary_location": {
                "landing_page_url": "https://example.org/paper",
                "source": {"display_name": "Solar Energy", "type": "journal"}
            },
            "primary_topic": {"display_name": "Photovoltaics"},
        })
    }

    #[test]
    fn test_reconstruct_abstract_orders_by_position() {
        let idx = serde_json::json!({"world": [1], "hello": [0], "again": [2, 3]});
        assert_eq!(reconstruct_abstract(&idx), "hello world again again");
        assert_eq!(reconstruct_abstract(&serde_json::json!(null)), "");
    }

    #[test]
    fn test_work_to_paper() {
        let paper = work_to_paper(&sample_work());
        assert_eq!(paper.title, "Deep Learning for Solar Nowcasting");
        assert_eq!(paper.authors, "Jane Doe, John Smith, Ada Lovelace ...");
        assert_eq!(paper.conference_journal, "Solar Energy");
        assert_eq!(paper.conference_journal_type, "journal");
        assert_eq!(paper.research_field, "Photovoltaics");
        assert_eq!(paper.doi, "https://doi.org/10.1016/x");
        assert_eq!(paper.citation_count, 42);
        assert_eq!(paper.abstract_text, "We propose a framework");
        assert_eq!(paper.source_url, "https://example.org/paper");
    }

    #[test]
    fn test_work_to_paper_sparse() {
        let paper = work_to_paper(&serde_json::json!({"title": "Only a title"}));
        assert_eq!(paper.title, "Only a title");
        assert_eq!(paper.authors, "N/A");
        assert_eq!(paper.doi, "N/A");
        assert_eq!(paper.abstract_text, "N/A");
        assert_eq!(paper.citation_count, 0);
        assert_eq!(paper.source_url, "N/A");
    }

    #[test]
    fn test_map_to_standard_schema() {
        let adapter = OpenAlexAdapter::new(
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_MAILTO.to_string(),
            Duration::from_secs(5),
        )
        .expect("adapter");
        let doc = adapter.map_to_standard_schema(&sample_work());
        assert_eq!(doc.id, "https://openalex.org/W123");
        assert_eq!(doc.title, "Deep Learning for Solar Nowcasting");
        assert_eq!(doc.content, "We propose a framework");
        assert_eq!(doc.metadata.source, "openalex");
        assert_eq!(doc.metadata.url.as_deref(), Some("https://example.org/paper"));
        assert_eq!(doc.metadata.extra["citation_count"], 42);
    }

    #[test]
    fn test_works_url_includes_recency_filter() {
        let adapter = OpenAlexAdapter::new(
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_MAILTO.to_string(),
            Duration::from_secs(5),
        )
        .expect("adapter");
        let options = SearchOptions {
            max_results: 5,
            recency_filter: Some("1y".to_string()),
            ..Default::default()
        };
        let url = adapter.works_url("machine learning", &options);
        assert!(url.contains("search=machine%20learning"));
        assert!(url.contains("per-page=5"));
        assert!(url.contains("filter=from_publication_date:"));

        let no_filter = adapter.works_url("q", &SearchOptions::default());
        assert!(!no_filter.contains("filter="));
    }
}
