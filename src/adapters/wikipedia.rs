//! Wikipedia adapter - article search via the MediaWiki Action API.
//!
//! Uses `action=query&list=search` to find matching articles and returns
//! their snippets as search results for the verification pipeline. Supports
//! multi-language wikis through the configured language code.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::adapters::{AdapterHealth, RawResults, SearchAdapter};
use crate::config::AdapterConfig;
use crate::error::{Result, SiftError};
use crate::models::{DocumentMetadata, SearchOptions, StandardDocument};

const USER_AGENT: &str = "opensift/0.1 (https://github.com/opensift/opensift)";

/// Search adapter for Wikipedia.
pub struct WikipediaAdapter {
    language: String,
    max_chars: usize,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchApiResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    searchinfo: Option<SearchInfo>,
    #[serde(default)]
    search: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SearchInfo {
    #[serde(default)]
    totalhits: u64,
}

impl WikipediaAdapter {
    pub fn new(language: String, max_chars: usize) -> Result<Self> {
        if language.is_empty() || !language.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SiftError::AdapterConfig(format!(
                "Invalid Wikipedia language code: {language:?}"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SiftError::AdapterConfig(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            language,
            max_chars,
            client,
        })
    }

    /// The language code comes from `index_pattern` ("*" means English).
    pub fn from_config(config: &AdapterConfig) -> Result<Self> {
        let language = if config.index_pattern.is_empty() || config.index_pattern == "*" {
            "en".to_string()
        } else {
            config.index_pattern.clone()
        };
        let max_chars = config
            .extra
            .get("max_chars")
            .and_then(|v| v.as_u64())
            .unwrap_or(2000) as usize;
        Self::new(language, max_chars)
    }

    fn api_url(&self) -> String {
        format!("https://{}.wikipedia.org/w/api.php", self.language)
    }

    async fn api_get(&self, params: &[(&str, &str)]) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(self.api_url())
            .query(params)
            .send()
            .await
            .map_err(|e| SiftError::AdapterConnect(format!("Wikipedia request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SiftError::AdapterQuery(format!(
                "Wikipedia API error ({status})"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| SiftError::AdapterQuery(format!("Failed to parse Wikipedia response: {e}")))
    }
}

#[async_trait]
impl SearchAdapter for WikipediaAdapter {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    async fn initialize(&self) -> Result<()> {
        self.api_get(&[
            ("action", "query"),
            ("meta", "siteinfo"),
            ("format", "json"),
        ])
        .await
        .map_err(|e| SiftError::AdapterConnect(format!("Wikipedia unreachable: {e}")))?;
        info!(language = %self.language, "Wikipedia adapter initialized");
        Ok(())
    }

    async fn shutdown(&self) {}

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<RawResults> {
        let limit = options.max_results.to_string();
        debug!(query = query, limit = %limit, language = %self.language, "Wikipedia search");

        let start = Instant::now();
        let value = self
            .api_get(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", &limit),
                ("srprop", "snippet|timestamp|wordcount"),
                ("format", "json"),
            ])
            .await?;
        let took_ms = start.elapsed().as_millis() as u64;

        let parsed: SearchApiResponse = serde_json::from_value(value)
            .map_err(|e| SiftError::AdapterQuery(format!("Unexpected search response: {e}")))?;
        let query_block = parsed.query.unwrap_or(SearchQuery {
            searchinfo: None,
            search: Vec::new(),
        });

        Ok(RawResults {
            total_hits: query_block
                .searchinfo
                .map(|s| s.totalhits)
                .unwrap_or(query_block.search.len() as u64),
            documents: query_block.search,
            metadata: Default::default(),
            took_ms,
        })
    }

    async fn fetch_document(&self, doc_id: &str) -> Result<serde_json::Value> {
        let value = self
            .api_get(&[
                ("action", "query"),
                ("pageids", doc_id),
                ("prop", "extracts|info"),
                ("explaintext", "1"),
                ("inprop", "url"),
                ("format", "json"),
            ])
            .await?;

        let page = value
            .pointer(&format!("/query/pages/{doc_id}"))
            .cloned()
            .ok_or_else(|| SiftError::DocumentNotFound(doc_id.to_string()))?;
        if page.get("missing").is_some() {
            return Err(SiftError::DocumentNotFound(doc_id.to_string()));
        }
        Ok(page)
    }

    fn map_to_standard_schema(&self, raw: &serde_json::Value) -> StandardDocument {
        let title = raw
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Untitled")
            .to_string();
        let snippet_html = raw.get("snippet").and_then(|v| v.as_str()).unwrap_or("");
        let content: String = strip_html_tags(snippet_html)
            .chars()
            .take(self.max_chars)
            .collect();
        let page_id = raw
            .get("pageid")
            .and_then(|v| v.as_u64())
            .map(|id| id.to_string())
            .unwrap_or_default();

        let url = format!(
            "https://{}.wikipedia.org/wiki/{}",
            self.language,
            urlencoding::encode(&title.replace(' ', "_"))
        );

        let published_date = raw
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&chrono::Utc));

        let mut metadata = DocumentMetadata {
            source: format!("wikipedia-{}", self.language),
            url: Some(url),
            published_date,
            language: Some(self.language.clone()),
            ..Default::default()
        };
        if let Some(wordcount) = raw.get("wordcount").and_then(|v| v.as_u64()) {
            metadata
                .extra
                .insert("wordcount".to_string(), serde_json::json!(wordcount));
        }

        StandardDocument {
            id: page_id,
            title,
            content: content.clone(),
            snippet: Some(content),
            score: 0.0,
            metadata,
            retrieved_at: chrono::Utc::now(),
        }
    }

    async fn health_check(&self) -> AdapterHealth {
        let start = Instant::now();
        match self
            .api_get(&[
                ("action", "query"),
                ("meta", "siteinfo"),
                ("format", "json"),
            ])
            .await
        {
            Ok(_) => AdapterHealth::healthy(
                start.elapsed().as_millis() as u64,
                format!("{}.wikipedia.org", self.language),
            ),
            Err(e) => AdapterHealth::unhealthy(e.to_string()),
        }
    }
}

/// Strip HTML markup from a search snippet.
fn strip_html_tags(text: &str) -> String {
    match Regex::new(r"<[^>]+>") {
        Ok(re) => re.replace_all(text, "").replace("&quot;", "\""),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> WikipediaAdapter {
        WikipediaAdapter::new("en".to_string(), 2000).expect("adapter")
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(
            strip_html_tags(r#"<span class="searchmatch">solar</span> power"#),
            "solar power"
        );
        assert_eq!(strip_html_tags("no tags"), "no tags");
    }

    #[test]
    fn test_invalid_language_rejected() {
        assert!(WikipediaAdapter::new("en wiki".to_string(), 100).is_err());
        assert!(WikipediaAdapter::new(String::new(), 100).is_err());
    }

    #[test]
    fn test_from_config_language_from_index_pattern() {
        let config = AdapterConfig {
            index_pattern: "de".to_string(),
            ..Default::default()
        };
        let adapter = WikipediaAdapter::from_config(&config).expect("adapter");
        assert_eq!(adapter.language, "de");

        let config = AdapterConfig::default();
        // The "*" default index pattern maps to English
        let adapter = WikipediaAdapter::from_config(&config).expect("adapter");
        assert_eq!(adapter.language, "en");
    }

    #[test]
    fn test_map_to_standard_schema() {
        let raw = serde_json::json!({
            "pageid": 12345,
            "title": "Solar power",
            "snippet": "<span class=\"searchmatch\">Solar</span> power is energy",
            "timestamp": "2024-05-01T12:00:00Z",
            "wordcount": 4200,
        });
        let doc = adapter().map_to_standard_schema(&raw);
        assert_eq!(doc.id, "12345");
        assert_eq!(doc.title, "Solar power");
        assert_eq!(doc.content, "Solar power is energy");
        assert_eq!(doc.metadata.source, "wikipedia-en");
        assert_eq!(
            doc.metadata.url.as_deref(),
            Some("https://en.wikipedia.org/wiki/Solar_power")
        );
        assert!(doc.metadata.published_date.is_some());
        assert_eq!(doc.metadata.extra["wordcount"], 4200);
    }

    #[test]
    fn test_map_to_standard_schema_truncates_content() {
        let long = "x".repeat(5000);
        let raw = serde_json::json!({"pageid": 1, "title": "T", "snippet": long});
        let adapter = WikipediaAdapter::new("en".to_string(), 100).expect("adapter");
        let doc = adapter.map_to_standard_schema(&raw);
        assert_eq!(doc.content.len(), 100);
    }
}
