//! Generic schema for search adapter results.
//!
//! Adapters that do not provide a direct paper path map their raw results
//! to this intermediate format; the engine then projects it onto a
//! [`ResultItem`](crate::models::result::ResultItem) for verification.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata associated with a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Source identifier (e.g. index name, collection)
    #[serde(default)]
    pub source: String,
    /// Original document URL
    #[serde(default)]
    pub url: Option<String>,
    /// Document publication date
    #[serde(default)]
    pub published_date: Option<DateTime<Utc>>,
    /// Document author
    #[serde(default)]
    pub author: Option<String>,
    /// Document language code (ISO 639-1)
    #[serde(default)]
    pub language: Option<String>,
    /// Associated tags or categories
    #[serde(default)]
    pub tags: Vec<String>,
    /// Additional adapter-specific metadata
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Normalized document format used across all adapters.
///
/// Every search adapter maps its raw results to this standard schema,
/// ensuring consistent processing in the engine pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardDocument {
    /// Unique document identifier
    pub id: String,
    /// Document title
    pub title: String,
    /// Full document content or relevant excerpt
    pub content: String,
    /// Short highlighted snippet
    #[serde(default)]
    pub snippet: Option<String>,
    /// Relevance score from the search backend
    #[serde(default)]
    pub score: f64,
    /// Document metadata
    #[serde(default)]
    pub metadata: DocumentMetadata,
    /// Timestamp of retrieval
    #[serde(default = "Utc::now")]
    pub retrieved_at: DateTime<Utc>,
}

impl StandardDocument {
    /// Minimal constructor; metadata and timestamps filled with defaults.
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            snippet: None,
            score: 0.0,
            metadata: DocumentMetadata::default(),
            retrieved_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fills_defaults() {
        let doc = StandardDocument::new("1", "Title", "Body");
        assert_eq!(doc.id, "1");
        assert!(doc.snippet.is_none());
        assert_eq!(doc.score, 0.0);
        assert!(doc.metadata.tags.is_empty());
    }
}
