//! Generic, domain-agnostic search result for verification.
//!
//! Any search result (academic paper, product, news article, document, ...)
//! is represented as a [`ResultItem`] before entering the verification
//! pipeline. Domain-specific adapters produce their own rich types
//! (e.g. [`crate::models::paper::PaperInfo`]) and convert them to
//! `ResultItem` for the verifier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A search result item to be verified against screening criteria.
///
/// Three common fields (`title`, `content`, `source_url`) plus a free-form
/// `fields` map for any additional domain-specific metadata (authors, DOI,
/// tags, price, ...).
///
/// `result_type` controls which prompt template the verifier uses:
/// `"paper"` selects the academic-paper prompt with fixed `<paper_info>`
/// XML fields; any other value selects the generic prompt that renders
/// all entries from `fields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    /// Type of the search result; built-in types: "paper", "generic"
    #[serde(default = "default_result_type")]
    pub result_type: String,
    /// Title or heading of the result
    #[serde(default = "default_na")]
    pub title: String,
    /// Main text body (abstract, description, body text, etc.)
    #[serde(default = "default_na")]
    pub content: String,
    /// Source URL
    #[serde(default = "default_na")]
    pub source_url: String,
    /// Additional domain-specific fields as key-value pairs
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Name of the adapter that produced this item
    #[serde(default)]
    pub source_adapter: String,
}

fn default_result_type() -> String {
    "generic".to_string()
}

fn default_na() -> String {
    "N/A".to_string()
}

impl Default for ResultItem {
    fn default() -> Self {
        Self {
            result_type: default_result_type(),
            title: default_na(),
            content: default_na(),
            source_url: default_na(),
            fields: BTreeMap::new(),
            source_adapter: String::new(),
        }
    }
}

impl ResultItem {
    /// Render this result item as XML for the generic verification prompt.
    ///
    /// Skips empty and "N/A" values so the model only sees real data.
    pub fn to_prompt_xml(&self) -> String {
        let mut parts = vec!["<result_info>".to_string()];
        parts.push(format!("    <title>{}</title>", self.title));
        parts.push(format!("    <content>{}</content>", self.content));
        if !self.source_url.is_empty() && self.source_url != "N/A" {
            parts.push(format!("    <source_url>{}</source_url>", self.source_url));
        }
        for (key, value) in &self.fields {
            if !value.is_empty() && value != "N/A" {
                parts.push(format!("    <{key}>{value}</{key}>"));
            }
        }
        parts.push("</result_info>".to_string());
        parts.join("\n")
    }

    /// Case-insensitive trimmed title, the cross-adapter dedup key.
    pub fn dedup_key(&self) -> String {
        self.title.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_prompt_xml_skips_empty_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("brand".to_string(), "AudioPro".to_string());
        fields.insert("price".to_string(), String::new());
        fields.insert("stock".to_string(), "N/A".to_string());

        let item = ResultItem {
            result_type: "generic".into(),
            title: "Wireless Headphones".into(),
            content: "Premium over-ear headphones".into(),
            source_url: "https://shop.example.com/123".into(),
            fields,
            source_adapter: "shop".into(),
        };

        let xml = item.to_prompt_xml();
        assert!(xml.starts_with("<result_info>"));
        assert!(xml.contains("<title>Wireless Headphones</title>"));
        assert!(xml.contains("<brand>AudioPro</brand>"));
        assert!(xml.contains("<source_url>https://shop.example.com/123</source_url>"));
        assert!(!xml.contains("<price>"));
        assert!(!xml.contains("<stock>"));
    }

    #[test]
    fn test_to_prompt_xml_omits_na_url() {
        let item = ResultItem {
            title: "T".into(),
            content: "C".into(),
            ..Default::default()
        };
        assert!(!item.to_prompt_xml().contains("<source_url>"));
    }

    #[test]
    fn test_dedup_key_normalizes() {
        let item = ResultItem {
            title: "  Deep Learning For Solar  ".into(),
            ..Default::default()
        };
        assert_eq!(item.dedup_key(), "deep learning for solar");
    }
}
