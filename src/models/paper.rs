//! Academic paper metadata (domain-specific search result).
//!
//! [`PaperInfo`] is the rich, academic-specific schema returned by scholarly
//! search adapters. It converts to the generic
//! [`ResultItem`](crate::models::result::ResultItem) via
//! [`PaperInfo::to_result_item`] before entering the verifier.

use serde::{Deserialize, Serialize};

use crate::models::result::ResultItem;

fn na() -> String {
    "N/A".to_string()
}

/// Metadata of an academic paper. Unknown fields are set to `"N/A"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperInfo {
    /// Paper title
    #[serde(default = "na")]
    pub title: String,
    /// Author list, comma-separated
    #[serde(default = "na")]
    pub authors: String,
    /// Author affiliations/institutions
    #[serde(default = "na")]
    pub affiliations: String,
    /// Conference or journal name
    #[serde(default = "na")]
    pub conference_journal: String,
    /// Publication type: SCI, SCIE, arxiv, Conference, etc.
    #[serde(default = "na")]
    pub conference_journal_type: String,
    /// Research field(s), semicolon-separated
    #[serde(default = "na")]
    pub research_field: String,
    /// DOI link
    #[serde(default = "na")]
    pub doi: String,
    /// Publication date/year
    #[serde(default = "na")]
    pub publication_date: String,
    /// Paper abstract
    #[serde(default = "na")]
    pub abstract_text: String,
    /// Citation count
    #[serde(default)]
    pub citation_count: i64,
    /// Source URL
    #[serde(default = "na")]
    pub source_url: String,
}

impl Default for PaperInfo {
    fn default() -> Self {
        Self {
            title: na(),
            authors: na(),
            affiliations: na(),
            conference_journal: na(),
            conference_journal_type: na(),
            research_field: na(),
            doi: na(),
            publication_date: na(),
            abstract_text: na(),
            citation_count: 0,
            source_url: na(),
        }
    }
}

impl PaperInfo {
    /// Convert to the generic [`ResultItem`] for the verification pipeline.
    ///
    /// Maps academic-specific fields into the generic `fields` map, skipping
    /// unknown (`"N/A"`) values.
    pub fn to_result_item(self) -> ResultItem {
        let mut item = ResultItem {
            result_type: "paper".to_string(),
            title: self.title,
            content: self.abstract_text,
            source_url: self.source_url,
            ..Default::default()
        };

        let known = [
            ("authors", self.authors),
            ("affiliations", self.affiliations),
            ("conference_journal", self.conference_journal),
            ("conference_journal_type", self.conference_journal_type),
            ("research_field", self.research_field),
            ("doi", self.doi),
            ("publication_date", self.publication_date),
        ];
        for (key, value) in known {
            if value != "N/A" {
                item.fields.insert(key.to_string(), value);
            }
        }
        if self.citation_count > 0 {
            item.fields
                .insert("citation_count".to_string(), self.citation_count.to_string());
        }

        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_result_item_maps_known_fields() {
        let paper = PaperInfo {
            title: "Deep Learning for Solar Nowcasting".into(),
            authors: "Jane Doe, John Smith".into(),
            doi: "https://doi.org/10.1016/x".into(),
            abstract_text: "We propose a framework.".into(),
            citation_count: 12,
            source_url: "https://example.org/paper".into(),
            ..Default::default()
        };

        let item = paper.to_result_item();
        assert_eq!(item.result_type, "paper");
        assert_eq!(item.title, "Deep Learning for Solar Nowcasting");
        assert_eq!(item.content, "We propose a framework.");
        assert_eq!(item.fields.get("authors").map(String::as_str), Some("Jane Doe, John Smith"));
        assert_eq!(item.fields.get("citation_count").map(String::as_str), Some("12"));
        // "N/A" fields are skipped entirely
        assert!(!item.fields.contains_key("affiliations"));
        assert!(!item.fields.contains_key("research_field"));
    }

    #[test]
    fn test_to_result_item_zero_citations_omitted() {
        let item = PaperInfo::default().to_result_item();
        assert!(!item.fields.contains_key("citation_count"));
        assert!(item.fields.is_empty());
    }
}
