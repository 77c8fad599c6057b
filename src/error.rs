//! Custom error types for opensift.
//!
//! This module defines all error types used throughout the application.
//! All functions return `Result<T, SiftError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for opensift operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
/// Variants are grouped by source: the LLM gateway, the search adapters, and
/// request validation. Everything else maps to `Internal`.
#[derive(Debug, Error)]
pub enum SiftError {
    /// LLM endpoint rejected the API key (HTTP 401)
    #[error("LLM authentication failed: {0}")]
    LlmAuth(String),

    /// LLM endpoint denied access for a valid key (HTTP 403)
    #[error("LLM access forbidden: {0}")]
    LlmForbidden(String),

    /// LLM model or endpoint does not exist (HTTP 404)
    #[error("LLM model or endpoint not found: {0}")]
    LlmNotFound(String),

    /// Rate limited by the LLM endpoint (HTTP 429)
    #[error("LLM rate limited: {0}")]
    LlmRateLimited(String),

    /// Transport failure or unexpected HTTP status from the LLM endpoint
    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    /// LLM returned an empty completion
    #[error("LLM returned empty content")]
    LlmEmpty,

    /// LLM output could not be parsed as JSON, even after repair and retries
    #[error("LLM returned invalid JSON after {attempts} attempt(s)")]
    LlmBadJson {
        /// Number of completion attempts made
        attempts: u32,
    },

    /// Adapter configuration is invalid (missing key, bad host, ...)
    #[error("Adapter configuration error: {0}")]
    AdapterConfig(String),

    /// Adapter cannot reach its search backend
    #[error("Adapter connection error: {0}")]
    AdapterConnect(String),

    /// A search query failed on the backend
    #[error("Adapter query error: {0}")]
    AdapterQuery(String),

    /// A requested document does not exist
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Input (request body, configuration) has an invalid shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// Anything that does not fit the taxonomy above
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SiftError {
    /// True for any error originating from the LLM gateway.
    pub fn is_llm(&self) -> bool {
        matches!(
            self,
            SiftError::LlmAuth(_)
                | SiftError::LlmForbidden(_)
                | SiftError::LlmNotFound(_)
                | SiftError::LlmRateLimited(_)
                | SiftError::LlmUnavailable(_)
                | SiftError::LlmEmpty
                | SiftError::LlmBadJson { .. }
        )
    }
}

/// Result type alias using `SiftError`
pub type Result<T> = std::result::Result<T, SiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_grouping() {
        assert!(SiftError::LlmEmpty.is_llm());
        assert!(SiftError::LlmBadJson { attempts: 2 }.is_llm());
        assert!(!SiftError::AdapterQuery("boom".into()).is_llm());
        assert!(!SiftError::Validation("bad".into()).is_llm());
    }

    #[test]
    fn test_display_messages() {
        let e = SiftError::LlmBadJson { attempts: 3 };
        assert_eq!(e.to_string(), "LLM returned invalid JSON after 3 attempt(s)");
        let e = SiftError::DocumentNotFound("doc-42".into());
        assert!(e.to_string().contains("doc-42"));
    }
}
