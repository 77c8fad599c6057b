//! LLM gateway for query planning and result verification.
//!
//! Wraps an OpenAI-compatible chat-completions endpoint. One client instance
//! is shared across the planner and verifier. Provides raw-text and
//! JSON-returning calls; the JSON path strips markdown fences, repairs the
//! common malformations the model produces, and retries the whole call with
//! temperature 0 before giving up.

use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::AiSettings;
use crate::error::{Result, SiftError};

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Async LLM client wrapping an OpenAI-compatible API.
///
/// Handles model calls for both criteria generation (planner) and result
/// validation (verifier). `chat_json` automatically parses and repairs
/// JSON responses.
#[derive(Debug, Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
    temperature: f64,
    max_tokens: u32,
}

/// OpenAI-compatible API response structures
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl LlmClient {
    /// Create a new client from the AI settings.
    pub fn new(settings: &AiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SiftError::Internal(format!("Failed to build HTTP client: {e}")))?;

        info!(
            base_url = %settings.base_url,
            api_key = %mask_key(&settings.api_key),
            "LLM client created"
        );

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            default_model: settings.model_planner.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send a lightweight test request to verify API connectivity and auth.
    ///
    /// Returns true if the connection is valid, false otherwise. Logs a
    /// detailed diagnosis on failure; never returns an error.
    pub async fn verify_connection(&self, model: &str) -> bool {
        let url = self.completions_url();
        info!(url = %url, model = model, "Verifying LLM connectivity");

        let body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": "ping"}],
            "max_tokens": 1,
        });

        match self.post_completion(&body, model).await {
            Ok(response) => {
                info!(
                    model = model,
                    response_model = %response.model,
                    "LLM connectivity OK"
                );
                true
            }
            Err(e) => {
                error!(url = %url, model = model, error = %e, "LLM connectivity check FAILED");
                false
            }
        }
    }

    /// Send a chat completion request and return the raw text response.
    pub async fn chat_raw(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: Option<&str>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let model = model.unwrap_or(&self.default_model);
        let temperature = temperature.unwrap_or(self.temperature);
        let max_tokens = max_tokens.unwrap_or(self.max_tokens);

        info!(
            url = %self.completions_url(),
            model = model,
            temperature = temperature,
            max_tokens = max_tokens,
            system_prompt_len = system_prompt.len(),
            user_prompt_len = user_prompt.len(),
            "LLM chat request"
        );

        let body = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let response = self.post_completion(&body, model).await?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| format!("{}+{}={}", u.prompt_tokens, u.completion_tokens, u.total_tokens))
            .unwrap_or_else(|| "N/A".to_string());

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or(SiftError::LlmEmpty)?;

        info!(
            model = model,
            usage = %usage,
            content_len = content.len(),
            "LLM chat response OK"
        );
        debug!(preview = %content.chars().take(500).collect::<String>(), "LLM raw response");

        Ok(content)
    }

    /// Send a chat completion request and parse the JSON response.
    ///
    /// If the model returns malformed JSON, automatic repair is attempted.
    /// If repair fails, the whole call is retried up to `max_retries` times
    /// with `temperature=0` to encourage deterministic output. API errors
    /// propagate immediately; only parse failures trigger a retry.
    pub async fn chat_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: Option<&str>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
        max_retries: u32,
    ) -> Result<serde_json::Value> {
        let attempts = 1 + max_retries;
        for attempt in 0..attempts {
            let cur_temp = if attempt == 0 {
                temperature.unwrap_or(self.temperature)
            } else {
                0.0
            };
            let content = self
                .chat_raw(system_prompt, user_prompt, model, Some(cur_temp), max_tokens)
                .await?;

            let stripped = strip_code_fences(&content);
            if let Ok(value) = serde_json::from_str(stripped) {
                return Ok(value);
            }
            match repair_json(stripped) {
                Some(value) => {
                    warn!(attempt = attempt + 1, "LLM returned malformed JSON, auto-repaired");
                    return Ok(value);
                }
                None => {
                    warn!(
                        attempt = attempt + 1,
                        total = attempts,
                        preview = %stripped.chars().take(300).collect::<String>(),
                        "LLM returned malformed JSON, repair failed"
                    );
                }
            }
        }

        Err(SiftError::LlmBadJson { attempts })
    }

    async fn post_completion(
        &self,
        body: &serde_json::Value,
        model: &str,
    ) -> Result<ChatCompletionResponse> {
        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| SiftError::LlmUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let err = self.status_error(status, model, &error_text);
            error!(status = status.as_u16(), model = model, error = %err, "LLM API error");
            return Err(err);
        }

        response
            .json()
            .await
            .map_err(|e| SiftError::LlmUnavailable(format!("invalid completion response: {e}")))
    }

    /// Map an HTTP error status to a typed error with a human-readable
    /// diagnosis (logged verbatim; exposed through the error message).
    fn status_error(&self, status: reqwest::StatusCode, model: &str, body: &str) -> SiftError {
        let url = self.completions_url();
        let body_preview: String = body.chars().take(200).collect();
        match status.as_u16() {
            401 => SiftError::LlmAuth(format!(
                "API key is invalid or missing. Check ai.api_key (or OPENSIFT_AI__API_KEY). Endpoint: {url}"
            )),
            403 => SiftError::LlmForbidden(format!(
                "API key is valid but has no access to model '{model}' at {url}. \
                 Fix options: 1) request access for this key, 2) rotate to a key with access, \
                 3) switch ai.base_url to another provider. Response: {body_preview}"
            )),
            404 => SiftError::LlmNotFound(format!(
                "model '{model}' or endpoint {url} does not exist. \
                 Check ai.base_url and ai.model_planner/ai.model_verifier."
            )),
            429 => SiftError::LlmRateLimited(format!(
                "too many requests to {url}. Wait and retry, or reduce search.max_concurrent_queries."
            )),
            code => SiftError::LlmUnavailable(format!(
                "HTTP {code} from {url} (model '{model}'): {body_preview}"
            )),
        }
    }
}

fn mask_key(key: &str) -> String {
    if key.len() > 12 {
        format!("{}...{}", &key[..8], &key[key.len() - 4..])
    } else if key.is_empty() {
        "(not set)".to_string()
    } else {
        "***".to_string()
    }
}

/// Remove a surrounding markdown code fence from LLM output.
///
/// Handles ```json ... ``` and ``` ... ``` patterns.
pub fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if text.starts_with("```") {
        if let Some(first_newline) = text.find('\n') {
            text = &text[first_newline + 1..];
        }
        text = text.trim_end();
        if let Some(stripped) = text.strip_suffix("```") {
            text = stripped;
        }
    }
    text.trim()
}

/// Attempt to repair common LLM JSON formatting issues.
///
/// Repairs are applied as an ordered sequence of passes, re-parsing after
/// each: leading prose before the object, truncated output (unclosed
/// braces/brackets), trailing commas, literal tabs, missing commas between
/// adjacent values, and unescaped newlines inside strings.
///
/// Returns the parsed value on success, or `None` if repair fails.
/// For input that is already valid JSON, the parsed value is unchanged.
pub fn repair_json(text: &str) -> Option<serde_json::Value> {
    // Extract the outermost JSON object if surrounded by text
    let start = text.find('{')?;
    let mut text = text[start..].to_string();
    if let Ok(v) = serde_json::from_str(&text) {
        return Some(v);
    }

    // Close any unclosed braces / brackets
    let open_braces =
        text.matches('{').count() as i64 - text.matches('}').count() as i64;
    let open_brackets =
        text.matches('[').count() as i64 - text.matches(']').count() as i64;
    if open_braces > 0 || open_brackets > 0 {
        let mut t = text.trim_end().trim_end_matches(',').to_string();
        for _ in 0..open_brackets.max(0) {
            t.push(']');
        }
        for _ in 0..open_braces.max(0) {
            t.push('}');
        }
        text = t;
        if let Ok(v) = serde_json::from_str(&text) {
            return Some(v);
        }
    }

    // Remove trailing commas before } or ]
    text = replace_re(&text, r",\s*([}\]])", "$1")?;
    if let Ok(v) = serde_json::from_str(&text) {
        return Some(v);
    }

    // Escape literal tabs
    text = text.replace('\t', "\\t");
    if let Ok(v) = serde_json::from_str(&text) {
        return Some(v);
    }

    // Missing commas between adjacent values
    text = replace_re(&text, "(\"[ ]*)\\n(\\s*\")", "$1,\n$2")?;
    text = replace_re(&text, "(\"[ ]*)\\n(\\s*\\{)", "$1,\n$2")?;
    text = replace_re(&text, "(\"[ ]*)\\n(\\s*\\[)", "$1,\n$2")?;
    text = replace_re(&text, r"(\})\s*(\{)", "$1,$2")?;
    text = replace_re(&text, r"(\])\s*(\[)", "$1,$2")?;
    if let Ok(v) = serde_json::from_str(&text) {
        return Some(v);
    }

    // Replace unescaped literal newlines inside JSON strings
    text = escape_newlines_in_strings(&text);
    serde_json::from_str(&text).ok()
}

fn replace_re(text: &str, pattern: &str, replacement: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    Some(re.replace_all(text, replacement).into_owned())
}

/// Walk the text tracking whether the position is inside an unescaped
/// string; literal newlines inside strings become `\n`.
fn escape_newlines_in_strings(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in s.chars() {
        if escaped {
            result.push(ch);
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            result.push(ch);
            continue;
        }
        if ch == '"' {
            in_string = !in_string;
        }
        if in_string && ch == '\n' {
            result.push_str("\\n");
            continue;
        }
        result.push(ch);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_plain() {
        let input = r#"{"a": 1}"#;
        assert_eq!(strip_code_fences(input), input);
    }

    #[test]
    fn test_strip_code_fences_with_language_tag() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_bare() {
        let input = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_repair_valid_json_is_identity() {
        let input = r#"{"search_queries": ["a", "b"], "criteria": [{"weight": 0.5}]}"#;
        let direct: serde_json::Value = serde_json::from_str(input).expect("valid");
        let repaired = repair_json(input).expect("repair");
        assert_eq!(direct, repaired);
    }

    #[test]
    fn test_repair_leading_prose() {
        let input = r#"Here is the result: {"label": "ok"}"#;
        let v = repair_json(input).expect("repair");
        assert_eq!(v["label"], "ok");
    }

    #[test]
    fn test_repair_trailing_comma() {
        let v = repair_json(r#"{"a": [1, 2,], "b": 3,}"#).expect("repair");
        assert_eq!(v["a"][1], 2);
        assert_eq!(v["b"], 3);
    }

    #[test]
    fn test_repair_truncated_object() {
        let v = repair_json(r#"{"a": {"b": [1, 2"#).expect("repair");
        assert_eq!(v["a"]["b"][1], 2);
    }

    #[test]
    fn test_repair_literal_tab() {
        let v = repair_json("{\"a\": \"x\ty\"}").expect("repair");
        assert_eq!(v["a"], "x\ty");
    }

    #[test]
    fn test_repair_missing_comma_between_strings() {
        let v = repair_json("{\"a\": \"one\"\n\"b\": \"two\"}").expect("repair");
        assert_eq!(v["b"], "two");
    }

    #[test]
    fn test_repair_newline_inside_string() {
        let v = repair_json("{\"a\": \"line one\nline two\"}").expect("repair");
        assert_eq!(v["a"], "line one\nline two");
    }

    #[test]
    fn test_repair_unrecoverable() {
        assert!(repair_json("no json here at all").is_none());
        assert!(repair_json("{{{{:::").is_none());
    }

    #[test]
    fn test_repair_fenced_planner_output() {
        // Fence + trailing comma + missing closers in one response.
        let raw = "```json\n{\"search_queries\":[\"a\",\"b\"],\"criteria\":[{\"name\":\"n\",\"description\":\"d\",\"weight\":1.0,}\n```";
        let stripped = strip_code_fences(raw);
        let v = repair_json(stripped).expect("repair");
        assert_eq!(v["search_queries"][1], "b");
        assert_eq!(v["criteria"][0]["weight"], 1.0);
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "(not set)");
        assert_eq!(mask_key("short"), "***");
        assert_eq!(mask_key("sk-abcdefgh12345678"), "sk-abcde...5678");
    }
}
