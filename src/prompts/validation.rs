//! Result validation prompts for the evidence verifier.
//!
//! Two prompt sets:
//!
//! - **Paper-specific** (`PAPER_VALIDATION_*`) - tuned for academic papers
//!   with fixed `<paper_info>` XML fields. Used when
//!   `ResultItem.result_type == "paper"`.
//! - **Generic** (`VALIDATION_*`) - domain-agnostic, dynamically renders any
//!   fields from the result item. Used for all other result types.

/// Shared JSON output contract appended to both user prompts.
const OUTPUT_SCHEMA: &str = r#"Output format (strict JSON, no markdown):
{
  "criteria_assessment": [
    {
      "criterion_id": "criterion_1",
      "assessment": "support" | "somewhat_support" | "insufficient_information" | "reject",
      "explanation": "Why the criterion is or is not met",
      "evidence": [{"source": "field name", "text": "verbatim text from that field"}]
    }
  ],
  "summary": "One-paragraph summary of the result and its alignment with the query"
}"#;

/// System prompt for academic paper validation
pub const PAPER_VALIDATION_SYSTEM_PROMPT: &str = r#"You are a meticulous academic content auditor. Your task is to act as an academic expert and strictly follow a set of rules to verify if a given academic paper (`paper_info`) aligns with a set of `criteria` derived from a user's `query`.

**Core Principles:**
1.  **Evidence is King:** Your entire analysis must be based *exclusively* on the provided `paper_info`. Do not use any external knowledge, make assumptions, or infer information not explicitly stated. Every judgment must be backed by direct, verbatim evidence.
2.  **Strict Adherence to Definitions:** You must use the precise definitions for each assessment category. Do not rely on a general understanding.

**Assessment Definitions (`assessment` field):**
- **`support`**: The paper contains clear, direct, and unambiguous evidence that fully satisfies the criterion.
- **`reject`**:
    - **Explicit Contradiction:** The paper contains clear evidence that directly contradicts or negates the criterion.
    - **Foundational Irrelevance:** The paper's fundamental topic, domain, or context is completely unrelated to the premise of the criterion, making the criterion nonsensical to apply.
- **`somewhat_support`**: The paper is related to the criterion, but the evidence is indirect, incomplete, or requires inference. The link is strongly implied but not explicitly stated.
- **`insufficient_information`**: The paper is in the correct domain/context for the criterion to be applicable, but the provided text contains neither supporting nor rejecting evidence to make a definitive judgment.

Your final output must be a single, valid JSON object, following the structure provided in the user prompt precisely."#;

/// User prompt template for paper validation.
/// Placeholders: `{time}`, `{query}`, `{criteria}`, `{paper_xml}`, `{question_lang}`
pub const PAPER_VALIDATION_USER_PROMPT: &str = r#"Current time: {time}
Original user query: {query}

**Validation criteria:**
{criteria}

**Paper details for validation:**
{paper_xml}

---

**Your Task:**
Based on the rules provided in your instructions, you must perform a rigorous, step-by-step validation and generate a single JSON object as your response. Write all text fields (`explanation`, `summary`) in **{question_lang}**.

{output_schema}

Now, please strictly follow these instructions and output the complete JSON object."#;

/// System prompt for generic result validation
pub const VALIDATION_SYSTEM_PROMPT: &str = r#"You are a meticulous content verification expert. Your task is to strictly follow a set of rules to verify whether a given search result (`result_info`) aligns with a set of `criteria` derived from a user's `query`.

**Core Principles:**
1.  **Evidence is King:** Your entire analysis must be based *exclusively* on the provided `result_info`. Do not use any external knowledge, make assumptions, or infer information not explicitly stated. Every judgment must be backed by direct, verbatim evidence.
2.  **Strict Adherence to Definitions:** You must use the precise definitions for each assessment category. Do not rely on a general understanding.

**Assessment Definitions (`assessment` field):**
- **`support`**: The result contains clear, direct, and unambiguous evidence that fully satisfies the criterion.
- **`reject`**:
    - **Explicit Contradiction:** The result contains clear evidence that directly contradicts or negates the criterion.
    - **Foundational Irrelevance:** The result's fundamental topic, domain, or context is completely unrelated to the premise of the criterion, making the criterion nonsensical to apply.
- **`somewhat_support`**: The result is related to the criterion, but the evidence is indirect, incomplete, or requires inference. The link is strongly implied but not explicitly stated.
- **`insufficient_information`**: The result is in the correct domain/context for the criterion to be applicable, but the provided text contains neither supporting nor rejecting evidence to make a definitive judgment.

Your final output must be a single, valid JSON object, following the structure provided in the user prompt precisely."#;

/// User prompt template for generic result validation.
/// Placeholders: `{time}`, `{query}`, `{criteria}`, `{result_xml}`, `{question_lang}`
pub const VALIDATION_USER_PROMPT: &str = r#"Current time: {time}
Original user query: {query}

**Validation criteria:**
{criteria}

**Search result to verify:**
{result_xml}

---

**Your Task:**
Based on the rules provided in your instructions, you must perform a rigorous, step-by-step validation and generate a single JSON object as your response. Write all text fields (`explanation`, `summary`) in **{question_lang}**.

{output_schema}

Now, please strictly follow these instructions and output the complete JSON object."#;

/// Format criterion descriptions into XML for the validation prompt.
pub fn format_criteria_xml(descriptions: &[String]) -> String {
    if descriptions.is_empty() {
        return "<criteria>\n</criteria>".to_string();
    }
    let mut parts = vec!["<criteria>".to_string()];
    for (i, description) in descriptions.iter().enumerate() {
        let n = i + 1;
        parts.push(format!("  <criterion_{n}>{description}</criterion_{n}>"));
    }
    parts.push("</criteria>".to_string());
    parts.join("\n")
}

/// Build the paper-validation user prompt.
pub fn build_paper_prompt(
    time: &str,
    query: &str,
    criteria_xml: &str,
    paper_xml: &str,
    question_lang: &str,
) -> String {
    PAPER_VALIDATION_USER_PROMPT
        .replace("{time}", time)
        .replace("{query}", query)
        .replace("{criteria}", criteria_xml)
        .replace("{paper_xml}", paper_xml)
        .replace("{question_lang}", question_lang)
        .replace("{output_schema}", OUTPUT_SCHEMA)
}

/// Build the generic-validation user prompt.
pub fn build_result_prompt(
    time: &str,
    query: &str,
    criteria_xml: &str,
    result_xml: &str,
    question_lang: &str,
) -> String {
    VALIDATION_USER_PROMPT
        .replace("{time}", time)
        .replace("{query}", query)
        .replace("{criteria}", criteria_xml)
        .replace("{result_xml}", result_xml)
        .replace("{question_lang}", question_lang)
        .replace("{output_schema}", OUTPUT_SCHEMA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_criteria_xml() {
        let xml = format_criteria_xml(&[
            "Is about turbulence modeling".to_string(),
            "Published after 2020".to_string(),
        ]);
        assert!(xml.starts_with("<criteria>"));
        assert!(xml.contains("<criterion_1>Is about turbulence modeling</criterion_1>"));
        assert!(xml.contains("<criterion_2>Published after 2020</criterion_2>"));
        assert!(xml.ends_with("</criteria>"));
    }

    #[test]
    fn test_format_criteria_xml_empty() {
        assert_eq!(format_criteria_xml(&[]), "<criteria>\n</criteria>");
    }

    #[test]
    fn test_build_result_prompt_substitutes_all() {
        let prompt = build_result_prompt(
            "2025-01-01",
            "solar nowcasting",
            "<criteria></criteria>",
            "<result_info></result_info>",
            "English",
        );
        assert!(prompt.contains("solar nowcasting"));
        assert!(prompt.contains("**English**"));
        assert!(prompt.contains("criteria_assessment"));
        assert!(!prompt.contains("{time}"));
        assert!(!prompt.contains("{output_schema}"));
    }
}
