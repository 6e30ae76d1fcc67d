use once_cell::sync::Lazy;
use regex::Regex;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<think>[\s\S]*?</think>|<think\s*/>").unwrap());

static REASONING_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<reasoning>[\s\S]*?</reasoning>").unwrap());

static MULTIPLE_NEWLINES_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static JSON_OBJECT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Cleans a free-text LLM answer: reasoning tags removed, whitespace tidied.
pub fn clean_llm_response(response: &str) -> String {
    let mut cleaned = THINK_TAG_PATTERN.replace_all(response, "").to_string();
    cleaned = REASONING_TAG_PATTERN.replace_all(&cleaned, "").to_string();
    cleaned = cleaned.trim().to_string();

    // Collapse multiple consecutive newlines into at most two
    MULTIPLE_NEWLINES_PATTERN
        .replace_all(&cleaned, "\n\n")
        .to_string()
}

/// Removes markdown code-fence markers anywhere in the text, then trims.
///
/// ```sql and ```SQL openers go first so their language tag does not survive,
/// then every remaining ``` marker.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```sql", "")
        .replace("```SQL", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Pulls the outermost JSON object out of a model reply that may carry fences or prose.
pub fn extract_json_object(text: &str) -> Option<String> {
    let cleaned = clean_llm_response(text).replace("```json", "").replace("```", "");
    JSON_OBJECT_PATTERN
        .find(&cleaned)
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_think_tags() {
        let input = "<think>Some reasoning here</think>The actual response";
        assert_eq!(clean_llm_response(input), "The actual response");
    }

    #[test]
    fn test_clean_self_closing_think() {
        let input = "<think />us-east-1 had the highest spend.";
        assert_eq!(clean_llm_response(input), "us-east-1 had the highest spend.");
    }

    #[test]
    fn test_clean_reasoning_tags() {
        let input = "<reasoning>Sum per region</reasoning>Final answer";
        assert_eq!(clean_llm_response(input), "Final answer");
    }

    #[test]
    fn test_clean_multiple_newlines() {
        let input = "Line 1\n\n\n\n\nLine 2";
        assert_eq!(clean_llm_response(input), "Line 1\n\nLine 2");
    }

    #[test]
    fn test_strip_sql_fence() {
        let input = "```sql\nSELECT RegionName FROM aws_cost_usage;\n```";
        assert_eq!(
            strip_code_fences(input),
            "SELECT RegionName FROM aws_cost_usage;"
        );
    }

    #[test]
    fn test_strip_bare_fence_and_whitespace() {
        assert_eq!(strip_code_fences("  ```SELECT 1;```  \n"), "SELECT 1;");
        assert_eq!(strip_code_fences("```SQL SELECT 1```"), "SELECT 1");
    }

    #[test]
    fn test_strip_leaves_plain_sql_untouched() {
        let sql = "SELECT ServiceName, SUM(EffectiveCost) FROM azure_cost_usage GROUP BY ServiceName;";
        assert_eq!(strip_code_fences(sql), sql);
    }

    #[test]
    fn test_extract_json_object_from_fenced_reply() {
        let reply = "```json\n{\"description\": \"Cost in USD.\", \"semantic_type\": \"Numerical\"}\n```";
        assert_eq!(
            extract_json_object(reply).as_deref(),
            Some("{\"description\": \"Cost in USD.\", \"semantic_type\": \"Numerical\"}")
        );
        assert_eq!(extract_json_object("no json here"), None);
    }
}
