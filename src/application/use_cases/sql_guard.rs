//! Read-only statement guard for generated SQL.
//!
//! Opt-in. When enabled, a statement must be a single SELECT (or WITH ... SELECT),
//! carry no comments, use no denied statement keyword, and read only from the
//! configured tables. Keywords inside string literals are ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

static STRING_LITERAL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"'(?:[^']|'')*'").unwrap());

static FROM_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bFROM\b").unwrap());

static JOIN_TARGET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bJOIN\s+(?:"([^"]+)"|`([^`]+)`|\[([^\]]+)\]|([A-Za-z_][A-Za-z0-9_]*))"#)
        .unwrap()
});

static SOURCE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:"([^"]+)"|`([^`]+)`|\[([^\]]+)\]|([A-Za-z_][A-Za-z0-9_]*))"#).unwrap()
});

// Keywords that close a FROM source list.
static CLAUSE_END_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:WHERE|GROUP|ORDER|LIMIT|HAVING|UNION|INTERSECT|EXCEPT|WINDOW|JOIN|INNER|LEFT|RIGHT|FULL|CROSS|NATURAL|ON|USING)\b",
    )
    .unwrap()
});

static CTE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\bWITH\s+(?:RECURSIVE\s+)?|,\s*)([A-Za-z_][A-Za-z0-9_]*)\s*(?:\([^)]*\)\s*)?AS\s*\(")
        .unwrap()
});

#[derive(Debug, Clone, Serialize)]
pub struct GuardViolation {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuardResult {
    pub is_valid: bool,
    pub violations: Vec<GuardViolation>,
}

impl GuardResult {
    fn valid() -> Self {
        Self {
            is_valid: true,
            violations: vec![],
        }
    }

    fn add_violation(&mut self, code: &str, message: String) {
        self.is_valid = false;
        self.violations.push(GuardViolation {
            code: code.to_string(),
            message,
        });
    }

    /// All violation messages joined for an error payload.
    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub struct SqlGuard {
    allowed_tables: HashSet<String>,
    deny_statements: Vec<String>,
}

impl SqlGuard {
    pub fn new(allowed_tables: &[String], deny_statements: &[String]) -> Self {
        Self {
            allowed_tables: allowed_tables.iter().map(|t| t.to_lowercase()).collect(),
            deny_statements: deny_statements.iter().map(|s| s.to_uppercase()).collect(),
        }
    }

    pub fn check(&self, sql: &str) -> GuardResult {
        let mut result = GuardResult::valid();

        let stripped = STRING_LITERAL_PATTERN.replace_all(sql, "''");
        let body = stripped.trim().trim_end_matches(';').trim_end();
        let upper = body.to_uppercase();

        if body.contains("--") || body.contains("/*") {
            result.add_violation("COMMENTS_NOT_ALLOWED", "SQL comments are not allowed".to_string());
        }

        if body.contains(';') {
            result.add_violation(
                "MULTIPLE_STATEMENTS",
                "Only a single statement is allowed".to_string(),
            );
        }

        let first_word = upper.split_whitespace().next().unwrap_or("");
        if first_word != "SELECT" && first_word != "WITH" {
            result.add_violation(
                "NOT_A_SELECT",
                format!("Only SELECT queries are allowed, got '{}'", first_word),
            );
        }

        let words: HashSet<&str> = upper
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .collect();
        for stmt in &self.deny_statements {
            if words.contains(stmt.as_str()) {
                result.add_violation(
                    "FORBIDDEN_STATEMENT",
                    format!("SQL statement '{}' is not allowed", stmt),
                );
            }
        }

        if !self.allowed_tables.is_empty() {
            let ctes: HashSet<String> = CTE_NAME_PATTERN
                .captures_iter(body)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().to_lowercase())
                .collect();

            for name in referenced_tables(body) {
                let table = name.to_lowercase();
                if !self.allowed_tables.contains(&table) && !ctes.contains(&table) {
                    result.add_violation(
                        "TABLE_NOT_ALLOWED",
                        format!("Table '{}' is not in the allowed list", name),
                    );
                }
            }
        }

        result
    }
}

/// Every table named in a FROM source list or as a JOIN target.
/// Parenthesized subqueries are skipped here; their own FROM is scanned separately.
fn referenced_tables(body: &str) -> Vec<&str> {
    let mut names = Vec::new();

    for from in FROM_PATTERN.find_iter(body) {
        for source in from_sources(&body[from.end()..]) {
            if let Some(name) = leading_name(source.trim_start()) {
                names.push(name);
            }
        }
    }
    for caps in JOIN_TARGET_PATTERN.captures_iter(body) {
        if let Some(name) = (1..=4).find_map(|i| caps.get(i)) {
            names.push(name.as_str());
        }
    }

    names
}

/// Splits the text after FROM into its comma-separated items, stopping at the
/// first clause keyword or unbalanced `)` at nesting depth zero.
fn from_sources(after: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;

    for (i, c) in after.char_indices() {
        if let Some(close) = quote {
            if c == close {
                quote = None;
            }
            prev = Some(c);
            continue;
        }

        match c {
            '"' | '`' => quote = Some(c),
            '[' => quote = Some(']'),
            '(' => depth += 1,
            ')' if depth == 0 => {
                items.push(&after[start..i]);
                return items;
            }
            ')' => depth -= 1,
            ',' if depth == 0 => {
                items.push(&after[start..i]);
                start = i + 1;
            }
            c if depth == 0
                && c.is_ascii_alphabetic()
                && !prev.is_some_and(|p| p.is_ascii_alphanumeric() || p == '_')
                && CLAUSE_END_PATTERN.is_match(&after[i..]) =>
            {
                items.push(&after[start..i]);
                return items;
            }
            _ => {}
        }
        prev = Some(c);
    }

    items.push(&after[start..]);
    items
}

fn leading_name(source: &str) -> Option<&str> {
    let caps = SOURCE_NAME_PATTERN.captures(source)?;
    (1..=4).find_map(|i| caps.get(i)).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> SqlGuard {
        SqlGuard::new(
            &["aws_cost_usage".to_string(), "azure_cost_usage".to_string()],
            &["INSERT", "UPDATE", "DELETE", "DROP", "PRAGMA", "ATTACH"]
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_accepts_plain_select() {
        let result = guard().check(
            "SELECT RegionName, SUM(EffectiveCost) AS TotalSpent FROM aws_cost_usage GROUP BY RegionName ORDER BY TotalSpent DESC LIMIT 1;",
        );
        assert!(result.is_valid, "{:?}", result.violations);
    }

    #[test]
    fn test_accepts_cte_over_allowed_tables() {
        let result = guard().check(
            "WITH monthly AS (SELECT substr(BillingPeriodStart, 1, 7) AS m, EffectiveCost FROM aws_cost_usage) SELECT m, SUM(EffectiveCost) FROM monthly GROUP BY m",
        );
        assert!(result.is_valid, "{:?}", result.violations);
    }

    #[test]
    fn test_keywords_inside_literals_are_ignored() {
        let result =
            guard().check("SELECT * FROM aws_cost_usage WHERE UsageType = 'DeleteObject; DROP'");
        assert!(result.is_valid, "{:?}", result.violations);
    }

    #[test]
    fn test_rejects_write_statement() {
        let result = guard().check("DELETE FROM aws_cost_usage");
        assert!(!result.is_valid);
        let codes: Vec<&str> = result.violations.iter().map(|v| v.code.as_str()).collect();
        assert!(codes.contains(&"NOT_A_SELECT"));
        assert!(codes.contains(&"FORBIDDEN_STATEMENT"));
    }

    #[test]
    fn test_rejects_stacked_statements_and_comments() {
        let result = guard().check("SELECT 1; DROP TABLE aws_cost_usage -- bye");
        let codes: Vec<&str> = result.violations.iter().map(|v| v.code.as_str()).collect();
        assert!(codes.contains(&"MULTIPLE_STATEMENTS"));
        assert!(codes.contains(&"COMMENTS_NOT_ALLOWED"));
        assert!(codes.contains(&"FORBIDDEN_STATEMENT"));
    }

    #[test]
    fn test_rejects_unlisted_table() {
        let result = guard().check("SELECT name FROM sqlite_master");
        assert!(!result.is_valid);
        assert_eq!(result.violations[0].code, "TABLE_NOT_ALLOWED");
        assert!(result.summary().contains("sqlite_master"));
    }

    #[test]
    fn test_rejects_comma_joined_unlisted_table() {
        let result = guard().check("SELECT * FROM aws_cost_usage, sqlite_master");
        assert!(!result.is_valid);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].code, "TABLE_NOT_ALLOWED");
        assert!(result.summary().contains("sqlite_master"));

        let nested = guard().check(
            "SELECT * FROM (SELECT RegionName FROM aws_cost_usage) a, \"sqlite_schema\" s WHERE a.RegionName = s.name",
        );
        assert!(!nested.is_valid);
        assert!(nested.summary().contains("sqlite_schema"));
    }

    #[test]
    fn test_accepts_comma_joined_allowed_tables() {
        let result = guard().check(
            "SELECT a.RegionName, z.ResourceLocation FROM aws_cost_usage a, azure_cost_usage AS z WHERE a.EffectiveCost > 1 ORDER BY a.RegionName",
        );
        assert!(result.is_valid, "{:?}", result.violations);

        let result = guard().check(
            "SELECT RegionName FROM (SELECT RegionName, EffectiveCost FROM aws_cost_usage) GROUP BY RegionName",
        );
        assert!(result.is_valid, "{:?}", result.violations);
    }

    #[test]
    fn test_quoted_table_names() {
        let result = guard().check("SELECT * FROM \"azure_cost_usage\" a JOIN [aws_cost_usage] b ON a.ResourceId = b.ResourceId");
        assert!(result.is_valid, "{:?}", result.violations);
    }
}
