//! SQL generation from a question, the schema text and the table's semantic metadata.
//!
//! The prompt carries a fixed set of worked examples over the cost tables.

use crate::domain::error::Result;
use crate::domain::llm_config::LLMConfig;
use crate::domain::semantic_metadata::SemanticMetadata;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::strip_code_fences;
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

pub struct FewShotExample {
    pub question: &'static str,
    pub sql: &'static str,
}

pub const FEW_SHOT_EXAMPLES: [FewShotExample; 4] = [
    FewShotExample {
        question: "Which AWS region had the highest spend last month?",
        sql: "SELECT RegionName AS Region, SUM(EffectiveCost) AS TotalSpent FROM aws_cost_usage WHERE BillingPeriodStart >= substr(date('now','-1 month', 'start of month'), 1, 10) AND BillingPeriodStart < substr(date('now', 'start of month'), 1, 10) AND RegionName IS NOT NULL GROUP BY RegionName ORDER BY TotalSpent DESC LIMIT 1;",
    },
    FewShotExample {
        question: "What is the daily trend of S3 storage cost?",
        sql: "SELECT substr(BillingPeriodStart, 1, 10) AS BillingDate, SUM(EffectiveCost) AS TotalS3Cost FROM aws_cost_usage WHERE ServiceName = 'Amazon Simple Storage Service' AND BillingPeriodStart IS NOT NULL GROUP BY BillingDate ORDER BY BillingDate;",
    },
    FewShotExample {
        question: "What is EC2 usage by instance type?",
        sql: "SELECT UsageType, SUM(EffectiveCost) AS TotalCost FROM aws_cost_usage WHERE ServiceName = 'Amazon Elastic Compute Cloud' AND UsageType LIKE '%BoxUsage%' GROUP BY UsageType ORDER BY TotalCost DESC;",
    },
    FewShotExample {
        question: "Show me the total compute cost for Azure grouped by service.",
        sql: "SELECT ServiceName, SUM(EffectiveCost) AS TotalComputeCost FROM azure_cost_usage WHERE MeterCategory = 'Virtual Machines' GROUP BY ServiceName ORDER BY TotalComputeCost DESC;",
    },
];

pub struct QuerySynthesizer {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    metadata: Arc<SemanticMetadata>,
}

impl QuerySynthesizer {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        metadata: Arc<SemanticMetadata>,
    ) -> Self {
        Self {
            llm_client,
            metadata,
        }
    }

    pub fn build_prompt(&self, question: &str, schema: &str, table: &str) -> String {
        let mut prompt = String::new();

        writeln!(
            prompt,
            "Based on the table schema, semantic metadata, and the user's question, write a single-line SQLite query."
        )
        .unwrap();
        if self.metadata.has_expert_guidance(table) {
            writeln!(
                prompt,
                "You MUST follow the 'expert_guidance' from the semantic metadata."
            )
            .unwrap();
        }
        writeln!(
            prompt,
            "Return ONLY the raw SQL query. Do NOT add line breaks, comments, or ```sql``` markdown.\n"
        )
        .unwrap();

        writeln!(prompt, "Database Schema: {}", schema).unwrap();
        writeln!(
            prompt,
            "Semantic Metadata for {}: {}",
            table,
            self.metadata.table_json(table)
        )
        .unwrap();
        writeln!(prompt, "Question: {}", question).unwrap();

        writeln!(prompt, "--- EXAMPLES ---").unwrap();
        for example in &FEW_SHOT_EXAMPLES {
            writeln!(prompt, "Question: \"{}\"", example.question).unwrap();
            writeln!(prompt, "SQL Query: {}", example.sql).unwrap();
        }
        writeln!(prompt, "---").unwrap();

        writeln!(prompt, "Question: {}", question).unwrap();
        write!(prompt, "SQL Query:").unwrap();

        prompt
    }

    /// Returns the generated statement with code fences and outer whitespace removed.
    pub async fn synthesize(
        &self,
        config: &LLMConfig,
        question: &str,
        schema: &str,
        table: &str,
    ) -> Result<String> {
        let prompt = self.build_prompt(question, schema, table);
        let raw = self.llm_client.generate(config, "", &prompt).await?;

        let sql = strip_code_fences(&raw);
        debug!(table = %table, sql = %sql, "SQL generated");
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::ScriptedLlm;
    use crate::domain::semantic_metadata::ColumnAnnotation;
    use std::collections::BTreeMap;

    fn metadata(guidance: Option<&str>) -> Arc<SemanticMetadata> {
        let mut columns = BTreeMap::new();
        columns.insert(
            "BillingPeriodStart".to_string(),
            ColumnAnnotation {
                ai_description: Some("Start date of the billing period.".to_string()),
                expert_guidance: guidance.map(str::to_string),
                ..ColumnAnnotation::default()
            },
        );
        let mut tables = BTreeMap::new();
        tables.insert("aws_cost_usage".to_string(), columns);
        Arc::new(SemanticMetadata { tables })
    }

    #[test]
    fn test_prompt_embeds_examples_and_metadata() {
        let llm = Arc::new(ScriptedLlm::new("", "", ""));
        let synthesizer = QuerySynthesizer::new(llm, metadata(None));

        let prompt = synthesizer.build_prompt("Top region?", "CREATE TABLE aws_cost_usage (...)", "aws_cost_usage");

        for example in &FEW_SHOT_EXAMPLES {
            assert!(prompt.contains(example.question));
            assert!(prompt.contains(example.sql));
        }
        assert!(prompt.contains("Start date of the billing period."));
        assert!(prompt.contains("Database Schema: CREATE TABLE aws_cost_usage (...)\n"));
        assert!(prompt.ends_with("---\nQuestion: Top region?\nSQL Query:"));
        assert!(!prompt.contains("expert_guidance' from"));
    }

    #[test]
    fn test_guidance_instruction_only_when_present() {
        let llm = Arc::new(ScriptedLlm::new("", "", ""));
        let synthesizer = QuerySynthesizer::new(
            llm,
            metadata(Some("Compare dates with substr(BillingPeriodStart, 1, 10).")),
        );

        let prompt = synthesizer.build_prompt("q", "schema", "aws_cost_usage");
        assert!(prompt.contains("You MUST follow the 'expert_guidance' from the semantic metadata."));

        let other = synthesizer.build_prompt("q", "schema", "azure_cost_usage");
        assert!(!other.contains("You MUST follow"));
        assert!(other.contains("Semantic Metadata for azure_cost_usage: {}\n"));
    }

    #[test]
    fn test_question_frames_the_examples() {
        let llm = Arc::new(ScriptedLlm::new("", "", ""));
        let synthesizer = QuerySynthesizer::new(llm, metadata(None));

        let prompt = synthesizer.build_prompt("Top region?", "schema", "aws_cost_usage");

        let examples_start = prompt.find("--- EXAMPLES ---").unwrap();
        let examples_end = prompt.rfind("\n---\n").unwrap();
        let first_question = prompt.find("Question: Top region?").unwrap();
        let last_question = prompt.rfind("Question: Top region?").unwrap();
        assert!(first_question < examples_start);
        assert!(last_question > examples_end);
        assert!(prompt.contains(
            "--- EXAMPLES ---\nQuestion: \"Which AWS region had the highest spend last month?\"\nSQL Query: SELECT RegionName"
        ));
    }

    #[tokio::test]
    async fn test_synthesize_strips_fences() {
        let llm = Arc::new(ScriptedLlm::new(
            "",
            "```sql\nSELECT SUM(EffectiveCost) FROM aws_cost_usage;\n```",
            "",
        ));
        let synthesizer = QuerySynthesizer::new(llm, metadata(None));

        let sql = synthesizer
            .synthesize(&LLMConfig::default(), "Total?", "schema", "aws_cost_usage")
            .await
            .unwrap();
        assert_eq!(sql, "SELECT SUM(EffectiveCost) FROM aws_cost_usage;");
    }
}
