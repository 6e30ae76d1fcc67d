use crate::domain::error::Result;
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use std::sync::Arc;
use tracing::debug;

pub struct TableSelector {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
}

impl TableSelector {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>) -> Self {
        Self { llm_client }
    }

    pub fn build_prompt(question: &str, schema: &str) -> String {
        format!(
            "Based on the database schema and the user's question, determine which table is the most relevant.\n\
             Return ONLY the table name (e.g., 'aws_cost_usage' or 'azure_cost_usage').\n\
             Schema: {}\n\
             Question: {}\n\
             Relevant Table:",
            schema, question
        )
    }

    /// Asks the model for the single most relevant table.
    ///
    /// The reply is only trimmed. A name outside the allow-list is passed on as-is.
    pub async fn select(&self, config: &LLMConfig, question: &str, schema: &str) -> Result<String> {
        let raw = self
            .llm_client
            .generate(config, "", &Self::build_prompt(question, schema))
            .await?;

        let table = raw.trim().to_string();
        debug!(table = %table, "Table selected");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::ScriptedLlm;

    #[tokio::test]
    async fn test_select_trims_reply_only() {
        let llm = Arc::new(ScriptedLlm::new("  gcp_billing \n", "", ""));
        let selector = TableSelector::new(llm.clone());

        let table = selector
            .select(&LLMConfig::default(), "Which project cost most?", "CREATE TABLE aws_cost_usage (...)")
            .await
            .unwrap();

        assert_eq!(table, "gcp_billing");
        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.is_empty());
        assert!(calls[0].1.contains("Question: Which project cost most?"));
        assert!(calls[0].1.contains("Schema: CREATE TABLE aws_cost_usage (...)"));
        assert!(calls[0].1.ends_with("Relevant Table:"));
    }
}
