use crate::domain::answer::ResultRow;
use crate::domain::error::Result;
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::clean_llm_response;
use std::sync::Arc;

pub struct AnswerSynthesizer {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
}

impl AnswerSynthesizer {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>) -> Self {
        Self { llm_client }
    }

    /// Rows go into the prompt as a JSON array of arrays, `[]` when empty.
    pub fn build_prompt(question: &str, sql: &str, rows: &[ResultRow]) -> Result<String> {
        let data = serde_json::to_string(rows)?;
        Ok(format!(
            "Based on the user's question and the data retrieved from the database,\n\
             write a clear, natural language answer.\n\
             Question: {}\n\
             SQL Query: {}\n\
             Data: {}\n\
             Descriptive Answer:",
            question, sql, data
        ))
    }

    pub async fn synthesize(
        &self,
        config: &LLMConfig,
        question: &str,
        sql: &str,
        rows: &[ResultRow],
    ) -> Result<String> {
        let prompt = Self::build_prompt(question, sql, rows)?;
        let raw = self.llm_client.generate(config, "", &prompt).await?;
        Ok(clean_llm_response(&raw))
    }
}
