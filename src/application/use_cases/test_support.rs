use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use async_trait::async_trait;
use std::sync::Mutex;

/// Deterministic language-model stand-in.
///
/// Replies are chosen by which pipeline prompt it receives, so call order does
/// not matter. Every call is recorded as `(system, user)`.
pub struct ScriptedLlm {
    pub table: std::result::Result<String, String>,
    pub sql: std::result::Result<String, String>,
    pub answer: std::result::Result<String, String>,
    pub json: std::result::Result<String, String>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlm {
    pub fn new(table: &str, sql: &str, answer: &str) -> Self {
        Self {
            table: Ok(table.to_string()),
            sql: Ok(sql.to_string()),
            answer: Ok(answer.to_string()),
            json: Ok(r#"{"description": "A column.", "semantic_type": "Text"}"#.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn user_prompts_containing(&self, needle: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|(_, user)| user)
            .filter(|user| user.contains(needle))
            .collect()
    }
}

#[async_trait]
impl LLMClient for ScriptedLlm {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));

        let reply = if config.json_mode {
            &self.json
        } else if user.contains("Relevant Table:") {
            &self.table
        } else if user.contains("Descriptive Answer:") {
            &self.answer
        } else {
            &self.sql
        };
        reply.clone().map_err(AppError::LLMError)
    }
}
