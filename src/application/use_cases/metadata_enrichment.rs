use crate::domain::error::Result;
use crate::domain::llm_config::LLMConfig;
use crate::domain::semantic_metadata::{ColumnAnnotation, SemanticMetadata, SemanticType};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::extract_json_object;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are an expert data analyst and database architect.\n\
Your task is to provide semantic metadata for a database column based on its profiled statistics.\n\
Respond *only* with a valid JSON object. Do not add any other text, explanations, or markdown formatting.";

pub const PARSE_FAILURE: &str = "Failed to parse LLM response";

#[derive(Debug, Deserialize)]
struct ColumnSemantics {
    description: Option<serde_json::Value>,
    semantic_type: Option<serde_json::Value>,
}

/// Outcome counts of one enrichment pass.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EnrichmentSummary {
    pub enriched: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Asks the model for a description and semantic type of every profiled column.
pub struct MetadataEnrichmentUseCase {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
    delay: Duration,
}

impl MetadataEnrichmentUseCase {
    /// `config` is switched to JSON mode and `model`.
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        config: &LLMConfig,
        model: &str,
        delay: Duration,
    ) -> Self {
        Self {
            llm_client,
            config: config.with_model(model).with_json_mode(),
            delay,
        }
    }

    pub fn build_prompt(table: &str, column: &str, stats: &ColumnAnnotation) -> Result<String> {
        let stats_json = serde_json::to_string_pretty(stats)?;
        Ok(format!(
            "Database Table: {table}\n\
             Column Name: {column}\n\
             Profiled Statistics:\n\
             {stats_json}\n\n\
             Based on this information, please provide:\n\
             1.  A \"description\": A concise, plain-English description of what this column represents (e.g., \"The total cost of the service in USD.\").\n\
             2.  A \"semantic_type\": The general data category. Choose only from: {types}\n\n\
             Respond *only* with a valid JSON object containing these two keys.",
            table = table,
            column = column,
            stats_json = stats_json,
            types = SemanticType::ALL
                .iter()
                .map(|t| format!("'{}'", t))
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    pub async fn enrich(&self, metadata: &mut SemanticMetadata) -> EnrichmentSummary {
        let mut summary = EnrichmentSummary::default();
        let mut first_call = true;

        for (table, columns) in metadata.tables.iter_mut() {
            for (column, stats) in columns.iter_mut() {
                if stats.error.is_some() {
                    summary.skipped += 1;
                    continue;
                }

                if !first_call && !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                first_call = false;

                match self.enrich_column(table, column, stats).await {
                    Ok(()) => {
                        summary.enriched += 1;
                        info!(table = %table, column = %column, "Column enriched");
                    }
                    Err(message) => {
                        summary.failed += 1;
                        warn!(table = %table, column = %column, error = %message, "Column enrichment failed");
                        stats.ai_error = Some(message);
                    }
                }
            }
        }

        summary
    }

    async fn enrich_column(
        &self,
        table: &str,
        column: &str,
        stats: &mut ColumnAnnotation,
    ) -> std::result::Result<(), String> {
        let prompt = Self::build_prompt(table, column, stats).map_err(|e| e.to_string())?;
        let reply = self
            .llm_client
            .generate(&self.config, SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| e.to_string())?;

        let parsed = parse_semantics(&reply).ok_or_else(|| PARSE_FAILURE.to_string())?;

        stats.ai_description = Some(match parsed.description {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => "N/A".to_string(),
            Some(other) => other.to_string(),
        });
        stats.semantic_type = Some(
            parsed
                .semantic_type
                .and_then(|v| serde_json::from_value::<SemanticType>(v).ok())
                .unwrap_or(SemanticType::Other),
        );
        Ok(())
    }
}

fn parse_semantics(reply: &str) -> Option<ColumnSemantics> {
    serde_json::from_str(reply.trim()).ok().or_else(|| {
        extract_json_object(reply).and_then(|json| serde_json::from_str(&json).ok())
    })
}
