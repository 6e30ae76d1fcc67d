//! Question-answering pipeline: table selection and SQL generation, execution,
//! then answer synthesis. Each stage failure ends the request with a
//! [`QueryFailure`]; nothing is retried.

use super::answer_synthesizer::AnswerSynthesizer;
use super::query_executor::QueryExecutor;
use super::query_synthesizer::QuerySynthesizer;
use super::schema_introspector::SchemaIntrospector;
use super::sql_guard::SqlGuard;
use super::table_selector::TableSelector;
use crate::domain::answer::{AnswerRecord, GeneratedQuery, QueryFailure};
use crate::domain::llm_config::LLMConfig;
use crate::domain::semantic_metadata::SemanticMetadata;
use crate::infrastructure::db::CostStore;
use crate::infrastructure::llm_clients::LLMClient;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub struct TextToSqlUseCase {
    config: LLMConfig,
    introspector: SchemaIntrospector,
    selector: TableSelector,
    synthesizer: QuerySynthesizer,
    executor: QueryExecutor,
    answerer: AnswerSynthesizer,
}

impl TextToSqlUseCase {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        store: Arc<CostStore>,
        metadata: Arc<SemanticMetadata>,
        config: LLMConfig,
        tables: Vec<String>,
        sample_rows: u32,
    ) -> Self {
        Self {
            config,
            introspector: SchemaIntrospector::new(store.clone(), tables, sample_rows),
            selector: TableSelector::new(llm_client.clone()),
            synthesizer: QuerySynthesizer::new(llm_client.clone(), metadata),
            executor: QueryExecutor::new(store),
            answerer: AnswerSynthesizer::new(llm_client),
        }
    }

    pub fn with_guard(mut self, guard: SqlGuard) -> Self {
        self.executor = self.executor.with_guard(guard);
        self
    }

    pub async fn execute(&self, question: &str) -> Result<AnswerRecord, QueryFailure> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        info!(%request_id, question = %question, "Question received");

        let result = self.run(question).await;

        match &result {
            Ok(record) => info!(
                %request_id,
                table = %record.selected_table,
                rows = record.query_result.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Question answered"
            ),
            Err(failure) => warn!(
                %request_id,
                stage = failure.stage(),
                error = %failure,
                sql = failure.sql().unwrap_or(""),
                "Question failed"
            ),
        }
        result
    }

    async fn run(&self, question: &str) -> Result<AnswerRecord, QueryFailure> {
        let generated = self.generate(question).await?;

        let rows = self
            .executor
            .execute(&generated.sql)
            .await
            .map_err(|e| QueryFailure::Execution {
                message: e.to_string(),
                sql: generated.sql.clone(),
            })?;

        let descriptive_answer = self
            .answerer
            .synthesize(&self.config, question, &generated.sql, &rows)
            .await
            .map_err(|e| QueryFailure::Synthesis {
                message: e.to_string(),
            })?;

        Ok(AnswerRecord {
            question: question.to_string(),
            selected_table: generated.table_name,
            sql_query: generated.sql,
            query_result: rows,
            descriptive_answer,
        })
    }

    /// Schema is fetched once and shared by table selection and SQL generation.
    async fn generate(&self, question: &str) -> Result<GeneratedQuery, QueryFailure> {
        let failed = |e: crate::domain::error::AppError| QueryFailure::Generation {
            message: e.to_string(),
        };

        let schema = self.introspector.describe().await.map_err(failed)?;
        let table_name = self
            .selector
            .select(&self.config, question, &schema)
            .await
            .map_err(failed)?;
        let sql = self
            .synthesizer
            .synthesize(&self.config, question, &schema, &table_name)
            .await
            .map_err(failed)?;

        Ok(GeneratedQuery { table_name, sql })
    }
}
