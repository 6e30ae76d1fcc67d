use serde::{Deserialize, Serialize};
use std::fmt;

/// One row as returned by the relational engine, column order preserved.
pub type ResultRow = Vec<serde_json::Value>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnswerRecord {
    pub question: String,
    pub selected_table: String,
    pub sql_query: String,
    pub query_result: Vec<ResultRow>,
    pub descriptive_answer: String,
}

/// Output of the combined table-selection and SQL-generation step.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuery {
    pub table_name: String,
    pub sql: String,
}

/// Terminal failure of one pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFailure {
    Generation { message: String },
    Execution { message: String, sql: String },
    Synthesis { message: String },
}

impl QueryFailure {
    pub fn stage(&self) -> &'static str {
        match self {
            QueryFailure::Generation { .. } => "generation",
            QueryFailure::Execution { .. } => "execution",
            QueryFailure::Synthesis { .. } => "synthesis",
        }
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            QueryFailure::Execution { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryFailure::Generation { message } => {
                write!(f, "Error during SQL generation: {}", message)
            }
            QueryFailure::Execution { message, .. } => write!(f, "Error executing SQL: {}", message),
            QueryFailure::Synthesis { message } => {
                write!(f, "Error during answer generation: {}", message)
            }
        }
    }
}

impl std::error::Error for QueryFailure {}

/// Response body of the query endpoint: either a full record or an error payload.
/// `sql_query` is present on the error payload only for execution failures.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum QueryResponse {
    Answer(AnswerRecord),
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sql_query: Option<String>,
    },
}

impl From<std::result::Result<AnswerRecord, QueryFailure>> for QueryResponse {
    fn from(outcome: std::result::Result<AnswerRecord, QueryFailure>) -> Self {
        match outcome {
            Ok(record) => QueryResponse::Answer(record),
            Err(failure) => QueryResponse::Error {
                error: failure.to_string(),
                sql_query: failure.sql().map(|s| s.to_string()),
            },
        }
    }
}
