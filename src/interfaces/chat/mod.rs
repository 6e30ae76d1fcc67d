//! Terminal chat front-end for a running API server.

use crate::domain::answer::{AnswerRecord, QueryResponse};
use crate::domain::error::Result;
use crate::interfaces::http::QueryRequest;
use std::fmt::{self, Write as _};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

pub const BACKEND_DOWN_MESSAGE: &str =
    "Backend not running. Please start the API server first (`cloudcost-sql serve`).";

#[derive(Debug)]
pub enum ChatError {
    /// Nothing is listening at the configured address.
    BackendDown(String),
    Request(String),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::BackendDown(msg) => write!(f, "Backend unreachable: {}", msg),
            ChatError::Request(msg) => write!(f, "{}", msg),
        }
    }
}

pub struct ChatClient {
    client: reqwest::Client,
    url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/query", base_url.trim_end_matches('/')),
        }
    }

    pub async fn ask(&self, question: &str) -> std::result::Result<QueryResponse, ChatError> {
        let response = self
            .client
            .post(&self.url)
            .json(&QueryRequest {
                question: question.to_string(),
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ChatError::BackendDown(e.to_string())
                } else {
                    ChatError::Request(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Request(format!("API error ({}): {}", status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| ChatError::Request(format!("Failed to parse JSON: {}", e)))
    }

    /// Reads questions from stdin until EOF or `exit`.
    pub async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        stdout
            .write_all(b"Ask a question about your AWS or Azure costs (type 'exit' to quit).\n")
            .await?;

        loop {
            stdout.write_all(b"\n> ").await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
                break;
            }

            let output = match self.ask(question).await {
                Ok(response) => render_response(&response),
                Err(e) => {
                    debug!(error = %e, "Chat request failed");
                    render_failure(&e)
                }
            };
            stdout.write_all(output.as_bytes()).await?;
        }

        Ok(())
    }
}

pub fn render_failure(err: &ChatError) -> String {
    match err {
        ChatError::BackendDown(_) => format!("{}\n", BACKEND_DOWN_MESSAGE),
        ChatError::Request(msg) => format!("An error occurred: {}\n", msg),
    }
}

pub fn render_response(response: &QueryResponse) -> String {
    match response {
        QueryResponse::Answer(record) => render_answer(record),
        QueryResponse::Error { error, sql_query } => {
            let mut out = format!("Error: {}\n", error);
            if let Some(sql) = sql_query {
                writeln!(out, "Attempted SQL: {}", sql).unwrap();
            }
            out
        }
    }
}

/// Answer first, technical details below it.
fn render_answer(record: &AnswerRecord) -> String {
    let mut out = String::new();
    writeln!(out, "{}\n", record.descriptive_answer).unwrap();
    writeln!(out, "--- Technical details ---").unwrap();
    writeln!(out, "Selected table: {}", record.selected_table).unwrap();
    writeln!(out, "SQL: {}", record.sql_query).unwrap();
    writeln!(out, "Result ({} rows):", record.query_result.len()).unwrap();
    for row in &record.query_result {
        let cells: Vec<String> = row
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => "NULL".to_string(),
                other => other.to_string(),
            })
            .collect();
        writeln!(out, "  {}", cells.join(" | ")).unwrap();
    }
    out
}
