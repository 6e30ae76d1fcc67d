use crate::application::TextToSqlUseCase;
use crate::interfaces::http::LogEntry;
use std::sync::{Arc, Mutex};

/// Everything a request handler needs, built once at startup.
pub struct AppState {
    pub text_to_sql: TextToSqlUseCase,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

impl AppState {
    pub fn new(text_to_sql: TextToSqlUseCase) -> Self {
        Self {
            text_to_sql,
            logs: Arc::new(Mutex::new(Vec::new())),
        }
    }
}
