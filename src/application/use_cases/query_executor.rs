use super::sql_guard::SqlGuard;
use crate::domain::answer::ResultRow;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::db::CostStore;
use std::sync::Arc;
use tracing::warn;

/// Runs generated SQL verbatim against the cost store.
pub struct QueryExecutor {
    store: Arc<CostStore>,
    guard: Option<SqlGuard>,
}

impl QueryExecutor {
    pub fn new(store: Arc<CostStore>) -> Self {
        Self { store, guard: None }
    }

    pub fn with_guard(mut self, guard: SqlGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>> {
        if let Some(guard) = &self.guard {
            let verdict = guard.check(sql);
            if !verdict.is_valid {
                warn!(sql = %sql, violations = ?verdict.violations, "Statement rejected by guard");
                return Err(AppError::ValidationError(verdict.summary()));
            }
        }

        self.store.fetch_rows(sql).await
    }
}
