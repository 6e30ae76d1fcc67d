use crate::domain::error::Result;
use crate::infrastructure::db::CostStore;
use std::sync::Arc;

/// Prompt-ready description of the allow-listed tables, rebuilt on every call.
pub struct SchemaIntrospector {
    store: Arc<CostStore>,
    tables: Vec<String>,
    sample_rows: u32,
}

impl SchemaIntrospector {
    pub fn new(store: Arc<CostStore>, tables: Vec<String>, sample_rows: u32) -> Self {
        Self {
            store,
            tables,
            sample_rows,
        }
    }

    pub async fn describe(&self) -> Result<String> {
        self.store.table_info(&self.tables, self.sample_rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::sqlite::tests::seeded_store;

    #[tokio::test]
    async fn test_describe_restricts_to_allow_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(seeded_store(dir.path()).await);
        let introspector = SchemaIntrospector::new(store, vec!["azure_cost_usage".to_string()], 1);

        let schema = introspector.describe().await.unwrap();
        assert!(schema.contains("azure_cost_usage"));
        assert!(schema.contains("1 rows from azure_cost_usage table:"));
        assert!(!schema.contains("aws_cost_usage"));
    }

    #[tokio::test]
    async fn test_tables_are_separated_by_blank_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(seeded_store(dir.path()).await);
        let introspector = SchemaIntrospector::new(
            store,
            vec!["aws_cost_usage".to_string(), "azure_cost_usage".to_string()],
            2,
        );

        let schema = introspector.describe().await.unwrap();
        assert!(schema.contains("*/\n\n\nCREATE TABLE \"azure_cost_usage\""));
    }
}
