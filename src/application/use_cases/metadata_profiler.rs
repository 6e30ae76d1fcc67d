use crate::domain::error::Result;
use crate::domain::semantic_metadata::{ColumnAnnotation, SemanticMetadata, TableMetadata};
use crate::infrastructure::db::CostStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Collects per-column statistics for every user table in the store.
pub struct MetadataProfiler {
    store: Arc<CostStore>,
    sample_size: u32,
}

impl MetadataProfiler {
    pub fn new(store: Arc<CostStore>, sample_size: u32) -> Self {
        Self { store, sample_size }
    }

    pub async fn profile(&self) -> Result<SemanticMetadata> {
        let mut metadata = SemanticMetadata::default();

        let tables = self.store.table_names().await?;
        info!(tables = ?tables, "Profiling tables");

        for table in tables {
            let mut columns = TableMetadata::new();
            for column in self.store.column_names(&table).await? {
                let annotation = match self.profile_column(&table, &column).await {
                    Ok(annotation) => annotation,
                    Err(e) => {
                        warn!(table = %table, column = %column, error = %e, "Column profiling failed");
                        ColumnAnnotation {
                            error: Some(e.to_string()),
                            ..ColumnAnnotation::default()
                        }
                    }
                };
                columns.insert(column, annotation);
            }
            metadata.tables.insert(table, columns);
        }

        Ok(metadata)
    }

    async fn profile_column(&self, table: &str, column: &str) -> Result<ColumnAnnotation> {
        let sample_values = self
            .store
            .sample_values(table, column, self.sample_size)
            .await?;
        let null_pct = self.store.null_percentage(table, column).await?;
        let distinct = self.store.distinct_count(table, column).await?;

        Ok(ColumnAnnotation {
            sample_values,
            null_percentage: Some(format!("{:.2}%", null_pct)),
            distinct_values: Some(distinct),
            ..ColumnAnnotation::default()
        })
    }
}
