use super::csv_parser::{CsvParser, CsvTable};
use crate::domain::answer::ResultRow;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::db::CostStore;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LoadReport {
    pub table: String,
    pub columns: Vec<(String, String)>,
    pub rows: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Affinity {
    Integer,
    Real,
    Text,
}

impl Affinity {
    fn sql_type(self) -> &'static str {
        match self {
            Affinity::Integer => "INTEGER",
            Affinity::Real => "REAL",
            Affinity::Text => "TEXT",
        }
    }

    fn infer<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let mut affinity = Affinity::Integer;
        let mut seen = false;
        for value in values.filter(|v| !v.is_empty()) {
            seen = true;
            if affinity == Affinity::Integer && value.parse::<i64>().is_err() {
                affinity = Affinity::Real;
            }
            if affinity == Affinity::Real && value.parse::<f64>().is_err() {
                return Affinity::Text;
            }
        }
        if seen {
            affinity
        } else {
            Affinity::Text
        }
    }

    fn convert(self, value: &str) -> serde_json::Value {
        if value.is_empty() {
            return serde_json::Value::Null;
        }
        match self {
            Affinity::Integer => value
                .parse::<i64>()
                .map(serde_json::Value::from)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string())),
            Affinity::Real => value
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(value.to_string())),
            Affinity::Text => serde_json::Value::String(value.to_string()),
        }
    }
}

/// Loads CSV exports into the cost store, one table per file.
pub struct CsvLoader<'a> {
    store: &'a CostStore,
}

impl<'a> CsvLoader<'a> {
    pub fn new(store: &'a CostStore) -> Self {
        Self { store }
    }

    pub async fn load_file(&self, path: &Path) -> Result<LoadReport> {
        let table = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::ValidationError(format!("Cannot derive table name from {}", path.display()))
            })?
            .to_string();

        let csv = CsvParser::parse_file_auto_detect(path)?;
        let report = self.load_table(&table, &csv).await?;
        info!(
            table = %report.table,
            rows = report.rows,
            source = %path.display(),
            "CSV loaded"
        );
        Ok(report)
    }

    pub async fn load_table(&self, table: &str, csv: &CsvTable) -> Result<LoadReport> {
        let affinities: Vec<Affinity> = (0..csv.headers.len())
            .map(|i| Affinity::infer(csv.rows.iter().map(|row| row[i].as_str())))
            .collect();

        let columns: Vec<(String, &'static str)> = csv
            .headers
            .iter()
            .zip(&affinities)
            .map(|(name, affinity)| (name.clone(), affinity.sql_type()))
            .collect();

        let rows: Vec<ResultRow> = csv
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&affinities)
                    .map(|(cell, affinity)| affinity.convert(cell))
                    .collect()
            })
            .collect();

        let inserted = self.store.replace_table(table, &columns, &rows).await?;

        Ok(LoadReport {
            table: table.to_string(),
            columns: columns
                .into_iter()
                .map(|(name, sql_type)| (name, sql_type.to_string()))
                .collect(),
            rows: inserted,
        })
    }
}
