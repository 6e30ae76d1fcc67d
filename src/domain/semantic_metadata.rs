//! Column-level annotations that steer SQL generation.
//!
//! The metadata file maps `table -> column -> ColumnAnnotation` and is written
//! by the offline profiler. At query time it is loaded once and shared
//! read-only between requests.

use crate::domain::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    Categorical,
    Numerical,
    Date,
    Time,
    Text,
    Boolean,
    Identifier,
    #[serde(other)]
    Other,
}

impl SemanticType {
    pub const ALL: [&'static str; 8] = [
        "Categorical",
        "Numerical",
        "Date",
        "Time",
        "Text",
        "Boolean",
        "Identifier",
        "Other",
    ];
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ColumnAnnotation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_percentage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_values: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<SemanticType>,
    /// Hand-written hints for query generation. The profiler never fills this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_guidance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_error: Option<String>,
}

pub type TableMetadata = BTreeMap<String, ColumnAnnotation>;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct SemanticMetadata {
    pub tables: BTreeMap<String, TableMetadata>,
}

impl SemanticMetadata {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AppError::Initialization(format!(
                "Semantic metadata '{}' not found. Run the `profile` command first.",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            AppError::Initialization(format!(
                "Semantic metadata '{}' is not valid: {}",
                path.display(),
                e
            ))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn table(&self, table_name: &str) -> Option<&TableMetadata> {
        self.tables.get(table_name)
    }

    /// Indented JSON for the selected table, `{}` when the table is unknown.
    pub fn table_json(&self, table_name: &str) -> String {
        match self.table(table_name) {
            Some(columns) => {
                serde_json::to_string_pretty(columns).unwrap_or_else(|_| "{}".to_string())
            }
            None => "{}".to_string(),
        }
    }

    pub fn has_expert_guidance(&self, table_name: &str) -> bool {
        self.table(table_name)
            .map(|columns| {
                columns.values().any(|c| {
                    c.expert_guidance
                        .as_deref()
                        .map(|g| !g.trim().is_empty())
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false)
    }
}
