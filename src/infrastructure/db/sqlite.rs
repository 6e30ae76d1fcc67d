//! SQLite access for the cost-usage store.
//!
//! Every operation opens its own connection and closes it when done, so
//! concurrent requests never share a handle.

use crate::domain::answer::ResultRow;
use crate::domain::error::{AppError, Result};
use base64::Engine;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Connection, Row, ValueRef};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Sample cells longer than this are cut when embedded in prompts.
const SAMPLE_CELL_MAX_CHARS: usize = 100;

pub struct CostStore {
    path: PathBuf,
    options: SqliteConnectOptions,
}

impl CostStore {
    /// Opens an existing store; a missing file or failed handshake is fatal.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AppError::Initialization(format!(
                "Database '{}' not found. Run the `load` command first.",
                path.display()
            )));
        }

        let store = Self {
            path: path.to_path_buf(),
            options: SqliteConnectOptions::new().filename(path),
        };

        let mut conn = store.connect().await.map_err(|e| {
            AppError::Initialization(format!("Failed to open '{}': {}", path.display(), e))
        })?;
        sqlx::query("SELECT 1")
            .execute(&mut conn)
            .await
            .map_err(|e| AppError::Initialization(format!("Database health check failed: {}", e)))?;
        conn.close().await?;

        info!(path = %path.display(), "Cost store opened");
        Ok(store)
    }

    /// Opens the store for writing, creating the file when missing.
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            options: SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        }
    }

    async fn connect(&self) -> Result<SqliteConnection> {
        SqliteConnection::connect_with(&self.options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {}", e)))
    }

    /// User tables, excluding SQLite's internal ones.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        let mut conn = self.connect().await?;
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&mut conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list tables: {}", e)))?;
        conn.close().await?;
        Ok(names)
    }

    pub async fn ensure_tables(&self, tables: &[String]) -> Result<()> {
        let existing = self.table_names().await?;
        let missing: Vec<&String> = tables.iter().filter(|t| !existing.contains(t)).collect();
        if !missing.is_empty() {
            return Err(AppError::Initialization(format!(
                "include_tables {:?} not found in database '{}'",
                missing,
                self.path.display()
            )));
        }
        Ok(())
    }

    pub async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let mut conn = self.connect().await?;
        let columns = Self::column_names_on(&mut conn, table).await?;
        conn.close().await?;
        Ok(columns)
    }

    async fn column_names_on(conn: &mut SqliteConnection, table: &str) -> Result<Vec<String>> {
        let pragma = format!("PRAGMA table_info({})", quote_ident(table));
        let rows = sqlx::query(&pragma)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list columns: {}", e)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("name").map_err(|e| {
                    AppError::DatabaseError(format!("Failed to parse column name: {}", e))
                })
            })
            .collect()
    }

    /// Prompt-ready schema text: each table's DDL followed by a few sample rows.
    pub async fn table_info(&self, tables: &[String], sample_rows: u32) -> Result<String> {
        let mut conn = self.connect().await?;
        let mut sections = Vec::with_capacity(tables.len());

        for table in tables {
            let ddl = sqlx::query_scalar::<_, String>(
                "SELECT sql FROM sqlite_master WHERE type='table' AND name = ?",
            )
            .bind(table)
            .fetch_optional(&mut conn)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to read schema: {}", e)))?
            .ok_or_else(|| AppError::DatabaseError(format!("Table '{}' not found", table)))?;

            let mut section = format!("\n{}", ddl.trim_end());

            if sample_rows > 0 {
                let columns = Self::column_names_on(&mut conn, table).await?;
                let select = format!("SELECT * FROM {} LIMIT {}", quote_ident(table), sample_rows);
                let rows = sqlx::query(&select)
                    .fetch_all(&mut conn)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(format!("Failed to sample '{}': {}", table, e))
                    })?;

                section.push_str(&format!(
                    "\n\n/*\n{} rows from {} table:\n{}",
                    sample_rows,
                    table,
                    columns.join("\t")
                ));
                for row in &rows {
                    let cells: Vec<String> = row_values(row)
                        .iter()
                        .map(|v| truncate_chars(&render_value(v), SAMPLE_CELL_MAX_CHARS))
                        .collect();
                    section.push('\n');
                    section.push_str(&cells.join("\t"));
                }
                section.push_str("\n*/");
            }

            sections.push(section);
        }

        conn.close().await?;
        Ok(sections.join("\n\n"))
    }

    /// Runs one statement verbatim and returns every row.
    pub async fn fetch_rows(&self, sql: &str) -> Result<Vec<ResultRow>> {
        let mut conn = self.connect().await?;
        let result = sqlx::query(sql).fetch_all(&mut conn).await;
        conn.close().await?;

        let rows = result.map_err(|e| AppError::DatabaseError(e.to_string()))?;
        debug!(rows = rows.len(), "Statement executed");
        Ok(rows.iter().map(row_values).collect())
    }

    /// Up to `limit` random non-null values of one column.
    pub async fn sample_values(
        &self,
        table: &str,
        column: &str,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>> {
        let sql = format!(
            "SELECT {col} FROM {table} WHERE {col} IS NOT NULL ORDER BY RANDOM() LIMIT {limit}",
            col = quote_ident(column),
            table = quote_ident(table),
            limit = limit
        );
        let rows = self.fetch_rows(&sql).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }

    /// Share of NULL cells in percent; an empty table reports zero.
    pub async fn null_percentage(&self, table: &str, column: &str) -> Result<f64> {
        let sql = format!(
            "SELECT CAST(COUNT(*) - COUNT({col}) AS REAL) / COUNT(*) * 100 FROM {table}",
            col = quote_ident(column),
            table = quote_ident(table)
        );
        let mut conn = self.connect().await?;
        let value = sqlx::query_scalar::<_, Option<f64>>(&sql)
            .fetch_one(&mut conn)
            .await;
        conn.close().await?;
        Ok(value
            .map_err(|e| AppError::DatabaseError(e.to_string()))?
            .unwrap_or(0.0))
    }

    pub async fn distinct_count(&self, table: &str, column: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(DISTINCT {col}) FROM {table}",
            col = quote_ident(column),
            table = quote_ident(table)
        );
        let mut conn = self.connect().await?;
        let value = sqlx::query_scalar::<_, i64>(&sql).fetch_one(&mut conn).await;
        conn.close().await?;
        value.map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    /// Drops and recreates `table`, then inserts all rows in one transaction.
    pub async fn replace_table(
        &self,
        table: &str,
        columns: &[(String, &'static str)],
        rows: &[ResultRow],
    ) -> Result<u64> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
            .execute(&mut *tx)
            .await?;

        let column_defs: Vec<String> = columns
            .iter()
            .map(|(name, sql_type)| format!("{} {}", quote_ident(name), sql_type))
            .collect();
        let create = format!(
            "CREATE TABLE {} (\n{}\n)",
            quote_ident(table),
            column_defs.join(",\n")
        );
        sqlx::query(&create).execute(&mut *tx).await?;

        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!("INSERT INTO {} VALUES ({})", quote_ident(table), placeholders);

        let mut inserted = 0;
        for row in rows {
            let mut query = sqlx::query(&insert);
            for value in row {
                query = match value {
                    serde_json::Value::String(s) => query.bind(s.clone()),
                    serde_json::Value::Number(n) => {
                        if let Some(i) = n.as_i64() {
                            query.bind(i)
                        } else if let Some(f) = n.as_f64() {
                            query.bind(f)
                        } else {
                            query.bind(n.to_string())
                        }
                    }
                    serde_json::Value::Bool(b) => query.bind(*b),
                    serde_json::Value::Null => query.bind(Option::<String>::None),
                    other => query.bind(other.to_string()),
                };
            }
            inserted += query.execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        conn.close().await?;
        Ok(inserted)
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Converts one row into JSON scalars, following SQLite's runtime storage class.
fn row_values(row: &SqliteRow) -> ResultRow {
    (0..row.len()).map(|i| extract_column_value(row, i)).collect()
}

fn extract_column_value(row: &SqliteRow, index: usize) -> serde_json::Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return serde_json::Value::Null,
        Err(_) => return serde_json::Value::Null,
        _ => {}
    }

    if let Ok(v) = row.try_get::<i64, _>(index) {
        return serde_json::Value::Number(v.into());
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return serde_json::Number::from_f64(v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return serde_json::Value::String(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(v));
    }

    serde_json::Value::Null
}

pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
