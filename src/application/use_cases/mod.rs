pub mod answer_synthesizer;
pub mod metadata_enrichment;
pub mod metadata_profiler;
pub mod query_executor;
pub mod query_synthesizer;
pub mod schema_introspector;
pub mod sql_guard;
pub mod table_selector;
pub mod text_to_sql;

#[cfg(test)]
pub(crate) mod test_support;
